//! In-memory collaborators shared by the unit tests.

use std::{
  future::Future,
  sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
  },
};

use chrono::NaiveDate;
use pulse_core::{
  api::{FeedApi, NotificationApi},
  feed::{FeedFilter, FeedPost},
  notification::{NotificationId, NotificationItem},
};
use reqwest::Url;
use tokio::sync::mpsc;

use crate::{
  error::{Error, Result},
  router::Dispatch,
  transport::{CloseFrame, Connection, Frame, Transport},
};

/// Let spawned tasks run until they block again.
pub async fn settle() {
  for _ in 0..32 {
    tokio::task::yield_now().await;
  }
}

// ─── REST fake ───────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeApi {
  history:        Mutex<Vec<NotificationItem>>,
  marked:         Mutex<Vec<u64>>,
  feed:           Mutex<Vec<FeedPost>>,
  feed_requests:  Mutex<Vec<FeedFilter>>,
  fail_history:   AtomicBool,
  fail_mark_read: AtomicBool,
  fail_feed:      AtomicBool,
}

fn at_nine() -> chrono::NaiveDateTime {
  NaiveDate::from_ymd_opt(2024, 1, 1)
    .and_then(|d| d.and_hms_opt(9, 0, 0))
    .unwrap()
}

impl FakeApi {
  pub fn with_history(items: Vec<(u64, &str)>) -> Self {
    let api = Self::default();
    *api.history.lock().unwrap() = items
      .into_iter()
      .map(|(id, content)| NotificationItem {
        id:         NotificationId::Persisted(id),
        content:    content.to_string(),
        link:       None,
        is_read:    false,
        created_at: at_nine(),
      })
      .collect();
    api
  }

  pub fn set_feed(&self, posts: Vec<(u64, &str)>) {
    *self.feed.lock().unwrap() = posts
      .into_iter()
      .map(|(id, content)| FeedPost {
        id,
        content: content.to_string(),
        icon: None,
        created_at: at_nine(),
        user_name: "Ana".into(),
        visibility: "public".into(),
      })
      .collect();
  }

  pub fn fail_history(&self, fail: bool) { self.fail_history.store(fail, Ordering::SeqCst); }

  pub fn fail_mark_read(&self, fail: bool) { self.fail_mark_read.store(fail, Ordering::SeqCst); }

  pub fn fail_feed(&self, fail: bool) { self.fail_feed.store(fail, Ordering::SeqCst); }

  pub fn marked(&self) -> Vec<u64> { self.marked.lock().unwrap().clone() }

  pub fn feed_requests(&self) -> Vec<FeedFilter> { self.feed_requests.lock().unwrap().clone() }
}

fn refused(what: &str) -> Error { Error::Transport(format!("{what} refused by fake")) }

impl NotificationApi for FakeApi {
  type Error = Error;

  fn fetch_history(
    &self,
  ) -> impl Future<Output = Result<Vec<NotificationItem>>> + Send + '_ {
    async move {
      if self.fail_history.load(Ordering::SeqCst) {
        return Err(refused("history"));
      }
      Ok(self.history.lock().unwrap().clone())
    }
  }

  fn mark_read(&self, id: u64) -> impl Future<Output = Result<()>> + Send + '_ {
    async move {
      self.marked.lock().unwrap().push(id);
      if self.fail_mark_read.load(Ordering::SeqCst) {
        return Err(refused("mark read"));
      }
      Ok(())
    }
  }
}

impl FeedApi for FakeApi {
  type Error = Error;

  fn fetch_feed<'a>(
    &'a self,
    filter: &'a FeedFilter,
  ) -> impl Future<Output = Result<Vec<FeedPost>>> + Send + 'a {
    async move {
      self.feed_requests.lock().unwrap().push(filter.clone());
      if self.fail_feed.load(Ordering::SeqCst) {
        return Err(refused("feed"));
      }
      Ok(self.feed.lock().unwrap().clone())
    }
  }
}

// ─── Transport fake ──────────────────────────────────────────────────────────

/// A transport whose "server side" is driven from the test.
#[derive(Clone, Default)]
pub struct MockTransport {
  inner: Arc<MockInner>,
}

#[derive(Default)]
struct MockInner {
  attempts: AtomicUsize,
  failures: AtomicUsize,
  panics:   AtomicBool,
  closed:   AtomicUsize,
  urls:     Mutex<Vec<String>>,
  peers:    Mutex<Vec<mpsc::UnboundedSender<Frame>>>,
}

impl MockTransport {
  pub fn attempts(&self) -> usize { self.inner.attempts.load(Ordering::SeqCst) }

  /// Make the next `n` connection attempts fail.
  pub fn fail_next(&self, n: usize) { self.inner.failures.store(n, Ordering::SeqCst); }

  /// Make the next connection attempt panic inside the transport.
  pub fn panic_next(&self) { self.inner.panics.store(true, Ordering::SeqCst); }

  pub fn last_url(&self) -> Option<String> { self.inner.urls.lock().unwrap().last().cloned() }

  /// Times the client closed a connection itself.
  pub fn closed_by_client(&self) -> usize { self.inner.closed.load(Ordering::SeqCst) }

  /// Deliver a text frame on the newest connection.
  pub fn text(&self, raw: &str) { self.send(Frame::Text(raw.to_string())); }

  /// Close the newest connection from the server side.
  pub fn close_with(&self, code: Option<u16>) {
    self.send(Frame::Close(code.map(|code| CloseFrame { code, reason: String::new() })));
  }

  /// End the newest connection's stream without a close frame.
  pub fn drop_connection(&self) { self.inner.peers.lock().unwrap().pop(); }

  fn send(&self, frame: Frame) {
    if let Some(peer) = self.inner.peers.lock().unwrap().last() {
      let _ = peer.send(frame);
    }
  }
}

pub struct MockConnection {
  rx:    mpsc::UnboundedReceiver<Frame>,
  inner: Arc<MockInner>,
}

impl Transport for MockTransport {
  type Connection = MockConnection;

  fn connect<'a>(
    &'a self,
    url: &'a Url,
  ) -> impl Future<Output = Result<MockConnection>> + Send + 'a {
    async move {
      self.inner.attempts.fetch_add(1, Ordering::SeqCst);
      self.inner.urls.lock().unwrap().push(url.to_string());
      if self.inner.panics.swap(false, Ordering::SeqCst) {
        panic!("transport failure");
      }
      let fail = self
        .inner
        .failures
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok();
      if fail {
        return Err(refused("connection"));
      }
      let (tx, rx) = mpsc::unbounded_channel();
      self.inner.peers.lock().unwrap().push(tx);
      Ok(MockConnection { rx, inner: self.inner.clone() })
    }
  }
}

impl Connection for MockConnection {
  fn next_frame(&mut self) -> impl Future<Output = Option<Result<Frame>>> + Send + '_ {
    async move { self.rx.recv().await.map(Ok) }
  }

  fn close(&mut self) -> impl Future<Output = ()> + Send + '_ {
    async move {
      self.inner.closed.fetch_add(1, Ordering::SeqCst);
    }
  }
}

// ─── Dispatch recorder ───────────────────────────────────────────────────────

#[derive(Default)]
pub struct Recorder {
  frames: Mutex<Vec<String>>,
}

impl Recorder {
  pub fn frames(&self) -> Vec<String> { self.frames.lock().unwrap().clone() }
}

impl Dispatch for Recorder {
  fn dispatch(&self, raw: &str) { self.frames.lock().unwrap().push(raw.to_string()); }
}
