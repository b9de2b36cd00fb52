//! Connection manager for the push channel.
//!
//! Holds at most one live connection per session and recovers from failure:
//!
//! ```text
//! Disconnected --connect()--> Connecting --open--> Open
//!      ^                          |                  |
//!      |                       failed          closed/errored
//!      +----- reconnect delay ----+------------------+
//! ```
//!
//! A single supervisor task owns the connection and the reconnect timer.
//! [`ConnectionManager::shutdown`] stops it for good: the socket is closed,
//! a pending reconnect is cancelled, and no further attempt is made.

use std::{
  panic::{AssertUnwindSafe, catch_unwind},
  sync::{Arc, Mutex, MutexGuard, PoisonError},
  time::Duration,
};

use futures_util::FutureExt as _;

use pulse_core::event::AUTH_REJECTED;
use reqwest::Url;
use tokio::{
  sync::{Notify, watch},
  task::JoinHandle,
};
use tracing::{debug, error, info, warn};

use crate::{
  router::Dispatch,
  transport::{CloseFrame, Connection, Frame, Transport},
};

// ─── State ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
  Disconnected,
  Connecting,
  Open,
  Closing,
}

/// How the manager behaves after a connection ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
  /// Wait between a disconnect and the next attempt.
  pub delay:                   Duration,
  /// Keep retrying after the server closes with [`AUTH_REJECTED`].
  pub retry_on_auth_rejection: bool,
}

impl Default for ReconnectPolicy {
  fn default() -> Self {
    Self {
      delay:                   Duration::from_secs(3),
      retry_on_auth_rejection: false,
    }
  }
}

// ─── Manager ─────────────────────────────────────────────────────────────────

struct Shared<T> {
  transport: T,
  /// Push URL with the session token attached; `None` without a token.
  url:       Option<Url>,
  policy:    ReconnectPolicy,
  dispatch:  Arc<dyn Dispatch>,
  state:     watch::Sender<ConnectionState>,
  shutdown:  watch::Sender<bool>,
  /// Fires a pending reconnect early.
  wake:      Notify,
  task:      Mutex<Option<JoinHandle<()>>>,
}

pub struct ConnectionManager<T: Transport> {
  shared: Arc<Shared<T>>,
}

impl<T: Transport> ConnectionManager<T> {
  /// Create a manager for one session. Nothing is opened until
  /// [`connect`](Self::connect) is called.
  ///
  /// The token travels as the `token` query parameter. An empty token leaves
  /// the manager inert.
  pub fn new(
    transport: T,
    push_url: Url,
    token: &str,
    policy: ReconnectPolicy,
    dispatch: Arc<dyn Dispatch>,
  ) -> Self {
    let url = (!token.is_empty()).then(|| {
      let mut url = push_url;
      url.query_pairs_mut().append_pair("token", token);
      url
    });
    let (state, _) = watch::channel(ConnectionState::Disconnected);
    let (shutdown, _) = watch::channel(false);
    Self {
      shared: Arc::new(Shared {
        transport,
        url,
        policy,
        dispatch,
        state,
        shutdown,
        wake: Notify::new(),
        task: Mutex::new(None),
      }),
    }
  }

  pub fn state(&self) -> ConnectionState { *self.shared.state.borrow() }

  pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
    self.shared.state.subscribe()
  }

  /// Start connecting.
  ///
  /// A no-op while `Connecting` or `Open`, after shutdown, or without a
  /// token. While a reconnect is pending, fires it immediately instead of
  /// starting a second attempt. After the server rejected the token this is
  /// the only way to try again.
  pub fn connect(&self) {
    let mut task = self.lock_task();

    if *self.shared.shutdown.borrow() {
      debug!("connect() after shutdown ignored");
      return;
    }
    let Some(url) = self.shared.url.clone() else {
      warn!("no session token; push channel not opened");
      return;
    };

    let running = task.as_ref().is_some_and(|handle| !handle.is_finished());
    if running {
      if self.state() != ConnectionState::Disconnected {
        debug!(state = ?self.state(), "connect() ignored");
        return;
      }
      debug!("supervisor idle; waking it");
      self.shared.state.send_replace(ConnectionState::Connecting);
      self.shared.wake.notify_one();
      return;
    }
    if task.is_some() {
      warn!(state = ?self.state(), "push channel supervisor had stopped; restarting it");
    }

    // Claimed before the task runs so an immediate second call is a no-op.
    self.shared.state.send_replace(ConnectionState::Connecting);
    *task = Some(tokio::spawn(supervise(self.shared.clone(), url)));
  }

  /// Close the connection and cancel any pending reconnect. Returns once the
  /// supervisor has stopped; afterwards the state is `Disconnected` and
  /// [`connect`](Self::connect) does nothing.
  pub async fn shutdown(&self) {
    let handle = {
      let mut task = self.lock_task();
      if !self.shared.shutdown.send_replace(true) {
        info!("shutting down push channel");
      }
      if self.state() != ConnectionState::Disconnected {
        self.shared.state.send_replace(ConnectionState::Closing);
      }
      task.take()
    };
    if let Some(handle) = handle
      && let Err(e) = handle.await
    {
      warn!(error = %e, "push channel supervisor ended abnormally");
    }
    self.shared.state.send_replace(ConnectionState::Disconnected);
  }

  fn lock_task(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
    self.shared.task.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

impl<T: Transport> Drop for ConnectionManager<T> {
  fn drop(&mut self) {
    self.shared.shutdown.send_replace(true);
    if let Some(handle) = self.lock_task().take() {
      handle.abort();
    }
  }
}

// ─── Supervisor ──────────────────────────────────────────────────────────────

enum Ended {
  /// Shutdown was requested while the connection was open.
  Shutdown,
  /// The connection went away on its own.
  Closed(Option<CloseFrame>),
}

/// Leaves the state `Disconnected` however the supervisor exits.
struct ResetOnExit<'a>(&'a watch::Sender<ConnectionState>);

impl Drop for ResetOnExit<'_> {
  fn drop(&mut self) { self.0.send_replace(ConnectionState::Disconnected); }
}

async fn supervise<T: Transport>(shared: Arc<Shared<T>>, url: Url) {
  let _reset = ResetOnExit(&shared.state);
  let mut shutdown = shared.shutdown.subscribe();

  loop {
    if *shutdown.borrow_and_update() {
      break;
    }
    shared.state.send_replace(ConnectionState::Connecting);
    // A connect() that raced the end of the last wait left a permit behind;
    // this attempt already serves it.
    let _ = shared.wake.notified().now_or_never();
    debug!("opening push channel");

    let attempt = tokio::select! {
      biased;
      _ = shutdown.changed() => break,
      attempt = shared.transport.connect(&url) => attempt,
    };

    let close = match attempt {
      Ok(mut conn) => {
        shared.state.send_replace(ConnectionState::Open);
        info!("push channel open");
        match pump(&shared, &mut conn, &mut shutdown).await {
          Ended::Shutdown => {
            shared.state.send_replace(ConnectionState::Closing);
            conn.close().await;
            break;
          }
          Ended::Closed(close) => close,
        }
      }
      Err(e) => {
        warn!(error = %e, "push channel connection failed");
        None
      }
    };
    shared.state.send_replace(ConnectionState::Disconnected);

    if close.as_ref().is_some_and(|c| c.code == AUTH_REJECTED)
      && !shared.policy.retry_on_auth_rejection
    {
      // Park without a timer; only an explicit connect() tries again.
      warn!("session token rejected by server; not reconnecting");
      tokio::select! {
        biased;
        _ = shutdown.changed() => break,
        _ = shared.wake.notified() => continue,
      }
    }

    info!(delay_ms = shared.policy.delay.as_millis() as u64, "reconnect scheduled");
    tokio::select! {
      biased;
      _ = shutdown.changed() => break,
      _ = shared.wake.notified() => debug!("reconnect fired early"),
      _ = tokio::time::sleep(shared.policy.delay) => {}
    }
  }

  debug!("push channel supervisor stopped");
}

/// Forward frames to the dispatcher until the connection ends or shutdown
/// is requested.
async fn pump<T: Transport>(
  shared: &Shared<T>,
  conn: &mut T::Connection,
  shutdown: &mut watch::Receiver<bool>,
) -> Ended {
  loop {
    tokio::select! {
      biased;
      _ = shutdown.changed() => return Ended::Shutdown,
      frame = conn.next_frame() => match frame {
        Some(Ok(Frame::Text(raw))) => {
          let dispatched = catch_unwind(AssertUnwindSafe(|| shared.dispatch.dispatch(&raw)));
          if dispatched.is_err() {
            error!(len = raw.len(), "push frame dispatch panicked; frame dropped");
          }
        }
        Some(Ok(Frame::Close(close))) => {
          info!(code = close.as_ref().map(|c| c.code), "push channel closed by server");
          return Ended::Closed(close);
        }
        Some(Err(e)) => {
          warn!(error = %e, "push channel errored");
          return Ended::Closed(None);
        }
        None => {
          info!("push channel ended");
          return Ended::Closed(None);
        }
      },
    }
  }
}
