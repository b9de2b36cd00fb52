//! Keeps the activity feed fresh when new posts are announced.
//!
//! The synchronizer listens on the event bus for `feed_update`/`new_post`
//! and refetches the current feed page under whatever filters the feed view
//! has set. Bursts of announcements collapse into one follow-up fetch.

use std::sync::Arc;

use pulse_core::{
  api::FeedApi,
  bus::{EventBus, Subscription},
  event::InboundEvent,
  feed::{FeedFilter, FeedPost},
};
use tokio::{
  sync::{Notify, watch},
  task::JoinHandle,
};
use tracing::{debug, warn};

/// The most recently fetched page and the filter it was fetched under.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedPage {
  pub filter: FeedFilter,
  pub posts:  Vec<FeedPost>,
}

pub struct FeedSynchronizer {
  filter:        watch::Sender<FeedFilter>,
  page:          watch::Receiver<FeedPage>,
  refresh:       Arc<Notify>,
  _subscription: Subscription,
  task:          JoinHandle<()>,
}

impl FeedSynchronizer {
  /// Subscribe to `bus` and start the refetch worker. No fetch happens until
  /// a new post is announced, the filter changes, or
  /// [`refresh`](Self::refresh) is called.
  pub fn spawn<A>(bus: &EventBus, api: Arc<A>, filter: FeedFilter) -> Self
  where
    A: FeedApi + 'static,
  {
    let refresh = Arc::new(Notify::new());
    let subscription = {
      let refresh = refresh.clone();
      bus.subscribe_filtered(InboundEvent::is_new_post, move |_| {
        debug!("new feed post announced");
        refresh.notify_one();
      })
    };
    let (filter_tx, filter_rx) = watch::channel(filter);
    let (page_tx, page_rx) = watch::channel(FeedPage::default());
    let task = tokio::spawn(run(api, refresh.clone(), filter_rx, page_tx));

    Self {
      filter: filter_tx,
      page: page_rx,
      refresh,
      _subscription: subscription,
      task,
    }
  }

  /// Replace the filters; triggers a refetch.
  pub fn set_filter(&self, filter: FeedFilter) { self.filter.send_replace(filter); }

  pub fn filter(&self) -> FeedFilter { self.filter.borrow().clone() }

  /// Request a refetch now.
  pub fn refresh(&self) { self.refresh.notify_one(); }

  /// The latest fetched page; `changed()` fires after every successful fetch.
  pub fn page(&self) -> watch::Receiver<FeedPage> { self.page.clone() }
}

impl Drop for FeedSynchronizer {
  fn drop(&mut self) { self.task.abort(); }
}

async fn run<A: FeedApi>(
  api: Arc<A>,
  refresh: Arc<Notify>,
  mut filter: watch::Receiver<FeedFilter>,
  page: watch::Sender<FeedPage>,
) {
  loop {
    tokio::select! {
      _ = refresh.notified() => {}
      changed = filter.changed() => {
        if changed.is_err() {
          break;
        }
      }
    }
    let current = filter.borrow_and_update().clone();
    match api.fetch_feed(&current).await {
      Ok(posts) => {
        debug!(count = posts.len(), "feed refreshed");
        page.send_replace(FeedPage { filter: current, posts });
      }
      // The feed view owns error display; nothing to retry here.
      Err(e) => warn!(error = %e, "feed refresh failed"),
    }
  }
}
