//! Async front for the notification store.
//!
//! Wraps [`NotificationStore`] with the REST collaborator that fetches history
//! and marks items read, and publishes every new visible snapshot on a
//! `watch` channel so several views (bell badge, dropdown) stay in step.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use pulse_core::{
  api::NotificationApi,
  event::NotificationEvent,
  notification::{NotificationId, NotificationItem},
  store::NotificationStore,
};
use tokio::sync::watch;
use tracing::{debug, info, warn};

pub type Snapshot = Arc<[NotificationItem]>;

pub struct NotificationCenter<A> {
  store:   Arc<Mutex<NotificationStore>>,
  api:     Arc<A>,
  visible: Arc<watch::Sender<Snapshot>>,
}

impl<A> Clone for NotificationCenter<A> {
  fn clone(&self) -> Self {
    Self {
      store:   self.store.clone(),
      api:     self.api.clone(),
      visible: self.visible.clone(),
    }
  }
}

impl<A: NotificationApi> NotificationCenter<A> {
  pub fn new(api: Arc<A>) -> Self {
    let (visible, _) = watch::channel(Snapshot::from(Vec::new()));
    Self {
      store: Arc::new(Mutex::new(NotificationStore::new())),
      api,
      visible: Arc::new(visible),
    }
  }

  /// Add a live push to the top of the list.
  pub fn push(&self, event: NotificationEvent) {
    let mut store = self.lock();
    if let Some(item) = store.push(event) {
      debug!(id = ?item.id, "notification pushed");
    }
    // A rejected duplicate may still have adopted a durable id.
    self.visible.send_replace(store.snapshot());
  }

  /// Fetch the history snapshot and merge it in.
  ///
  /// A failed fetch is logged and leaves the store as it was; live pushes
  /// keep arriving regardless.
  pub async fn load_history(&self) {
    let items = match self.api.fetch_history().await {
      Ok(items) => items,
      Err(e) => {
        warn!(error = %e, "failed to fetch notification history");
        return;
      }
    };
    let count = items.len();
    let deferred = {
      let mut store = self.lock();
      let deferred = store.load_history(items);
      self.visible.send_replace(store.snapshot());
      deferred
    };
    info!(count, "notification history loaded");
    for id in deferred {
      self.mark_read(id).await;
    }
  }

  /// Remove an item from the visible list and, if the server knows it, mark
  /// it read there.
  ///
  /// Removal is immediate and final: a failed mark-read is logged, and the
  /// item is not restored.
  pub async fn acknowledge(&self, id: NotificationId) -> Option<NotificationItem> {
    let acked = {
      let mut store = self.lock();
      let acked = store.acknowledge(id)?;
      self.visible.send_replace(store.snapshot());
      acked
    };
    if let Some(pid) = acked.mark_read {
      self.mark_read(pid).await;
    }
    Some(acked.item)
  }

  /// The current visible list.
  pub fn snapshot(&self) -> Snapshot { self.visible.borrow().clone() }

  /// Subscribe to visible-list changes.
  pub fn watch(&self) -> watch::Receiver<Snapshot> { self.visible.subscribe() }

  pub fn unread_count(&self) -> usize { self.lock().unread_count() }

  async fn mark_read(&self, id: u64) {
    match self.api.mark_read(id).await {
      Ok(()) => debug!(id, "notification marked read"),
      Err(e) => warn!(id, error = %e, "failed to mark notification read"),
    }
  }

  fn lock(&self) -> MutexGuard<'_, NotificationStore> {
    self.store.lock().unwrap_or_else(PoisonError::into_inner)
  }
}
