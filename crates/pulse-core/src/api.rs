//! Traits for the REST collaborators the real-time core relies on.
//!
//! Implemented over HTTP by `pulse-client`; tests substitute in-memory fakes.

use std::future::Future;

use crate::{
  feed::{FeedFilter, FeedPost},
  notification::NotificationItem,
};

/// Notification history and read-state endpoints.
pub trait NotificationApi: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Fetch the user's unread notifications, newest first.
  fn fetch_history(
    &self,
  ) -> impl Future<Output = Result<Vec<NotificationItem>, Self::Error>> + Send + '_;

  /// Mark a persisted notification read. Idempotent on the server.
  fn mark_read(
    &self,
    id: u64,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}

/// The paginated, filterable activity feed.
pub trait FeedApi: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Fetch the current page of the feed under `filter`.
  fn fetch_feed<'a>(
    &'a self,
    filter: &'a FeedFilter,
  ) -> impl Future<Output = Result<Vec<FeedPost>, Self::Error>> + Send + 'a;
}
