//! Notification items and their identities.

use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Identity ────────────────────────────────────────────────────────────────

/// Identity of a visible notification.
///
/// A notification pushed live usually has no durable id yet, so it is given a
/// client-side surrogate. Keeping the two spaces as separate variants means
/// nothing has to guess from the magnitude of a number whether the server
/// knows about an item. The derived ordering places every `Local` id above
/// every `Persisted` id.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum NotificationId {
  /// Assigned by the server; addressable by `mark read`.
  Persisted(u64),
  /// Surrogate assigned on this client; unknown to the server.
  Local(u64),
}

impl NotificationId {
  pub fn is_local(&self) -> bool { matches!(self, Self::Local(_)) }

  /// The server id, if this item has one.
  pub fn persisted(&self) -> Option<u64> {
    match self {
      Self::Persisted(id) => Some(*id),
      Self::Local(_) => None,
    }
  }
}

/// Source of surrogate ids: microsecond timestamps, bumped so that every id
/// handed out is strictly larger than the previous one.
#[derive(Debug, Default)]
pub struct SurrogateIds {
  last: u64,
}

impl SurrogateIds {
  pub fn next(&mut self) -> NotificationId {
    let now = u64::try_from(Utc::now().timestamp_micros()).unwrap_or_default();
    self.last = now.max(self.last + 1);
    NotificationId::Local(self.last)
  }
}

// ─── Items ───────────────────────────────────────────────────────────────────

/// One entry in the visible notification list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationItem {
  pub id:         NotificationId,
  /// Natural key for de-duplication between live and fetched copies.
  pub content:    String,
  pub link:       Option<String>,
  pub is_read:    bool,
  pub created_at: NaiveDateTime,
}

/// A notification as returned by `GET /notifications/`.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationRecord {
  pub id:         u64,
  pub content:    String,
  #[serde(default)]
  pub link:       Option<String>,
  #[serde(default)]
  pub is_read:    bool,
  pub created_at: NaiveDateTime,
}

impl From<NotificationRecord> for NotificationItem {
  fn from(r: NotificationRecord) -> Self {
    Self {
      id:         NotificationId::Persisted(r.id),
      content:    r.content,
      link:       r.link,
      is_read:    r.is_read,
      created_at: r.created_at,
    }
  }
}
