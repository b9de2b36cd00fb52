//! Inbound push events.
//!
//! Every frame on the push channel is a JSON object with a `type`
//! discriminator. [`InboundEvent`] is the typed form the rest of the system
//! works with; [`Decoder`](crate::decode::Decoder) produces it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::feed::{FeedAction, FeedPost};

/// Close code the server sends when the session token is invalid or expired.
pub const AUTH_REJECTED: u16 = 4003;

pub const NOTIFICATION: &str = "notification";
pub const FEED_UPDATE: &str = "feed_update";

// ─── Kinds ───────────────────────────────────────────────────────────────────

/// The value of a frame's `type` field, used by bus subscribers to filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
  Notification,
  FeedUpdate,
  /// A kind registered with [`Decoder::with_kind`](crate::decode::Decoder::with_kind).
  Custom(String),
}

impl EventKind {
  pub fn as_str(&self) -> &str {
    match self {
      Self::Notification => NOTIFICATION,
      Self::FeedUpdate => FEED_UPDATE,
      Self::Custom(kind) => kind,
    }
  }
}

// ─── Payloads ────────────────────────────────────────────────────────────────

/// Body of a `notification` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEvent {
  /// Durable id, present only when the server persisted the notification
  /// before pushing it.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub id:      Option<u64>,
  pub content: String,
  #[serde(default)]
  pub link:    Option<String>,
}

/// Body of a `feed_update` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedUpdate {
  pub action: FeedAction,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub post:   Option<FeedPost>,
}

// ─── Event ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
  Notification(NotificationEvent),
  FeedUpdate(FeedUpdate),
  /// A registered application-specific kind, forwarded untouched.
  Custom {
    kind:    String,
    /// The frame's fields minus `type`.
    payload: Map<String, Value>,
  },
}

impl InboundEvent {
  pub fn kind(&self) -> EventKind {
    match self {
      Self::Notification(_) => EventKind::Notification,
      Self::FeedUpdate(_) => EventKind::FeedUpdate,
      Self::Custom { kind, .. } => EventKind::Custom(kind.clone()),
    }
  }

  /// `true` for a `feed_update` announcing a new post.
  pub fn is_new_post(&self) -> bool {
    matches!(
      self,
      Self::FeedUpdate(FeedUpdate { action: FeedAction::NewPost, .. })
    )
  }

  /// The wire form of this event, `type` included.
  pub fn to_frame(&self) -> Value {
    let (kind, body) = match self {
      Self::Notification(n) => (NOTIFICATION, serde_json::to_value(n)),
      Self::FeedUpdate(f) => (FEED_UPDATE, serde_json::to_value(f)),
      Self::Custom { kind, payload } => {
        (kind.as_str(), Ok(Value::Object(payload.clone())))
      }
    };
    // Both payload structs serialise to objects; a failure here would be a
    // bug in their derives, so fall back to a bare frame.
    let mut map = match body {
      Ok(Value::Object(map)) => map,
      _ => Map::new(),
    };
    map.insert("type".to_string(), Value::String(kind.to_string()));
    Value::Object(map)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn notification_frame_carries_type() {
    let event = InboundEvent::Notification(NotificationEvent {
      id:      None,
      content: "Ana mentioned you".into(),
      link:    Some("/".into()),
    });
    let frame = event.to_frame();
    assert_eq!(frame["type"], "notification");
    assert_eq!(frame["content"], "Ana mentioned you");
    assert_eq!(frame["link"], "/");
    assert!(frame.get("id").is_none());
  }

  #[test]
  fn new_post_detection() {
    let new_post = InboundEvent::FeedUpdate(FeedUpdate {
      action: FeedAction::NewPost,
      post:   None,
    });
    let other = InboundEvent::FeedUpdate(FeedUpdate {
      action: FeedAction::Other("edited".into()),
      post:   None,
    });
    assert!(new_post.is_new_post());
    assert!(!other.is_new_post());
    assert_eq!(other.kind(), EventKind::FeedUpdate);
  }
}
