//! Activity-feed types.
//!
//! The feed itself is owned by the REST layer; the core only knows how to ask
//! for a page of it and how a `feed_update` push describes a new post.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// A single post as returned by `GET /feed/` and carried by `feed_update`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedPost {
  pub id:         u64,
  pub content:    String,
  #[serde(default)]
  pub icon:       Option<String>,
  pub created_at: NaiveDateTime,
  pub user_name:  String,
  #[serde(default = "default_visibility")]
  pub visibility: String,
}

fn default_visibility() -> String { "public".to_string() }

/// What happened to the feed, as named by a `feed_update` frame's `action`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FeedAction {
  NewPost,
  /// Any action this client does not act on; kept verbatim.
  Other(String),
}

impl From<String> for FeedAction {
  fn from(s: String) -> Self {
    match s.as_str() {
      "new_post" => Self::NewPost,
      _ => Self::Other(s),
    }
  }
}

impl From<FeedAction> for String {
  fn from(action: FeedAction) -> Self {
    match action {
      FeedAction::NewPost => "new_post".to_string(),
      FeedAction::Other(s) => s,
    }
  }
}

/// Filters applied to the feed listing. Set by the feed view; the core reads
/// them when it refetches and never changes them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedFilter {
  /// Only posts authored by this user id.
  pub author:     Option<u64>,
  /// Only posts created on or after this date.
  pub start_date: Option<NaiveDate>,
  /// Only posts created on or before this date (inclusive of the whole day).
  pub end_date:   Option<NaiveDate>,
}

impl FeedFilter {
  /// Query-string pairs understood by `GET /feed/`.
  pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
    let mut pairs = Vec::new();
    if let Some(author) = self.author {
      pairs.push(("user_id", author.to_string()));
    }
    if let Some(start) = self.start_date {
      pairs.push(("start_date", midnight(start)));
    }
    if let Some(end) = self.end_date {
      pairs.push(("end_date", midnight(end)));
    }
    pairs
  }
}

fn midnight(date: NaiveDate) -> String {
  date.and_time(NaiveTime::MIN).format("%Y-%m-%dT%H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_filter_has_no_query_pairs() {
    assert!(FeedFilter::default().query_pairs().is_empty());
  }

  #[test]
  fn filter_renders_dates_as_midnight_datetimes() {
    let filter = FeedFilter {
      author:     Some(7),
      start_date: NaiveDate::from_ymd_opt(2024, 3, 1),
      end_date:   NaiveDate::from_ymd_opt(2024, 3, 31),
    };
    assert_eq!(filter.query_pairs(), vec![
      ("user_id", "7".to_string()),
      ("start_date", "2024-03-01T00:00:00".to_string()),
      ("end_date", "2024-03-31T00:00:00".to_string()),
    ]);
  }

  #[test]
  fn unknown_feed_action_is_preserved() {
    let action: FeedAction = serde_json::from_str("\"deleted_post\"").unwrap();
    assert_eq!(action, FeedAction::Other("deleted_post".into()));
    assert_eq!(serde_json::to_string(&action).unwrap(), "\"deleted_post\"");
  }
}
