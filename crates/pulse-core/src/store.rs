//! The visible set of unread notifications.
//!
//! Two sources feed the store: live pushes and REST history snapshots. The
//! visible list is every live push since the store was created (newest first)
//! followed by the most recent history load (in server order). `content` is
//! the natural key: no two visible items ever share it.
//!
//! The store is a plain state machine. It never talks to the server itself;
//! [`NotificationStore::acknowledge`] and [`NotificationStore::load_history`]
//! report which persisted ids must be marked read, and the caller issues
//! those requests.

use std::{
  collections::{HashMap, HashSet, VecDeque},
  sync::Arc,
};

use chrono::Utc;
use tracing::debug;

use crate::{
  event::NotificationEvent,
  notification::{NotificationId, NotificationItem, SurrogateIds},
};

/// How many acknowledged surrogate items are remembered while waiting for
/// their persisted twin to show up in history.
const DISMISSED_LOCAL_CAP: usize = 64;

/// Result of [`NotificationStore::acknowledge`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acknowledged {
  /// The item that was removed from the visible set.
  pub item:      NotificationItem,
  /// The server id to mark read, when the item has one.
  pub mark_read: Option<u64>,
}

#[derive(Debug, Default)]
pub struct NotificationStore {
  /// Live pushes, newest first.
  live:            Vec<NotificationItem>,
  /// Latest history snapshot, minus anything already shown by `live`.
  history:         Vec<NotificationItem>,
  /// Persisted ids acknowledged in this session.
  dismissed_ids:   HashSet<u64>,
  /// Content of surrogate-id items acknowledged before their persisted twin
  /// was seen in history, oldest first.
  dismissed_local: VecDeque<String>,
  /// Surrogate ids that were replaced by a persisted id, so handles taken
  /// from an older snapshot still resolve.
  adopted:         HashMap<NotificationId, NotificationId>,
  surrogates:      SurrogateIds,
}

impl NotificationStore {
  pub fn new() -> Self { Self::default() }

  /// Prepend an item built from a live push.
  ///
  /// Returns the new item, or `None` when an item with the same content is
  /// already visible. In that case a durable id carried by the push is
  /// adopted by the visible item if it only had a surrogate.
  pub fn push(&mut self, event: NotificationEvent) -> Option<NotificationItem> {
    if let Some(pid) = event.id
      && self.dismissed_ids.contains(&pid)
    {
      debug!(id = pid, "ignoring push for an acknowledged notification");
      return None;
    }

    if let Some(existing) = self.find_mut(&event.content) {
      let adoption = match (existing.id, event.id) {
        (local @ NotificationId::Local(_), Some(pid)) => {
          existing.id = NotificationId::Persisted(pid);
          Some((local, existing.id))
        }
        _ => None,
      };
      if let Some((local, persisted)) = adoption {
        self.adopted.insert(local, persisted);
      }
      debug!("duplicate notification content; not adding");
      return None;
    }
    // A fresh live copy supersedes any earlier dismissal of the same text.
    self.forget_dismissed(&event.content);

    let id = match event.id {
      Some(pid) => NotificationId::Persisted(pid),
      None => self.surrogates.next(),
    };
    let item = NotificationItem {
      id,
      content: event.content,
      link: event.link,
      is_read: false,
      created_at: Utc::now().naive_utc(),
    };
    self.live.insert(0, item.clone());
    Some(item)
  }

  /// Replace the history baseline with a fresh snapshot.
  ///
  /// Items already visible from live pushes keep their position; if one of
  /// them only had a surrogate id it adopts the persisted id from history.
  /// Read items, items acknowledged earlier in the session, and repeated
  /// content are skipped.
  ///
  /// Returns persisted ids whose live copy was acknowledged before this
  /// snapshot revealed them; they must be marked read on the server.
  pub fn load_history(
    &mut self,
    items: impl IntoIterator<Item = NotificationItem>,
  ) -> Vec<u64> {
    let mut deferred = Vec::new();
    let mut seen: HashSet<String> =
      self.live.iter().map(|i| i.content.clone()).collect();
    let mut history = Vec::new();

    for item in items {
      if item.is_read {
        continue;
      }
      if let Some(pid) = item.id.persisted() {
        if self.dismissed_ids.contains(&pid) {
          continue;
        }
        if self.forget_dismissed(&item.content) {
          self.dismissed_ids.insert(pid);
          deferred.push(pid);
          continue;
        }
      }
      if let Some(live) = self.live.iter_mut().find(|l| l.content == item.content) {
        if live.id.is_local() && !item.id.is_local() {
          self.adopted.insert(live.id, item.id);
          live.id = item.id;
        }
        continue;
      }
      if !seen.insert(item.content.clone()) {
        continue;
      }
      history.push(item);
    }

    self.history = history;
    deferred
  }

  /// Remove the item with `id` from the visible set.
  ///
  /// A surrogate id that has since been replaced by a persisted one still
  /// addresses the item. Returns `None` if no such item is visible.
  pub fn acknowledge(&mut self, id: NotificationId) -> Option<Acknowledged> {
    let id = self.adopted.remove(&id).unwrap_or(id);
    let item = take_by_id(&mut self.live, id).or_else(|| take_by_id(&mut self.history, id))?;
    let mark_read = match item.id {
      NotificationId::Persisted(pid) => {
        self.dismissed_ids.insert(pid);
        Some(pid)
      }
      NotificationId::Local(_) => {
        self.remember_dismissed(item.content.clone());
        None
      }
    };
    self.adopted.retain(|_, persisted| *persisted != item.id);
    Some(Acknowledged { item, mark_read })
  }

  /// A point-in-time copy of the visible list, safe to render while the
  /// store keeps changing.
  pub fn snapshot(&self) -> Arc<[NotificationItem]> {
    self.iter().cloned().collect()
  }

  pub fn iter(&self) -> impl Iterator<Item = &NotificationItem> {
    self.live.iter().chain(self.history.iter())
  }

  pub fn get(&self, id: NotificationId) -> Option<&NotificationItem> {
    self.iter().find(|i| i.id == id)
  }

  pub fn len(&self) -> usize { self.live.len() + self.history.len() }

  pub fn is_empty(&self) -> bool { self.len() == 0 }

  /// Number of visible items not yet flagged read.
  pub fn unread_count(&self) -> usize { self.iter().filter(|i| !i.is_read).count() }

  fn remember_dismissed(&mut self, content: String) {
    if self.dismissed_local.contains(&content) {
      return;
    }
    self.dismissed_local.push_back(content);
    if self.dismissed_local.len() > DISMISSED_LOCAL_CAP {
      self.dismissed_local.pop_front();
    }
  }

  /// Drop a remembered dismissal; `true` if there was one.
  fn forget_dismissed(&mut self, content: &str) -> bool {
    match self.dismissed_local.iter().position(|c| c == content) {
      Some(pos) => self.dismissed_local.remove(pos).is_some(),
      None => false,
    }
  }

  fn find_mut(&mut self, content: &str) -> Option<&mut NotificationItem> {
    self
      .live
      .iter_mut()
      .chain(self.history.iter_mut())
      .find(|i| i.content == content)
  }
}

fn take_by_id(items: &mut Vec<NotificationItem>, id: NotificationId) -> Option<NotificationItem> {
  let pos = items.iter().position(|i| i.id == id)?;
  Some(items.remove(pos))
}
