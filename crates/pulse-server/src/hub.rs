//! Registry of live push-channel sockets, keyed by user.
//!
//! A user may hold several sockets at once (several tabs or devices); every
//! one of them receives that user's frames. Each socket task owns the
//! receiving end of an unbounded channel; the hub only holds senders, so a
//! send never waits on a slow socket.

use std::{
  collections::HashMap,
  sync::{Arc, PoisonError, RwLock},
};

use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

struct Peer {
  id: Uuid,
  tx: mpsc::UnboundedSender<String>,
}

#[derive(Clone, Default)]
pub struct Hub {
  peers: Arc<RwLock<HashMap<u64, Vec<Peer>>>>,
}

impl Hub {
  pub fn new() -> Self { Self::default() }

  /// Add a socket for `user_id`. Frames for the user arrive on the returned
  /// receiver until [`unregister`](Self::unregister) is called.
  pub fn register(&self, user_id: u64) -> (Uuid, mpsc::UnboundedReceiver<String>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let id = Uuid::new_v4();
    let mut peers = self.peers.write().unwrap_or_else(PoisonError::into_inner);
    peers.entry(user_id).or_default().push(Peer { id, tx });
    let total: usize = peers.values().map(Vec::len).sum();
    info!(user_id, connection = %id, total, "push socket connected");
    (id, rx)
  }

  pub fn unregister(&self, user_id: u64, connection: Uuid) {
    let mut peers = self.peers.write().unwrap_or_else(PoisonError::into_inner);
    if let Some(list) = peers.get_mut(&user_id) {
      list.retain(|p| p.id != connection);
      if list.is_empty() {
        peers.remove(&user_id);
      }
    }
    info!(user_id, %connection, "push socket disconnected");
  }

  /// Send `frame` to every socket of `user_id`. Returns how many sockets
  /// accepted it; sockets whose task has gone away are pruned.
  pub fn send_personal(&self, user_id: u64, frame: &str) -> usize {
    let mut peers = self.peers.write().unwrap_or_else(PoisonError::into_inner);
    let Some(list) = peers.get_mut(&user_id) else {
      debug!(user_id, "user offline; frame not delivered");
      return 0;
    };
    let delivered = deliver(list, frame);
    if list.is_empty() {
      peers.remove(&user_id);
    }
    delivered
  }

  /// Send `frame` to every connected socket.
  pub fn broadcast(&self, frame: &str) -> usize {
    let mut peers = self.peers.write().unwrap_or_else(PoisonError::into_inner);
    let delivered = peers.values_mut().map(|list| deliver(list, frame)).sum();
    peers.retain(|_, list| !list.is_empty());
    delivered
  }

  /// Users with at least one live socket, ascending.
  pub fn online_users(&self) -> Vec<u64> {
    let peers = self.peers.read().unwrap_or_else(PoisonError::into_inner);
    let mut users: Vec<u64> = peers.keys().copied().collect();
    users.sort_unstable();
    users
  }

  pub fn connection_count(&self) -> usize {
    let peers = self.peers.read().unwrap_or_else(PoisonError::into_inner);
    peers.values().map(Vec::len).sum()
  }
}

fn deliver(list: &mut Vec<Peer>, frame: &str) -> usize {
  let before = list.len();
  list.retain(|peer| peer.tx.send(frame.to_string()).is_ok());
  if list.len() < before {
    debug!(pruned = before - list.len(), "dropped dead push sockets");
  }
  list.len()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn personal_frames_reach_every_socket_of_the_user_only() {
    let hub = Hub::new();
    let (_, mut a1) = hub.register(1);
    let (_, mut a2) = hub.register(1);
    let (_, mut b) = hub.register(2);

    assert_eq!(hub.send_personal(1, "hi"), 2);
    assert_eq!(a1.try_recv().unwrap(), "hi");
    assert_eq!(a2.try_recv().unwrap(), "hi");
    assert!(b.try_recv().is_err());
  }

  #[test]
  fn offline_user_gets_nothing() {
    let hub = Hub::new();
    assert_eq!(hub.send_personal(9, "hi"), 0);
  }

  #[test]
  fn broadcast_reaches_everyone() {
    let hub = Hub::new();
    let (_, mut a) = hub.register(1);
    let (_, mut b) = hub.register(2);

    assert_eq!(hub.broadcast("all"), 2);
    assert_eq!(a.try_recv().unwrap(), "all");
    assert_eq!(b.try_recv().unwrap(), "all");
  }

  #[test]
  fn dead_sockets_are_pruned_on_send() {
    let hub = Hub::new();
    let (_, live) = hub.register(1);
    let (_, dead) = hub.register(1);
    drop(dead);

    assert_eq!(hub.send_personal(1, "x"), 1);
    assert_eq!(hub.connection_count(), 1);
    drop(live);
    assert_eq!(hub.broadcast("y"), 0);
    assert!(hub.online_users().is_empty());
  }

  #[test]
  fn unregister_removes_empty_users() {
    let hub = Hub::new();
    let (id, _rx) = hub.register(3);
    assert_eq!(hub.online_users(), vec![3]);
    hub.unregister(3, id);
    assert!(hub.online_users().is_empty());
    assert_eq!(hub.connection_count(), 0);
  }
}
