//! In-process publish/subscribe for inbound events.
//!
//! Consumers register a handler (optionally behind a predicate) and receive
//! every matching event synchronously, in registration order. Each dispatch is
//! isolated: a panicking handler is logged and the remaining handlers still
//! run.

use std::{
  panic::{AssertUnwindSafe, catch_unwind},
  sync::{
    Arc, Mutex, MutexGuard, PoisonError, Weak,
    atomic::{AtomicBool, Ordering},
  },
};

use tracing::error;

use crate::event::{EventKind, InboundEvent};

type Handler = Arc<dyn Fn(&InboundEvent) + Send + Sync>;
type Predicate = Arc<dyn Fn(&InboundEvent) -> bool + Send + Sync>;

#[derive(Clone)]
struct Entry {
  id:        u64,
  predicate: Option<Predicate>,
  handler:   Handler,
  active:    Arc<AtomicBool>,
}

#[derive(Default)]
struct Registry {
  next_id: u64,
  entries: Vec<Entry>,
}

/// Cheap to clone; all clones share one subscriber list.
#[derive(Clone, Default)]
pub struct EventBus {
  registry: Arc<Mutex<Registry>>,
}

impl EventBus {
  pub fn new() -> Self { Self::default() }

  /// Receive every published event.
  pub fn subscribe<F>(&self, handler: F) -> Subscription
  where
    F: Fn(&InboundEvent) + Send + Sync + 'static,
  {
    self.register(None, Arc::new(handler))
  }

  /// Receive only events for which `predicate` returns `true`.
  pub fn subscribe_filtered<P, F>(&self, predicate: P, handler: F) -> Subscription
  where
    P: Fn(&InboundEvent) -> bool + Send + Sync + 'static,
    F: Fn(&InboundEvent) + Send + Sync + 'static,
  {
    self.register(Some(Arc::new(predicate)), Arc::new(handler))
  }

  /// Receive only events of one kind.
  pub fn subscribe_kind<F>(&self, kind: EventKind, handler: F) -> Subscription
  where
    F: Fn(&InboundEvent) + Send + Sync + 'static,
  {
    self.subscribe_filtered(move |event| event.kind() == kind, handler)
  }

  /// Deliver `event` to every current subscriber, in registration order.
  ///
  /// The subscriber list is snapshotted before dispatch, so handlers may
  /// subscribe, unsubscribe, or publish from inside a callback. A handler
  /// unsubscribed during this dispatch is not called afterwards.
  pub fn publish(&self, event: &InboundEvent) {
    let entries = self.lock().entries.clone();
    for entry in entries {
      if !entry.active.load(Ordering::Acquire) {
        continue;
      }
      // A panic in the predicate or the handler is contained to this subscriber.
      let outcome = catch_unwind(AssertUnwindSafe(|| {
        if entry.predicate.as_ref().is_none_or(|accepts| accepts(event)) {
          (entry.handler)(event);
        }
      }));
      if outcome.is_err() {
        error!(
          subscription = entry.id,
          kind = event.kind().as_str(),
          "event bus subscriber panicked"
        );
      }
    }
  }

  pub fn subscriber_count(&self) -> usize { self.lock().entries.len() }

  fn register(&self, predicate: Option<Predicate>, handler: Handler) -> Subscription {
    let active = Arc::new(AtomicBool::new(true));
    let mut registry = self.lock();
    let id = registry.next_id;
    registry.next_id += 1;
    registry.entries.push(Entry {
      id,
      predicate,
      handler,
      active: active.clone(),
    });
    Subscription {
      id,
      active,
      registry: Arc::downgrade(&self.registry),
    }
  }

  fn lock(&self) -> MutexGuard<'_, Registry> {
    self.registry.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

/// Handle returned by the `subscribe*` methods.
///
/// Unsubscribes when [`unsubscribe`](Self::unsubscribe) is called or when the
/// handle is dropped, whichever comes first.
#[must_use = "dropping a Subscription unsubscribes it immediately"]
pub struct Subscription {
  id:       u64,
  active:   Arc<AtomicBool>,
  registry: Weak<Mutex<Registry>>,
}

impl Subscription {
  /// Stop delivery to this handler. Safe to call any number of times, and
  /// effective immediately even from inside the handler itself.
  pub fn unsubscribe(&self) {
    if !self.active.swap(false, Ordering::AcqRel) {
      return;
    }
    if let Some(registry) = self.registry.upgrade() {
      registry
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .entries
        .retain(|e| e.id != self.id);
    }
  }

  pub fn is_active(&self) -> bool { self.active.load(Ordering::Acquire) }
}

impl Drop for Subscription {
  fn drop(&mut self) { self.unsubscribe(); }
}

impl std::fmt::Debug for Subscription {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Subscription")
      .field("id", &self.id)
      .field("active", &self.is_active())
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::AtomicUsize;

  use super::*;
  use crate::{
    event::{FeedUpdate, NotificationEvent},
    feed::FeedAction,
  };

  fn notification(content: &str) -> InboundEvent {
    InboundEvent::Notification(NotificationEvent {
      id:      None,
      content: content.into(),
      link:    None,
    })
  }

  fn new_post() -> InboundEvent {
    InboundEvent::FeedUpdate(FeedUpdate {
      action: FeedAction::NewPost,
      post:   None,
    })
  }

  fn counter() -> (Arc<AtomicUsize>, impl Fn(&InboundEvent) + Send + Sync + 'static) {
    let count = Arc::new(AtomicUsize::new(0));
    let c = count.clone();
    (count, move |_: &InboundEvent| {
      c.fetch_add(1, Ordering::SeqCst);
    })
  }

  #[test]
  fn subscriber_receives_published_event_once() {
    let bus = EventBus::new();
    let (count, handler) = counter();
    let _sub = bus.subscribe(handler);

    bus.publish(&notification("A"));
    assert_eq!(count.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn unsubscribe_stops_delivery_and_is_idempotent() {
    let bus = EventBus::new();
    let (count, handler) = counter();
    let sub = bus.subscribe(handler);

    bus.publish(&notification("A"));
    sub.unsubscribe();
    sub.unsubscribe();
    bus.publish(&notification("B"));

    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert_eq!(bus.subscriber_count(), 0);
    assert!(!sub.is_active());
  }

  #[test]
  fn dropping_subscription_unsubscribes() {
    let bus = EventBus::new();
    let (count, handler) = counter();
    drop(bus.subscribe(handler));

    bus.publish(&notification("A"));
    assert_eq!(count.load(Ordering::SeqCst), 0);
  }

  #[test]
  fn delivery_follows_registration_order() {
    let bus = EventBus::new();
    let order = Arc::new(Mutex::new(Vec::new()));
    let subs: Vec<_> = (0..4)
      .map(|i| {
        let order = order.clone();
        bus.subscribe(move |_| order.lock().unwrap().push(i))
      })
      .collect();

    bus.publish(&notification("A"));
    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
    drop(subs);
  }

  #[test]
  fn panicking_handler_does_not_block_later_handlers() {
    let bus = EventBus::new();
    let _boom = bus.subscribe(|_| panic!("handler failure"));
    let (count, handler) = counter();
    let _sub = bus.subscribe(handler);

    bus.publish(&notification("A"));
    bus.publish(&notification("B"));
    assert_eq!(count.load(Ordering::SeqCst), 2);
  }

  #[test]
  fn panicking_predicate_does_not_block_later_handlers() {
    let bus = EventBus::new();
    let _boom = bus.subscribe_filtered(|_| panic!("predicate failure"), |_| {});
    let (count, handler) = counter();
    let _sub = bus.subscribe(handler);

    bus.publish(&notification("A"));
    bus.publish(&notification("B"));
    assert_eq!(count.load(Ordering::SeqCst), 2);
  }

  #[test]
  fn kind_filter_only_sees_matching_events() {
    let bus = EventBus::new();
    let (count, handler) = counter();
    let _sub = bus.subscribe_kind(EventKind::FeedUpdate, handler);

    bus.publish(&notification("A"));
    assert_eq!(count.load(Ordering::SeqCst), 0);
    bus.publish(&new_post());
    assert_eq!(count.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn handler_unsubscribing_itself_mid_dispatch_is_not_called_again() {
    let bus = EventBus::new();
    let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
    let calls = Arc::new(AtomicUsize::new(0));

    let sub = {
      let slot = slot.clone();
      let calls = calls.clone();
      let inner_bus = bus.clone();
      bus.subscribe(move |_| {
        calls.fetch_add(1, Ordering::SeqCst);
        if let Some(me) = slot.lock().unwrap().as_ref() {
          me.unsubscribe();
        }
        // Re-entrant publish must not reach this handler again.
        inner_bus.publish(&notification("nested"));
      })
    };
    *slot.lock().unwrap() = Some(sub);

    bus.publish(&notification("A"));
    bus.publish(&notification("B"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn handler_unsubscribed_by_earlier_handler_in_same_dispatch_is_skipped() {
    let bus = EventBus::new();
    let (count, handler) = counter();
    let victim = Arc::new(Mutex::new(None::<Subscription>));

    let _killer = {
      let victim = victim.clone();
      bus.subscribe(move |_| {
        if let Some(sub) = victim.lock().unwrap().as_ref() {
          sub.unsubscribe();
        }
      })
    };
    *victim.lock().unwrap() = Some(bus.subscribe(handler));

    bus.publish(&notification("A"));
    assert_eq!(count.load(Ordering::SeqCst), 0);
  }

  #[test]
  fn subscription_outliving_bus_unsubscribes_quietly() {
    let bus = EventBus::new();
    let sub = bus.subscribe(|_| {});
    drop(bus);
    sub.unsubscribe();
    assert!(!sub.is_active());
  }
}
