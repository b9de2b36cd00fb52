//! Routes decoded push frames to the notification store and the event bus.

use pulse_core::{
  api::NotificationApi,
  bus::EventBus,
  decode::Decoder,
  event::InboundEvent,
};
use tracing::{debug, warn};

use crate::notifications::NotificationCenter;

/// Receiver of raw text frames from the connection manager.
///
/// Implementations must not panic; a bad frame is dropped, never fatal to
/// the connection.
pub trait Dispatch: Send + Sync + 'static {
  fn dispatch(&self, raw: &str);
}

pub struct Router<A> {
  decoder:       Decoder,
  notifications: NotificationCenter<A>,
  bus:           EventBus,
}

impl<A: NotificationApi> Router<A> {
  pub fn new(decoder: Decoder, notifications: NotificationCenter<A>, bus: EventBus) -> Self {
    Self { decoder, notifications, bus }
  }
}

impl<A: NotificationApi + 'static> Dispatch for Router<A> {
  fn dispatch(&self, raw: &str) {
    let event = match self.decoder.decode(raw) {
      Ok(event) => event,
      Err(e) => {
        warn!(error = %e, len = raw.len(), "dropping push frame");
        return;
      }
    };
    debug!(kind = event.kind().as_str(), "push frame received");

    if let InboundEvent::Notification(notification) = &event {
      self.notifications.push(notification.clone());
    }
    self.bus.publish(&event);
  }
}
