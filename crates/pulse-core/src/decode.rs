//! Turns raw push frames into [`InboundEvent`]s.

use std::collections::HashSet;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::{
  error::{DecodeError, Result},
  event::{FEED_UPDATE, InboundEvent, NOTIFICATION},
};

/// Validates and classifies push frames.
///
/// `notification` and `feed_update` are always recognised. Further kinds are
/// opted into with [`Decoder::with_kind`] and decode to
/// [`InboundEvent::Custom`]; any other `type` is rejected.
#[derive(Debug, Clone, Default)]
pub struct Decoder {
  custom_kinds: HashSet<String>,
}

impl Decoder {
  pub fn new() -> Self { Self::default() }

  /// Accept frames whose `type` is `kind` and forward them untouched.
  pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
    self.custom_kinds.insert(kind.into());
    self
  }

  pub fn decode(&self, raw: &str) -> Result<InboundEvent> {
    let value: Value = serde_json::from_str(raw).map_err(DecodeError::Malformed)?;
    let Value::Object(mut map) = value else {
      return Err(DecodeError::NotAnObject);
    };
    let kind = match map.remove("type") {
      Some(Value::String(kind)) => kind,
      _ => return Err(DecodeError::MissingType),
    };

    if kind == NOTIFICATION {
      shape(&kind, map).map(InboundEvent::Notification)
    } else if kind == FEED_UPDATE {
      shape(&kind, map).map(InboundEvent::FeedUpdate)
    } else if self.custom_kinds.contains(&kind) {
      Ok(InboundEvent::Custom { kind, payload: map })
    } else {
      Err(DecodeError::UnknownType(kind))
    }
  }
}

fn shape<T: DeserializeOwned>(kind: &str, map: Map<String, Value>) -> Result<T> {
  serde_json::from_value(Value::Object(map)).map_err(|source| {
    DecodeError::InvalidShape { kind: kind.to_string(), source }
  })
}
