//! Error types for `pulse-core`.

use thiserror::Error;

/// Why a raw push frame could not be turned into an
/// [`InboundEvent`](crate::event::InboundEvent).
#[derive(Debug, Error)]
pub enum DecodeError {
  #[error("frame is not valid JSON: {0}")]
  Malformed(#[source] serde_json::Error),

  #[error("frame is not a JSON object")]
  NotAnObject,

  #[error("frame has no string `type` discriminator")]
  MissingType,

  #[error("unknown frame type: {0:?}")]
  UnknownType(String),

  #[error("invalid {kind:?} frame: {source}")]
  InvalidShape {
    kind:   String,
    #[source]
    source: serde_json::Error,
  },
}

pub type Result<T, E = DecodeError> = std::result::Result<T, E>;
