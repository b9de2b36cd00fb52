//! Error type for `pulse-client`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("{path} → {status}")]
  Status {
    path:   String,
    status: reqwest::StatusCode,
  },

  #[error("websocket error: {0}")]
  WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

  #[error("transport error: {0}")]
  Transport(String),

  #[error("invalid url {url:?}: {reason}")]
  InvalidUrl { url: String, reason: String },

  #[error("config error: {0}")]
  Config(#[from] config::ConfigError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
