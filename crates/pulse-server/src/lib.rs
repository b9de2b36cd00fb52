//! Push-channel server for Pulse.
//!
//! Exposes an axum [`Router`] with the per-user WebSocket endpoint and the
//! internal publish API the rest of the backend uses to reach connected
//! clients.

pub mod auth;
pub mod error;
pub mod hub;
pub mod publish;
pub mod ws;

pub use error::Error;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use auth::{TokenAuth, TokenEntry};
use hub::Hub;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `server.toml`.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:        String,
  pub port:        u16,
  /// Bearer key for `/internal/*`. Empty disables the publish API.
  #[serde(default)]
  pub publish_key: String,
  /// Session tokens accepted on `/ws`.
  #[serde(default)]
  pub tokens:      Vec<TokenEntry>,
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
#[derive(Clone)]
pub struct AppState {
  pub hub:  Hub,
  pub auth: Arc<TokenAuth>,
}

impl AppState {
  pub fn new(config: &ServerConfig) -> Self {
    Self {
      hub:  Hub::new(),
      auth: Arc::new(TokenAuth::new(&config.tokens, config.publish_key.clone())),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build an axum [`Router`] for the push server.
pub fn router(state: AppState) -> Router {
  Router::new()
    .route("/ws",                          get(ws::handler))
    .route("/internal/users/{id}/notify",  post(publish::notify))
    .route("/internal/broadcast",          post(publish::broadcast))
    .route("/internal/online",             get(publish::online))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}
