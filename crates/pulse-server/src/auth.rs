//! Session-token lookup for the push channel and bearer auth for the
//! publish API.

use std::collections::HashMap;

use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use serde::Deserialize;

use crate::{AppState, error::Error};

/// One accepted session token and the user it belongs to.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenEntry {
  pub token:   String,
  pub user_id: u64,
}

pub struct TokenAuth {
  sessions:    HashMap<String, u64>,
  /// Shared secret for `/internal/*`; empty disables publishing.
  publish_key: String,
}

impl TokenAuth {
  pub fn new(entries: &[TokenEntry], publish_key: impl Into<String>) -> Self {
    Self {
      sessions:    entries.iter().map(|e| (e.token.clone(), e.user_id)).collect(),
      publish_key: publish_key.into(),
    }
  }

  /// The user a session token belongs to, if it is valid.
  pub fn user_for(&self, token: &str) -> Option<u64> { self.sessions.get(token).copied() }
}

/// Zero-size marker: present in the handler means the caller holds the
/// publish key.
pub struct Publisher;

/// Check `Authorization: Bearer <publish_key>`.
pub fn verify_publisher(headers: &HeaderMap, auth: &TokenAuth) -> Result<(), Error> {
  if auth.publish_key.is_empty() {
    return Err(Error::Unauthorized);
  }
  let key = headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.strip_prefix("Bearer "))
    .ok_or(Error::Unauthorized)?;
  if key != auth.publish_key {
    return Err(Error::Unauthorized);
  }
  Ok(())
}

impl FromRequestParts<AppState> for Publisher {
  type Rejection = Error;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState,
  ) -> Result<Self, Self::Rejection> {
    verify_publisher(&parts.headers, &state.auth)?;
    Ok(Publisher)
  }
}
