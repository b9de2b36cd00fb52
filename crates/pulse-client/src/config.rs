//! Client configuration.

use std::{path::Path, time::Duration};

use reqwest::Url;
use serde::Deserialize;

use crate::{
  connection::ReconnectPolicy,
  error::{Error, Result},
};

/// Lower and upper bounds applied to `reconnect_delay_ms`.
const MIN_RECONNECT_DELAY: Duration = Duration::from_millis(100);
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(300);

/// Runtime client configuration, deserialised from an optional TOML file and
/// `PULSE_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
  /// Base URL of the REST API, e.g. `http://localhost:8000`.
  pub base_url:                String,
  /// Push channel URL. Derived from `base_url` (`ws[s]://…/ws`) when unset.
  #[serde(default)]
  pub ws_url:                  Option<String>,
  /// Session token issued at login.
  #[serde(default)]
  pub token:                   String,
  #[serde(default = "default_reconnect_delay_ms")]
  pub reconnect_delay_ms:      u64,
  #[serde(default = "default_request_timeout_secs")]
  pub request_timeout_secs:    u64,
  /// Keep reconnecting after the server rejects the token (close code 4003).
  #[serde(default)]
  pub retry_on_auth_rejection: bool,
}

fn default_reconnect_delay_ms() -> u64 { 3000 }

fn default_request_timeout_secs() -> u64 { 30 }

impl ClientConfig {
  /// Load from `path` (if given and present) layered under `PULSE_*`
  /// environment variables.
  pub fn load(path: Option<&Path>) -> Result<Self> {
    let mut builder = config::Config::builder()
      .set_default("base_url", "http://localhost:8000")?;
    if let Some(path) = path {
      builder = builder.add_source(config::File::from(path).required(false));
    }
    let settings = builder
      .add_source(config::Environment::with_prefix("PULSE"))
      .build()?;
    Ok(settings.try_deserialize()?)
  }

  pub fn reconnect_policy(&self) -> ReconnectPolicy {
    ReconnectPolicy {
      delay:                   Duration::from_millis(self.reconnect_delay_ms)
        .clamp(MIN_RECONNECT_DELAY, MAX_RECONNECT_DELAY),
      retry_on_auth_rejection: self.retry_on_auth_rejection,
    }
  }

  pub fn request_timeout(&self) -> Duration {
    Duration::from_secs(self.request_timeout_secs)
  }

  /// The push channel endpoint, without the token.
  pub fn push_url(&self) -> Result<Url> {
    if let Some(ws) = &self.ws_url {
      return parse_url(ws);
    }
    let mut url = parse_url(&self.base_url)?;
    let scheme = match url.scheme() {
      "https" => "wss",
      "http" => "ws",
      other => other,
    }
    .to_string();
    url.set_scheme(&scheme).map_err(|()| Error::InvalidUrl {
      url:    self.base_url.clone(),
      reason: format!("cannot switch scheme to {scheme}"),
    })?;
    let path = format!("{}/ws", url.path().trim_end_matches('/'));
    url.set_path(&path);
    Ok(url)
  }
}

fn parse_url(raw: &str) -> Result<Url> {
  Url::parse(raw).map_err(|e| Error::InvalidUrl {
    url:    raw.to_string(),
    reason: e.to_string(),
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  fn config(base_url: &str) -> ClientConfig {
    ClientConfig {
      base_url:                base_url.to_string(),
      ws_url:                  None,
      token:                   "t".into(),
      reconnect_delay_ms:      default_reconnect_delay_ms(),
      request_timeout_secs:    default_request_timeout_secs(),
      retry_on_auth_rejection: false,
    }
  }

  #[test]
  fn push_url_is_derived_from_base_url() {
    assert_eq!(
      config("http://localhost:8000").push_url().unwrap().as_str(),
      "ws://localhost:8000/ws"
    );
    assert_eq!(
      config("https://erp.example.com/api/").push_url().unwrap().as_str(),
      "wss://erp.example.com/api/ws"
    );
  }

  #[test]
  fn explicit_ws_url_wins() {
    let mut cfg = config("http://localhost:8000");
    cfg.ws_url = Some("ws://push.internal:9000/ws".into());
    assert_eq!(cfg.push_url().unwrap().as_str(), "ws://push.internal:9000/ws");
  }

  #[test]
  fn invalid_base_url_is_an_error() {
    assert!(matches!(
      config("not a url").push_url(),
      Err(Error::InvalidUrl { .. })
    ));
  }

  #[test]
  fn reconnect_delay_defaults_to_three_seconds_and_is_bounded() {
    let mut cfg = config("http://localhost:8000");
    assert_eq!(cfg.reconnect_policy().delay, Duration::from_secs(3));
    cfg.reconnect_delay_ms = 0;
    assert_eq!(cfg.reconnect_policy().delay, MIN_RECONNECT_DELAY);
    cfg.reconnect_delay_ms = u64::MAX;
    assert_eq!(cfg.reconnect_policy().delay, MAX_RECONNECT_DELAY);
  }

  #[test]
  fn load_without_file_uses_defaults() {
    let cfg = ClientConfig::load(None).unwrap();
    assert_eq!(cfg.reconnect_delay_ms, 3000);
    assert!(!cfg.retry_on_auth_rejection);
  }
}
