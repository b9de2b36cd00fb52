//! Wiring for one logged-in session.
//!
//! A [`Session`] owns the event bus, the notification center, the feed
//! synchronizer, and the connection manager. Logging out is
//! [`Session::end`]; a new login builds a new session.

use std::sync::Arc;

use pulse_core::{
  api::{FeedApi, NotificationApi},
  bus::EventBus,
  decode::Decoder,
  feed::FeedFilter,
};
use reqwest::Url;
use tracing::info;

use crate::{
  config::ClientConfig,
  connection::{ConnectionManager, ReconnectPolicy},
  error::Result,
  feed::FeedSynchronizer,
  notifications::NotificationCenter,
  rest::RestClient,
  router::Router,
  transport::{Transport, WsTransport},
};

/// Everything [`Session::new`] needs besides the transport and REST client.
#[derive(Debug, Clone)]
pub struct SessionOptions {
  pub push_url: Url,
  pub token:    String,
  pub policy:   ReconnectPolicy,
  pub decoder:  Decoder,
  pub filter:   FeedFilter,
}

pub struct Session<T: Transport, A> {
  bus:           EventBus,
  notifications: NotificationCenter<A>,
  feed:          FeedSynchronizer,
  connection:    ConnectionManager<T>,
}

impl Session<WsTransport, RestClient> {
  /// A WebSocket + HTTP session built from configuration.
  pub fn from_config(config: &ClientConfig) -> Result<Self> {
    let api = Arc::new(RestClient::new(config)?);
    let options = SessionOptions {
      push_url: config.push_url()?,
      token:    config.token.clone(),
      policy:   config.reconnect_policy(),
      decoder:  Decoder::new(),
      filter:   FeedFilter::default(),
    };
    Ok(Self::new(WsTransport, api, options))
  }
}

impl<T, A> Session<T, A>
where
  T: Transport,
  A: NotificationApi + FeedApi + 'static,
{
  pub fn new(transport: T, api: Arc<A>, options: SessionOptions) -> Self {
    let bus = EventBus::new();
    let notifications = NotificationCenter::new(api.clone());
    let feed = FeedSynchronizer::spawn(&bus, api, options.filter);
    let router = Router::new(options.decoder, notifications.clone(), bus.clone());
    let connection = ConnectionManager::new(
      transport,
      options.push_url,
      &options.token,
      options.policy,
      Arc::new(router),
    );
    Self { bus, notifications, feed, connection }
  }

  /// Open the push channel, then load notification history. Pushes that
  /// arrive before the history are merged without duplication.
  pub async fn start(&self) {
    info!("session starting");
    self.connection.connect();
    self.notifications.load_history().await;
  }

  /// Tear the session down: the connection is closed and no reconnect will
  /// fire afterwards.
  pub async fn end(self) {
    self.connection.shutdown().await;
    info!("session ended");
  }

  pub fn bus(&self) -> &EventBus { &self.bus }

  pub fn notifications(&self) -> &NotificationCenter<A> { &self.notifications }

  pub fn feed(&self) -> &FeedSynchronizer { &self.feed }

  pub fn connection(&self) -> &ConnectionManager<T> { &self.connection }
}
