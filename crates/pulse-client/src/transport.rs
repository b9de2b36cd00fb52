//! The duplex channel underneath the connection manager.
//!
//! [`Transport`] opens connections and [`Connection`] yields inbound frames.
//! [`WsTransport`] is the production implementation over `tokio-tungstenite`;
//! tests drive the manager through an in-memory transport instead.

use std::future::Future;

use futures_util::StreamExt as _;
use reqwest::Url;
use tokio::net::TcpStream;
use tokio_tungstenite::{
  MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message,
};
use tracing::debug;

use crate::error::Result;

// ─── Frames ──────────────────────────────────────────────────────────────────

/// Close code and reason sent by the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseFrame {
  pub code:   u16,
  pub reason: String,
}

/// What the channel delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
  Text(String),
  Close(Option<CloseFrame>),
}

// ─── Traits ──────────────────────────────────────────────────────────────────

pub trait Transport: Send + Sync + 'static {
  type Connection: Connection;

  /// Open a connection to `url`. Resolves once the channel is open or has
  /// failed; there is no client-side timeout.
  fn connect<'a>(
    &'a self,
    url: &'a Url,
  ) -> impl Future<Output = Result<Self::Connection>> + Send + 'a;
}

pub trait Connection: Send + 'static {
  /// The next inbound frame, or `None` once the stream has ended.
  /// Must be cancel-safe.
  fn next_frame(&mut self) -> impl Future<Output = Option<Result<Frame>>> + Send + '_;

  /// Close the channel from our side.
  fn close(&mut self) -> impl Future<Output = ()> + Send + '_;
}

// ─── WebSocket implementation ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
pub struct WsTransport;

pub struct WsConnection {
  stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl Transport for WsTransport {
  type Connection = WsConnection;

  fn connect<'a>(
    &'a self,
    url: &'a Url,
  ) -> impl Future<Output = Result<WsConnection>> + Send + 'a {
    async move {
      let (stream, response) = connect_async(url.as_str()).await?;
      debug!(status = %response.status(), "websocket handshake complete");
      Ok(WsConnection { stream })
    }
  }
}

impl Connection for WsConnection {
  fn next_frame(&mut self) -> impl Future<Output = Option<Result<Frame>>> + Send + '_ {
    async move {
      loop {
        let message = match self.stream.next().await? {
          Ok(message) => message,
          Err(e) => return Some(Err(e.into())),
        };
        match message {
          Message::Text(text) => return Some(Ok(Frame::Text(text.as_str().to_owned()))),
          Message::Binary(bytes) => match String::from_utf8(bytes.to_vec()) {
            Ok(text) => return Some(Ok(Frame::Text(text))),
            Err(_) => debug!(len = bytes.len(), "dropping non-UTF-8 binary frame"),
          },
          Message::Close(frame) => {
            return Some(Ok(Frame::Close(frame.map(|f| CloseFrame {
              code:   u16::from(f.code),
              reason: f.reason.as_str().to_owned(),
            }))));
          }
          // Control frames are answered by tungstenite itself.
          Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
        }
      }
    }
  }

  fn close(&mut self) -> impl Future<Output = ()> + Send + '_ {
    async move {
      if let Err(e) = self.stream.close(None).await {
        debug!(error = %e, "error while closing websocket");
      }
    }
  }
}
