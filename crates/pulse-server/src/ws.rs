//! `GET /ws?token=<session token>` — the push channel.
//!
//! The token is checked once, at open time. An unknown or missing token is
//! answered by upgrading and immediately closing with code 4003, which the
//! client reads as "do not retry with this token".

use axum::{
  extract::{
    Query, State,
    ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
  },
  response::Response,
};
use futures_util::{SinkExt as _, StreamExt as _};
use pulse_core::event::AUTH_REJECTED;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{AppState, hub::Hub};

#[derive(Debug, Deserialize)]
pub struct WsParams {
  #[serde(default)]
  pub token: Option<String>,
}

pub async fn handler(
  State(state): State<AppState>,
  Query(params): Query<WsParams>,
  ws: WebSocketUpgrade,
) -> Response {
  let user = params.token.as_deref().and_then(|t| state.auth.user_for(t));
  ws.on_upgrade(move |socket| async move {
    match user {
      Some(user_id) => serve(socket, state.hub, user_id).await,
      None => reject(socket).await,
    }
  })
}

async fn reject(mut socket: WebSocket) {
  warn!("push socket rejected: invalid session token");
  let close = CloseFrame {
    code:   AUTH_REJECTED,
    reason: "invalid session token".into(),
  };
  if let Err(e) = socket.send(Message::Close(Some(close))).await {
    debug!(error = %e, "could not send rejection close frame");
  }
}

async fn serve(socket: WebSocket, hub: Hub, user_id: u64) {
  let (connection, mut outbound) = hub.register(user_id);
  let (mut sink, mut stream) = socket.split();

  loop {
    tokio::select! {
      frame = outbound.recv() => {
        let Some(frame) = frame else { break };
        if let Err(e) = sink.send(Message::Text(frame.into())).await {
          debug!(user_id, error = %e, "push socket send failed");
          break;
        }
      }
      inbound = stream.next() => match inbound {
        // Anything the client sends is a keep-alive.
        Some(Ok(Message::Close(_))) | None => break,
        Some(Ok(_)) => {}
        Some(Err(e)) => {
          debug!(user_id, error = %e, "push socket read failed");
          break;
        }
      },
    }
  }

  hub.unregister(user_id, connection);
}
