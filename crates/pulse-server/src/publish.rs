//! Internal publish API used by the rest of the backend.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/internal/users/{id}/notify` | Body: [`NotifyBody`]; sends a `notification` frame to that user |
//! | `POST` | `/internal/broadcast` | Body: any JSON object with a string `type`; sent to everyone |
//! | `GET`  | `/internal/online` | Connected users and socket count |
//!
//! All routes require `Authorization: Bearer <publish_key>`.

use axum::{
  Json,
  extract::{Path, State},
};
use pulse_core::event::{InboundEvent, NotificationEvent};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::{AppState, auth::Publisher, error::Error};

/// How many sockets a frame was handed to.
#[derive(Debug, Serialize, Deserialize)]
pub struct Delivery {
  pub delivered: usize,
}

#[derive(Debug, Deserialize)]
pub struct NotifyBody {
  /// Durable id, when the caller stored the notification first.
  #[serde(default)]
  pub id:      Option<u64>,
  pub content: String,
  #[serde(default)]
  pub link:    Option<String>,
}

/// `POST /internal/users/{id}/notify`
pub async fn notify(
  _: Publisher,
  State(state): State<AppState>,
  Path(user_id): Path<u64>,
  Json(body): Json<NotifyBody>,
) -> Json<Delivery> {
  let event = InboundEvent::Notification(NotificationEvent {
    id:      body.id,
    content: body.content,
    link:    body.link,
  });
  let delivered = state.hub.send_personal(user_id, &event.to_frame().to_string());
  info!(user_id, delivered, "notification published");
  Json(Delivery { delivered })
}

/// `POST /internal/broadcast`
pub async fn broadcast(
  _: Publisher,
  State(state): State<AppState>,
  Json(frame): Json<Value>,
) -> Result<Json<Delivery>, Error> {
  let kind = frame
    .as_object()
    .ok_or_else(|| Error::BadRequest("frame must be a JSON object".into()))?
    .get("type")
    .and_then(Value::as_str)
    .ok_or_else(|| Error::BadRequest("frame must carry a string `type`".into()))?
    .to_string();
  let delivered = state.hub.broadcast(&frame.to_string());
  info!(kind, delivered, "frame broadcast");
  Ok(Json(Delivery { delivered }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Online {
  pub users:       Vec<u64>,
  pub connections: usize,
}

/// `GET /internal/online`
pub async fn online(_: Publisher, State(state): State<AppState>) -> Json<Online> {
  Json(Online {
    users:       state.hub.online_users(),
    connections: state.hub.connection_count(),
  })
}
