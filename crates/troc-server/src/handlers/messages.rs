//! Handler for sending a message inside a match.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/api/matches/{id}/messages` | Body: [`SendMessageBody`]; 404 for a nonexistent match |

use axum::{
  Json,
  extract::{Path, State},
};
use serde::Deserialize;
use troc_core::{event::Stamped, matching::MessageView, store::BarterStore};
use uuid::Uuid;

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct SendMessageBody {
  pub sender_id: String,
  pub content:   String,
}

/// `POST /api/matches/{id}/messages` — stores the message, pushes it to the
/// counterpart, and returns the sender's own-tagged view.
pub async fn send<S>(
  State(state): State<AppState<S>>,
  Path(match_id): Path<Uuid>,
  Json(body): Json<SendMessageBody>,
) -> Result<Json<Stamped<MessageView>>, ApiError>
where
  S: BarterStore + 'static,
{
  let view = state
    .engine
    .send_message(match_id, &body.sender_id, &body.content)
    .await?;
  Ok(Json(Stamped::now(view)))
}
