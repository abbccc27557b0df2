//! Handler for the reconnection delta-sync.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/api/reconnect` | Body: [`ReconnectBody`]; returns the missed-event delta |
//!
//! A reconnecting client first reopens its event stream (which re-registers
//! the push connection), then calls this with the last watermark it
//! processed. The response stamp equals the delta's `as_of` so the two
//! watermarks cannot disagree.

use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use troc_core::{event::Stamped, store::{BarterStore, SyncDelta}};

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct ReconnectBody {
  pub user_id: String,
  /// The most recent event timestamp the client has already processed.
  pub since:   DateTime<Utc>,
}

/// `POST /api/reconnect`.
pub async fn reconnect<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<ReconnectBody>,
) -> Result<Json<Stamped<SyncDelta>>, ApiError>
where
  S: BarterStore + 'static,
{
  let delta = state.engine.reconnect(&body.user_id, body.since).await?;
  Ok(Json(Stamped { at: delta.as_of, data: delta }))
}
