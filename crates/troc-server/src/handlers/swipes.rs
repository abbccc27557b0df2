//! Handlers for swipes and candidate refills.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/api/swipes` | Body: [`SwipeBody`]; records the attitude, may form a match |
//! | `POST` | `/api/candidates` | Body: [`RefreshBody`]; recomputes the batch only |
//!
//! `remaining` is the list of candidate ids the client still holds unshown.
//! Leaving it out means "no refill wanted" and skips the batch computation
//! — the response then carries `null` instead of a batch.

use axum::{Json, extract::State};
use serde::Deserialize;
use troc_core::{
  attitude::AttitudeKind, event::Stamped, product::Product, store::BarterStore,
};
use uuid::Uuid;

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct SwipeBody {
  pub user_id:    String,
  pub product_id: Uuid,
  pub kind:       AttitudeKind,
  #[serde(default)]
  pub remaining:  Option<Vec<Uuid>>,
}

/// `POST /api/swipes`.
pub async fn swipe<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<SwipeBody>,
) -> Result<Json<Stamped<Option<Vec<Product>>>>, ApiError>
where
  S: BarterStore + 'static,
{
  let refill = state
    .engine
    .swipe(&body.user_id, body.product_id, body.kind, body.remaining)
    .await?;
  Ok(Json(Stamped::now(refill)))
}

#[derive(Debug, Deserialize)]
pub struct RefreshBody {
  pub user_id:   String,
  #[serde(default)]
  pub remaining: Option<Vec<Uuid>>,
}

/// `POST /api/candidates`.
pub async fn refresh<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<RefreshBody>,
) -> Result<Json<Stamped<Option<Vec<Product>>>>, ApiError>
where
  S: BarterStore + 'static,
{
  let batch = state
    .engine
    .refresh_candidates(&body.user_id, body.remaining)
    .await?;
  Ok(Json(Stamped::now(batch)))
}
