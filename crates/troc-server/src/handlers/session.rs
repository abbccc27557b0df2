//! Handlers for login and wishlist maintenance.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/api/login` | Body: [`UserProfile`]; returns the bootstrap state |
//! | `PUT`  | `/api/wishlist` | Body: [`WishlistBody`]; returns a fresh candidate batch |

use axum::{Json, extract::State};
use serde::Deserialize;
use troc_core::{
  event::Stamped, product::Product, store::BarterStore, user::UserProfile,
};
use troc_engine::Bootstrap;

use crate::{AppState, error::ApiError};

/// `POST /api/login` — create-or-fetch the user and return everything the
/// client needs to render: profile, own products, candidates, categories,
/// matches with history. The stamp is the client's initial watermark.
pub async fn login<S>(
  State(state): State<AppState<S>>,
  Json(profile): Json<UserProfile>,
) -> Result<Json<Stamped<Bootstrap>>, ApiError>
where
  S: BarterStore + 'static,
{
  let bootstrap = state.engine.login(profile).await?;
  Ok(Json(Stamped::now(bootstrap)))
}

#[derive(Debug, Deserialize)]
pub struct WishlistBody {
  pub user_id:  String,
  pub wishlist: Vec<u8>,
}

/// `PUT /api/wishlist` — replace the wishlist and return a recomputed full
/// candidate batch under the new categories.
pub async fn update_wishlist<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<WishlistBody>,
) -> Result<Json<Stamped<Vec<Product>>>, ApiError>
where
  S: BarterStore + 'static,
{
  let batch = state
    .engine
    .update_wishlist(&body.user_id, body.wishlist)
    .await?;
  Ok(Json(Stamped::now(batch)))
}
