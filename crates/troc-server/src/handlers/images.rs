//! Serving product pictures.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET` | `/images/{product_id}.jpg` | Raw JPEG bytes |

use axum::{
  extract::{Path, State},
  http::header,
  response::IntoResponse,
};
use troc_core::store::BarterStore;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

/// `GET /images/{product_id}.jpg`.
pub async fn serve<S>(
  State(state): State<AppState<S>>,
  Path(file): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
  S: BarterStore + 'static,
{
  let id_part = file.strip_suffix(".jpg").unwrap_or(&file);
  let product_id = Uuid::parse_str(id_part)
    .map_err(|_| ApiError::BadRequest(format!("not an image path: {file}")))?;

  let Some(bytes) = state.images.get(product_id).await? else {
    return Err(ApiError::NotFound(format!("no picture for {product_id}")));
  };
  Ok(([(header::CONTENT_TYPE, "image/jpeg")], bytes))
}
