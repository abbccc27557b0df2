//! Handlers for `/api/products` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST`   | `/api/products` | Body: [`CreateProductBody`]; 201 + stored product |
//! | `PUT`    | `/api/products/{id}` | Body: [`UpdateProductBody`]; 404 when missing |
//! | `DELETE` | `/api/products/{id}` | 404 when missing; removes the picture too |
//!
//! Pictures travel as base64 JPEG bytes inside the JSON body and land in
//! the filesystem image store; they are decoded and size-checked before any
//! store write happens.

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use serde::Deserialize;
use troc_core::{
  event::Stamped,
  product::{NewProduct, Product, ProductUpdate},
  store::BarterStore,
};
use uuid::Uuid;

use crate::{AppState, blob::MAX_PICTURE_BYTES, error::ApiError};

fn decode_picture(picture: Option<&str>) -> Result<Option<Vec<u8>>, ApiError> {
  let Some(encoded) = picture else {
    return Ok(None);
  };
  let bytes = B64
    .decode(encoded)
    .map_err(|_| ApiError::BadRequest("picture is not valid base64".into()))?;
  if bytes.is_empty() {
    return Err(ApiError::BadRequest("picture must not be empty".into()));
  }
  if bytes.len() > MAX_PICTURE_BYTES {
    return Err(ApiError::BadRequest(format!(
      "picture exceeds {MAX_PICTURE_BYTES} bytes"
    )));
  }
  Ok(Some(bytes))
}

// ─── Create ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateProductBody {
  pub owner_id:        String,
  pub category:        u8,
  pub title:           String,
  pub description:     String,
  pub requires_return: bool,
  /// Primary picture as base64 JPEG bytes.
  #[serde(default)]
  pub picture:         Option<String>,
}

/// `POST /api/products` — returns 201 + the stored product.
pub async fn create<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<CreateProductBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: BarterStore + 'static,
{
  let picture = decode_picture(body.picture.as_deref())?;

  let product = state
    .engine
    .create_product(NewProduct {
      owner_id:        body.owner_id,
      category:        body.category,
      title:           body.title,
      description:     body.description,
      requires_return: body.requires_return,
    })
    .await?;

  if let Some(bytes) = picture {
    state.images.put(product.id, &bytes).await?;
  }

  Ok((StatusCode::CREATED, Json(Stamped::now(product))))
}

// ─── Update ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct UpdateProductBody {
  pub category:        u8,
  pub title:           String,
  pub description:     String,
  pub requires_return: bool,
  /// Replacement picture; absent leaves the stored one untouched.
  #[serde(default)]
  pub picture:         Option<String>,
}

/// `PUT /api/products/{id}` — updates the record, replaces the picture when
/// one is supplied, and fans out to matched interested users.
pub async fn update<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<UpdateProductBody>,
) -> Result<Json<Stamped<Product>>, ApiError>
where
  S: BarterStore + 'static,
{
  let picture = decode_picture(body.picture.as_deref())?;

  let product = state
    .engine
    .update_product(ProductUpdate {
      id,
      category:        body.category,
      title:           body.title,
      description:     body.description,
      requires_return: body.requires_return,
    })
    .await?;

  if let Some(bytes) = picture {
    state.images.put(product.id, &bytes).await?;
  }

  Ok(Json(Stamped::now(product)))
}

// ─── Delete ──────────────────────────────────────────────────────────────────

/// `DELETE /api/products/{id}`.
pub async fn delete<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Stamped<bool>>, ApiError>
where
  S: BarterStore + 'static,
{
  if !state.engine.delete_product(id).await? {
    return Err(ApiError::NotFound(format!("product {id} not found")));
  }
  state.images.delete(id).await?;
  Ok(Json(Stamped::now(true)))
}
