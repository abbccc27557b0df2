//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error(transparent)]
  Core(#[from] troc_core::Error),

  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("image store error: {0}")]
  Image(#[from] std::io::Error),
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    use troc_core::Error as Core;

    let status = match &self {
      ApiError::Core(Core::Validation(_)) => StatusCode::BAD_REQUEST,
      ApiError::Core(
        Core::UserNotFound(_) | Core::ProductNotFound(_) | Core::MatchNotFound(_),
      ) => StatusCode::NOT_FOUND,
      ApiError::Core(Core::StorageUnavailable(_)) => {
        StatusCode::SERVICE_UNAVAILABLE
      }
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Image(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": self.to_string() }))).into_response()
  }
}
