//! Error types for `troc-core`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("user not found: {0}")]
  UserNotFound(String),

  #[error("product not found: {0}")]
  ProductNotFound(Uuid),

  #[error("match not found: {0}")]
  MatchNotFound(Uuid),

  #[error("validation error: {0}")]
  Validation(String),

  /// The record store failed or timed out. Retryable by the caller; a
  /// redelivered operation is idempotent at the store layer.
  #[error("storage unavailable: {0}")]
  StorageUnavailable(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
