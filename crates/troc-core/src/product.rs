//! Product records.
//!
//! A product is owned exclusively by one user. `updated_at` is assigned by
//! the store on insert and bumped on every update; the reconnection
//! delta-sync relies on it, so it is never accepted from callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A listed product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
  pub id:              Uuid,
  pub owner_id:        String,
  pub category:        u8,
  pub title:           String,
  pub description:     String,
  /// Reciprocity flag: a match on this product normally requires the owner
  /// to have shown interest in one of the swiper's products first.
  pub requires_return: bool,
  pub updated_at:      DateTime<Utc>,
}

/// Input to [`crate::store::BarterStore::insert_product`].
/// `id` and `updated_at` are set by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
  pub owner_id:        String,
  pub category:        u8,
  pub title:           String,
  pub description:     String,
  pub requires_return: bool,
}

/// Owner-supplied replacement fields for an existing product.
/// `updated_at` is bumped by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductUpdate {
  pub id:              Uuid,
  pub category:        u8,
  pub title:           String,
  pub description:     String,
  pub requires_return: bool,
}
