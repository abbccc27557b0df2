//! User records and the fixed category table.
//!
//! User identity is minted by the external user directory; this core never
//! creates or validates credentials. A user row is created on first login
//! with a wishlist covering every category.

use serde::{Deserialize, Serialize};

/// The fixed set of product categories, indexed by category code.
pub const CATEGORIES: &[&str] = &[
  "Women's clothing, size S",
  "Women's clothing, size M",
  "Women's clothing, size L",
  "Men's clothing, size S",
  "Men's clothing, size M",
  "Men's clothing, size L",
  "Books",
  "Electronics",
  "Tools",
  "Sports equipment",
];

/// True when `code` indexes into [`CATEGORIES`].
pub fn category_exists(code: u8) -> bool { (code as usize) < CATEGORIES.len() }

/// Every category code — the wishlist assigned on first login.
pub fn default_wishlist() -> Vec<u8> { (0..CATEGORIES.len() as u8).collect() }

/// The identity a client presents at login, as handed out by the external
/// user directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
  pub id:          String,
  pub name:        String,
  pub picture_url: Option<String>,
}

/// A stored user. `wishlist` holds category codes; profile fields follow
/// last-writer-wins (a login carrying a picture fills in a missing one).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
  pub id:          String,
  pub name:        String,
  pub picture_url: Option<String>,
  pub wishlist:    Vec<u8>,
}
