//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings (UTC offset always
//! `+00:00`), which makes the windowing comparisons in delta-sync plain
//! string comparisons. Wishlists are stored as compact JSON arrays. UUIDs
//! are stored as hyphenated lowercase strings.

use chrono::{DateTime, Utc};
use troc_core::{
  attitude::AttitudeKind,
  matching::{Match, Message},
  product::Product,
  user::User,
};
use uuid::Uuid;

use crate::Result;

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

// ─── AttitudeKind ────────────────────────────────────────────────────────────

pub fn encode_attitude_kind(k: AttitudeKind) -> &'static str {
  match k {
    AttitudeKind::Dismiss => "dismiss",
    AttitudeKind::Interested => "interested",
    AttitudeKind::WillingToPay => "willing_to_pay",
  }
}

// ─── Wishlist ────────────────────────────────────────────────────────────────

pub fn encode_wishlist(wishlist: &[u8]) -> Result<String> {
  Ok(serde_json::to_string(wishlist)?)
}

// ─── In-row decoding ─────────────────────────────────────────────────────────
//
// Row mappers run inside `conn.call` closures, so parse failures are wrapped
// as `rusqlite::Error::FromSqlConversionFailure` to travel out through the
// normal error path.

fn conv_err<E: std::error::Error + Send + Sync + 'static>(
  idx: usize,
  e: E,
) -> rusqlite::Error {
  rusqlite::Error::FromSqlConversionFailure(
    idx,
    rusqlite::types::Type::Text,
    Box::new(e),
  )
}

pub fn decode_uuid_col(idx: usize, s: &str) -> rusqlite::Result<Uuid> {
  Uuid::parse_str(s).map_err(|e| conv_err(idx, e))
}

pub fn decode_dt_col(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| conv_err(idx, e))
}

pub fn decode_wishlist_col(idx: usize, s: &str) -> rusqlite::Result<Vec<u8>> {
  serde_json::from_str(s).map_err(|e| conv_err(idx, e))
}

// ─── Row mappers ─────────────────────────────────────────────────────────────
//
// Column order must match the SELECT lists in `store.rs`.

pub fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
  let wishlist_str: String = row.get(3)?;
  Ok(User {
    id:          row.get(0)?,
    name:        row.get(1)?,
    picture_url: row.get(2)?,
    wishlist:    decode_wishlist_col(3, &wishlist_str)?,
  })
}

pub fn row_to_product(row: &rusqlite::Row<'_>) -> rusqlite::Result<Product> {
  let id_str: String = row.get(0)?;
  let updated_str: String = row.get(6)?;
  Ok(Product {
    id:              decode_uuid_col(0, &id_str)?,
    owner_id:        row.get(1)?,
    category:        row.get(2)?,
    title:           row.get(3)?,
    description:     row.get(4)?,
    requires_return: row.get(5)?,
    updated_at:      decode_dt_col(6, &updated_str)?,
  })
}

pub fn row_to_match(row: &rusqlite::Row<'_>) -> rusqlite::Result<Match> {
  let id_str: String = row.get(0)?;
  let created_str: String = row.get(3)?;
  Ok(Match {
    id:         decode_uuid_col(0, &id_str)?,
    user_lo:    row.get(1)?,
    user_hi:    row.get(2)?,
    created_at: decode_dt_col(3, &created_str)?,
  })
}

pub fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
  let id_str: String = row.get(0)?;
  let match_str: String = row.get(1)?;
  let sent_str: String = row.get(4)?;
  Ok(Message {
    id:        decode_uuid_col(0, &id_str)?,
    match_id:  decode_uuid_col(1, &match_str)?,
    sender_id: row.get(2)?,
    content:   row.get(3)?,
    sent_at:   decode_dt_col(4, &sent_str)?,
  })
}
