//! Matches, messages, and the per-side match view.
//!
//! A match is an unordered pair of users, stored with a canonical ordering
//! so the pair-uniqueness constraint can hold. Matches are terminal: once
//! formed they are never deleted. Messages belong to a match and are
//! immutable once created.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::product::Product;

// ─── Pair ordering ───────────────────────────────────────────────────────────

/// Canonicalize an unordered user pair so {A, B} and {B, A} store
/// identically. Ordering is lexicographic on the id strings.
pub fn canonical_pair<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
  if a <= b { (a, b) } else { (b, a) }
}

// ─── Match ───────────────────────────────────────────────────────────────────

/// A formed match. `user_lo`/`user_hi` are the canonicalized pair; at most
/// one row exists per unordered pair, ever.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
  pub id:         Uuid,
  pub user_lo:    String,
  pub user_hi:    String,
  pub created_at: DateTime<Utc>,
}

impl Match {
  pub fn involves(&self, user_id: &str) -> bool {
    self.user_lo == user_id || self.user_hi == user_id
  }

  /// The other participant, or `None` when `user_id` is not in the pair.
  pub fn counterpart(&self, user_id: &str) -> Option<&str> {
    if self.user_lo == user_id {
      Some(&self.user_hi)
    } else if self.user_hi == user_id {
      Some(&self.user_lo)
    } else {
      None
    }
  }
}

// ─── Messages ────────────────────────────────────────────────────────────────

/// A stored chat message. Must reference an existing match; immutable once
/// created. `sent_at` is server-assigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
  pub id:        Uuid,
  pub match_id:  Uuid,
  pub sender_id: String,
  pub content:   String,
  pub sent_at:   DateTime<Utc>,
}

impl Message {
  /// Project this message for one participant, tagging whether they wrote
  /// it themselves.
  pub fn view_for(&self, user_id: &str) -> MessageView {
    MessageView {
      match_id: self.match_id,
      own:      self.sender_id == user_id,
      content:  self.content.clone(),
      sent_at:  self.sent_at,
    }
  }
}

/// The client-facing projection of a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageView {
  pub match_id: Uuid,
  pub own:      bool,
  pub content:  String,
  pub sent_at:  DateTime<Utc>,
}

// ─── Per-side view ───────────────────────────────────────────────────────────

/// One participant's view of a match — never stored, always derived.
///
/// `own_product_ids` are this side's products the counterpart wants (ids
/// suffice: this side already holds the records). `foreign_products` are
/// the counterpart's products this side wants, as full records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchView {
  pub match_id:                Uuid,
  pub created_at:              DateTime<Utc>,
  pub counterpart_name:        String,
  pub counterpart_picture_url: Option<String>,
  pub own_product_ids:         Vec<Uuid>,
  pub foreign_products:        Vec<Product>,
  pub messages:                Vec<MessageView>,
}
