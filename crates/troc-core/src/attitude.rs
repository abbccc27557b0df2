//! Attitude facts — a user's recorded reaction to a product — and the
//! eligibility rule that decides whether a swipe may form a match.
//!
//! Facts are immutable and additive. A product with any fact recorded
//! against it is suppressed: it never reappears in that user's candidate
//! batches. Stronger kinds imply weaker ones, expressed as an explicit
//! closure rather than subtyping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Kind ────────────────────────────────────────────────────────────────────

/// How a user reacted to a product.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum AttitudeKind {
  /// "Don't show again". Suppresses the product, nothing more.
  Dismiss,
  /// Willing to trade.
  Interested,
  /// Willing to pay money outright.
  WillingToPay,
}

impl AttitudeKind {
  /// The closure of kinds a single swipe of this kind stands for.
  /// `WillingToPay` ⊃ `Interested` ⊃ `Dismiss`: recording a stronger kind
  /// also records every weaker one.
  pub fn implies(self) -> &'static [AttitudeKind] {
    match self {
      Self::Dismiss => &[Self::Dismiss],
      Self::Interested => &[Self::Dismiss, Self::Interested],
      Self::WillingToPay => {
        &[Self::Dismiss, Self::Interested, Self::WillingToPay]
      }
    }
  }
}

// ─── Fact ────────────────────────────────────────────────────────────────────

/// An immutable reaction record. The store deduplicates facts per
/// (user, product, kind), so re-recording is a no-op downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttitudeFact {
  pub user_id:     String,
  pub product_id:  Uuid,
  pub kind:        AttitudeKind,
  pub recorded_at: DateTime<Utc>,
}

// ─── Eligibility ─────────────────────────────────────────────────────────────

/// Whether a swipe of `kind` on a product may trigger match formation.
///
/// `WillingToPay` always qualifies: a payment offer bypasses the
/// reciprocity requirement entirely. `Interested` qualifies when the owner
/// has already shown interest back, or when the product does not ask for
/// something in return. `Dismiss` never forms a match.
pub fn eligible(
  kind: AttitudeKind,
  requires_return: bool,
  mutual_interest: bool,
) -> bool {
  match kind {
    AttitudeKind::Dismiss => false,
    AttitudeKind::Interested => mutual_interest || !requires_return,
    AttitudeKind::WillingToPay => true,
  }
}
