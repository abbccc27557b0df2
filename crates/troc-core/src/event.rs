//! Push events and response stamping.
//!
//! Every push delivery is wrapped in an [`Envelope`] carrying the server
//! send time, and every state-mutating operation response is wrapped in
//! [`Stamped`] — both timestamps are usable directly as a reconnection
//! watermark, so a client can advance its baseline from live traffic as
//! well as from delta-sync.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  matching::{MatchView, MessageView},
  product::Product,
};

// ─── Events ──────────────────────────────────────────────────────────────────

/// Payload of [`Event::ProductAddedToMatch`].
///
/// `product` is filled for the interested side; the owner receives only the
/// id, since they already hold the record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductAddition {
  pub match_id:   Uuid,
  pub product_id: Uuid,
  pub product:    Option<Product>,
}

/// A named event delivered over a user's push channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum Event {
  /// A match was just formed; the payload is the recipient's side of it,
  /// with an empty message history.
  NewMatch(MatchView),
  /// A product joined an existing match through a new interest.
  ProductAddedToMatch(ProductAddition),
  /// A product already shared in a match was edited by its owner.
  ProductUpdatedInMatch { match_id: Uuid, product: Product },
  /// The counterpart sent a message (`own` is always false here).
  MessageReceived(MessageView),
}

impl Event {
  /// The wire name of this event. Must match the serde tags above.
  pub fn name(&self) -> &'static str {
    match self {
      Self::NewMatch(_) => "new-match",
      Self::ProductAddedToMatch(_) => "product-added-to-match",
      Self::ProductUpdatedInMatch { .. } => "product-updated-in-match",
      Self::MessageReceived(_) => "message-received",
    }
  }
}

// ─── Envelope ────────────────────────────────────────────────────────────────

/// An event stamped with the server's send time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
  pub sent_at: DateTime<Utc>,
  #[serde(flatten)]
  pub event:   Event,
}

impl Envelope {
  pub fn now(event: Event) -> Self {
    Self { sent_at: Utc::now(), event }
  }
}

// ─── Stamped responses ───────────────────────────────────────────────────────

/// A state-mutating operation response wrapped with the server timestamp.
/// Clients treat `at` as their new watermark.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stamped<T> {
  pub at:   DateTime<Utc>,
  pub data: T,
}

impl<T> Stamped<T> {
  pub fn now(data: T) -> Self {
    Self { at: Utc::now(), data }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn event_names_match_serde_tags() {
    let msg = MessageView {
      match_id: Uuid::new_v4(),
      own:      false,
      content:  "hi".into(),
      sent_at:  Utc::now(),
    };
    let event = Event::MessageReceived(msg);
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["event"], event.name());
  }

  #[test]
  fn envelope_flattens_event_fields() {
    let addition = ProductAddition {
      match_id:   Uuid::new_v4(),
      product_id: Uuid::new_v4(),
      product:    None,
    };
    let envelope = Envelope::now(Event::ProductAddedToMatch(addition));
    let json = serde_json::to_value(&envelope).unwrap();
    assert_eq!(json["event"], "product-added-to-match");
    assert!(json["sent_at"].is_string());
    assert!(json["data"]["product_id"].is_string());
  }
}
