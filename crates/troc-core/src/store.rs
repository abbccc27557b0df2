//! The `BarterStore` trait and supporting query/result types.
//!
//! The trait is implemented by storage backends (e.g. `troc-store-sqlite`).
//! Higher layers (`troc-engine`, `troc-server`) depend on this abstraction,
//! not on any concrete backend.
//!
//! Every method that performs a multi-step write (attitude closure writes,
//! the match check-then-insert, product insert with self-suppression) must
//! execute inside one atomic transaction; concurrent callers may otherwise
//! race into duplicate matches or lost updates.
//!
//! All methods return `Send` futures so the trait can be used in
//! multi-threaded async runtimes (e.g. tokio with `axum`).

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  attitude::{AttitudeFact, AttitudeKind},
  matching::{Match, MatchView, Message, MessageView},
  product::{NewProduct, Product, ProductUpdate},
  user::{User, UserProfile},
};

// ─── Result types ────────────────────────────────────────────────────────────

/// Outcome of [`BarterStore::record_attitude`].
#[derive(Debug, Clone)]
pub struct AttitudeWrite {
  /// Facts actually written by this call; kinds already on record for the
  /// (user, product) pair are omitted, making re-swipes no-ops downstream.
  pub new_facts:      Vec<AttitudeFact>,
  /// The product as read in the same transaction. `None` when it was
  /// concurrently deleted — the facts are recorded regardless.
  pub product:        Option<Product>,
  /// True when an `Interested` fact for this pair was written for the
  /// first time. Gates the added-product notification on existing matches.
  pub first_interest: bool,
}

/// A matched counterpart that must hear about a product update.
#[derive(Debug, Clone)]
pub struct InterestedPeer {
  pub match_id: Uuid,
  pub user_id:  String,
}

/// A counterpart product that changed inside a match the client already
/// knows about.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatedForeignProduct {
  pub match_id: Uuid,
  pub product:  Product,
}

/// A counterpart's new interest in one of the client's own products.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignInterest {
  pub match_id:   Uuid,
  pub product_id: Uuid,
}

/// Everything a reconnecting client missed since its watermark.
///
/// `as_of` is the new watermark: the snapshot time of the computing
/// transaction, guaranteed ≥ every timestamp embedded in the payload.
/// Clients adopt it as their baseline even when the payload is empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncDelta {
  /// Matches formed in the window, as full views with message history.
  pub new_matches:     Vec<MatchView>,
  /// Updated counterpart products the client is interested in, for
  /// matches it already knows.
  pub product_updates: Vec<UpdatedForeignProduct>,
  /// New counterpart interests in the client's own products.
  pub new_interests:   Vec<ForeignInterest>,
  /// Messages in already-known matches, ascending by timestamp.
  pub messages:        Vec<MessageView>,
  pub as_of:           DateTime<Utc>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a transactional barter record store.
///
/// Methods signal domain absence in-band (`Option`/`bool`); the associated
/// error type is reserved for storage failures.
pub trait BarterStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Users ─────────────────────────────────────────────────────────────

  /// Create the user on first login (with the default wishlist), or return
  /// the stored row. A login carrying a picture when the stored row has
  /// none fills it in. The boolean is true when the user was created.
  fn login_user(
    &self,
    profile: UserProfile,
  ) -> impl Future<Output = Result<(User, bool), Self::Error>> + Send + '_;

  fn get_user<'a>(
    &'a self,
    id: &'a str,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + 'a;

  /// Replace the user's wishlist. `None` when the user does not exist.
  fn set_wishlist<'a>(
    &'a self,
    user_id: &'a str,
    wishlist: Vec<u8>,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + 'a;

  // ── Products ──────────────────────────────────────────────────────────

  /// Persist a new product and, in the same transaction, suppress it for
  /// its owner so it never enters their own candidate batches.
  fn insert_product(
    &self,
    input: NewProduct,
  ) -> impl Future<Output = Result<Product, Self::Error>> + Send + '_;

  fn get_product(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Product>, Self::Error>> + Send + '_;

  fn products_owned_by<'a>(
    &'a self,
    user_id: &'a str,
  ) -> impl Future<Output = Result<Vec<Product>, Self::Error>> + Send + 'a;

  /// Replace the mutable fields and bump `updated_at`. `None` when the
  /// product does not exist.
  fn update_product(
    &self,
    update: ProductUpdate,
  ) -> impl Future<Output = Result<Option<Product>, Self::Error>> + Send + '_;

  /// Returns false when the product was already gone.
  fn delete_product(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Matched counterparts of `owner_id` who recorded interest in the
  /// product — the recipients of a product-updated notification.
  fn interested_match_peers<'a>(
    &'a self,
    product_id: Uuid,
    owner_id: &'a str,
  ) -> impl Future<Output = Result<Vec<InterestedPeer>, Self::Error>> + Send + 'a;

  // ── Attitudes ─────────────────────────────────────────────────────────

  /// Record an attitude fact, expanding the implies-closure of `kind` and
  /// skipping kinds already on record. One transaction; see
  /// [`AttitudeWrite`] for the returned detail.
  fn record_attitude<'a>(
    &'a self,
    user_id: &'a str,
    product_id: Uuid,
    kind: AttitudeKind,
  ) -> impl Future<Output = Result<AttitudeWrite, Self::Error>> + Send + 'a;

  /// True when `owner_id` has recorded `Interested` on any product owned
  /// by `swiper_id` — the mutual-interest half of the reciprocity rule.
  fn mutual_interest_exists<'a>(
    &'a self,
    owner_id: &'a str,
    swiper_id: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  // ── Matches ───────────────────────────────────────────────────────────

  fn get_match(
    &self,
    match_id: Uuid,
  ) -> impl Future<Output = Result<Option<Match>, Self::Error>> + Send + '_;

  fn find_match<'a>(
    &'a self,
    a: &'a str,
    b: &'a str,
  ) -> impl Future<Output = Result<Option<Match>, Self::Error>> + Send + 'a;

  /// Atomically create the match row for the canonicalized pair, or return
  /// the existing one. The loser of a concurrent race reuses the winner's
  /// row; the boolean is true for the creator.
  fn create_or_get_match<'a>(
    &'a self,
    a: &'a str,
    b: &'a str,
  ) -> impl Future<Output = Result<(Match, bool), Self::Error>> + Send + 'a;

  fn matches_for_user<'a>(
    &'a self,
    user_id: &'a str,
  ) -> impl Future<Output = Result<Vec<Match>, Self::Error>> + Send + 'a;

  /// Materialise one participant's view of a match, including message
  /// history. `None` when the match does not exist or does not involve
  /// `user_id`.
  fn match_view<'a>(
    &'a self,
    match_id: Uuid,
    user_id: &'a str,
  ) -> impl Future<Output = Result<Option<MatchView>, Self::Error>> + Send + 'a;

  // ── Candidates ────────────────────────────────────────────────────────

  /// The next batch of swipeable products for `user_id`: category in the
  /// wishlist, not suppressed, not owned by the user, id not in `exclude`.
  /// Ordered by product id so every eligible product eventually surfaces.
  fn candidate_batch<'a>(
    &'a self,
    user_id: &'a str,
    exclude: &'a [Uuid],
    limit: usize,
  ) -> impl Future<Output = Result<Vec<Product>, Self::Error>> + Send + 'a;

  // ── Messages ──────────────────────────────────────────────────────────

  /// Store a message. `None` when the match does not exist.
  fn insert_message<'a>(
    &'a self,
    match_id: Uuid,
    sender_id: &'a str,
    content: &'a str,
  ) -> impl Future<Output = Result<Option<Message>, Self::Error>> + Send + 'a;

  // ── Delta-sync ────────────────────────────────────────────────────────

  /// Compute everything `user_id` missed since `since`, in one
  /// transaction. All queries are bounded to `(since, as_of]` where
  /// `as_of` is snapshotted at entry, so the call is idempotent and the
  /// returned watermark loses nothing written mid-computation.
  fn delta_since<'a>(
    &'a self,
    user_id: &'a str,
    since: DateTime<Utc>,
  ) -> impl Future<Output = Result<SyncDelta, Self::Error>> + Send + 'a;
}
