//! [`Engine`] — the swipe-to-match state machine and operation layer.
//!
//! Handlers call into the engine; the engine calls into the store and the
//! push channel. Every store call carries a bounded timeout: on elapse the
//! operation fails with `StorageUnavailable` instead of retrying silently
//! (a redelivered swipe is idempotent at the store layer, so retrying is
//! the caller's choice). Push delivery is best-effort and never fails the
//! mutating operation that triggered it.

use std::{future::Future, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use troc_core::{
  Error, Result,
  attitude::{AttitudeKind, eligible},
  event::{Envelope, Event, ProductAddition},
  matching::{MatchView, MessageView},
  product::{NewProduct, Product, ProductUpdate},
  push::PushChannel,
  store::{BarterStore, SyncDelta},
  user::{CATEGORIES, User, UserProfile, category_exists},
};
use uuid::Uuid;

/// Size of a full candidate page. Refills top a client back up to this.
pub const SWIPE_PAGE_SIZE: usize = 10;

const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

// ─── Bootstrap ───────────────────────────────────────────────────────────────

/// Everything a client needs after login: its own profile and products, a
/// first candidate batch, the category table, and all current matches with
/// message history. The response timestamp doubles as the client's initial
/// watermark.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bootstrap {
  pub user:         User,
  pub own_products: Vec<Product>,
  pub candidates:   Vec<Product>,
  pub categories:   Vec<String>,
  pub matches:      Vec<MatchView>,
}

// ─── Engine ──────────────────────────────────────────────────────────────────

/// The operation layer over a [`BarterStore`] and a [`PushChannel`].
pub struct Engine<S> {
  store:         Arc<S>,
  push:          Arc<dyn PushChannel>,
  store_timeout: Duration,
}

impl<S> Clone for Engine<S> {
  fn clone(&self) -> Self {
    Self {
      store:         Arc::clone(&self.store),
      push:          Arc::clone(&self.push),
      store_timeout: self.store_timeout,
    }
  }
}

impl<S: BarterStore> Engine<S> {
  pub fn new(store: Arc<S>, push: Arc<dyn PushChannel>) -> Self {
    Self { store, push, store_timeout: DEFAULT_STORE_TIMEOUT }
  }

  pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
    self.store_timeout = timeout;
    self
  }

  /// Run a store future under the configured timeout, folding both store
  /// failures and elapse into the retryable `StorageUnavailable`.
  async fn store_call<T>(
    &self,
    fut: impl Future<Output = Result<T, S::Error>>,
  ) -> Result<T> {
    match tokio::time::timeout(self.store_timeout, fut).await {
      Ok(Ok(value)) => Ok(value),
      Ok(Err(e)) => Err(Error::StorageUnavailable(e.to_string())),
      Err(_) => {
        Err(Error::StorageUnavailable("store operation timed out".into()))
      }
    }
  }

  fn emit(&self, user_id: &str, event: Event) {
    self.push.push(user_id, Envelope::now(event));
  }

  // ── Login & wishlist ──────────────────────────────────────────────────────

  /// Bootstrap a (possibly first-time) login.
  pub async fn login(&self, profile: UserProfile) -> Result<Bootstrap> {
    if profile.id.trim().is_empty() || profile.name.trim().is_empty() {
      return Err(Error::Validation("login requires a user id and name".into()));
    }

    let (user, created) = self.store_call(self.store.login_user(profile)).await?;
    if created {
      tracing::info!(user = %user.id, "first login, user created");
    }

    let own_products =
      self.store_call(self.store.products_owned_by(&user.id)).await?;
    let candidates = self
      .store_call(self.store.candidate_batch(&user.id, &[], SWIPE_PAGE_SIZE))
      .await?;

    let mut matches = Vec::new();
    for m in self.store_call(self.store.matches_for_user(&user.id)).await? {
      if let Some(view) =
        self.store_call(self.store.match_view(m.id, &user.id)).await?
      {
        matches.push(view);
      }
    }

    Ok(Bootstrap {
      user,
      own_products,
      candidates,
      categories: CATEGORIES.iter().map(|c| (*c).to_owned()).collect(),
      matches,
    })
  }

  /// Replace the wishlist and return a fresh full candidate batch.
  pub async fn update_wishlist(
    &self,
    user_id: &str,
    wishlist: Vec<u8>,
  ) -> Result<Vec<Product>> {
    if let Some(&bad) = wishlist.iter().find(|&&code| !category_exists(code)) {
      return Err(Error::Validation(format!("unknown category code: {bad}")));
    }
    if self
      .store_call(self.store.set_wishlist(user_id, wishlist))
      .await?
      .is_none()
    {
      return Err(Error::UserNotFound(user_id.to_owned()));
    }
    self
      .store_call(self.store.candidate_batch(user_id, &[], SWIPE_PAGE_SIZE))
      .await
  }

  // ── Products ──────────────────────────────────────────────────────────────

  pub async fn create_product(&self, input: NewProduct) -> Result<Product> {
    if !category_exists(input.category) {
      return Err(Error::Validation(format!(
        "unknown category code: {}",
        input.category
      )));
    }
    if input.title.trim().is_empty() {
      return Err(Error::Validation("product title must not be empty".into()));
    }
    if self
      .store_call(self.store.get_user(&input.owner_id))
      .await?
      .is_none()
    {
      return Err(Error::UserNotFound(input.owner_id));
    }
    self.store_call(self.store.insert_product(input)).await
  }

  /// Update a product and notify matched counterparts who want it.
  pub async fn update_product(&self, update: ProductUpdate) -> Result<Product> {
    if !category_exists(update.category) {
      return Err(Error::Validation(format!(
        "unknown category code: {}",
        update.category
      )));
    }
    let id = update.id;
    let Some(product) =
      self.store_call(self.store.update_product(update)).await?
    else {
      return Err(Error::ProductNotFound(id));
    };

    let peers = self
      .store_call(
        self.store.interested_match_peers(product.id, &product.owner_id),
      )
      .await?;
    for peer in peers {
      self.emit(&peer.user_id, Event::ProductUpdatedInMatch {
        match_id: peer.match_id,
        product:  product.clone(),
      });
    }
    Ok(product)
  }

  /// Returns false when the product was already gone.
  pub async fn delete_product(&self, id: Uuid) -> Result<bool> {
    self.store_call(self.store.delete_product(id)).await
  }

  // ── Messages ──────────────────────────────────────────────────────────────

  /// Store a message, push it to the counterpart, return the sender's view.
  pub async fn send_message(
    &self,
    match_id: Uuid,
    sender_id: &str,
    content: &str,
  ) -> Result<MessageView> {
    if content.trim().is_empty() {
      return Err(Error::Validation("message content must not be empty".into()));
    }

    let Some(m) = self.store_call(self.store.get_match(match_id)).await? else {
      return Err(Error::MatchNotFound(match_id));
    };
    let Some(counterpart) = m.counterpart(sender_id) else {
      return Err(Error::Validation(
        "sender is not a participant of the match".into(),
      ));
    };
    let counterpart = counterpart.to_owned();

    let Some(message) = self
      .store_call(self.store.insert_message(match_id, sender_id, content))
      .await?
    else {
      return Err(Error::MatchNotFound(match_id));
    };

    self.emit(
      &counterpart,
      Event::MessageReceived(message.view_for(&counterpart)),
    );
    Ok(message.view_for(sender_id))
  }

  // ── Swipes ────────────────────────────────────────────────────────────────

  /// Record a swipe, run match formation, and compute the refill batch.
  ///
  /// A swipe that outlived its product is accepted and recorded; only the
  /// match step is skipped. `remaining` is the set of candidate ids the
  /// client still holds unshown: `None` means "no refill requested" and
  /// short-circuits the batch computation entirely.
  pub async fn swipe(
    &self,
    user_id: &str,
    product_id: Uuid,
    kind: AttitudeKind,
    remaining: Option<Vec<Uuid>>,
  ) -> Result<Option<Vec<Product>>> {
    if self.store_call(self.store.get_user(user_id)).await?.is_none() {
      return Err(Error::UserNotFound(user_id.to_owned()));
    }

    let write = self
      .store_call(self.store.record_attitude(user_id, product_id, kind))
      .await?;

    if let Some(product) = &write.product
      && kind != AttitudeKind::Dismiss
    {
      self
        .form_match(user_id, product, kind, write.first_interest)
        .await?;
    }

    self.refill(user_id, remaining).await
  }

  /// Recompute the candidate batch without recording anything.
  pub async fn refresh_candidates(
    &self,
    user_id: &str,
    remaining: Option<Vec<Uuid>>,
  ) -> Result<Option<Vec<Product>>> {
    self.refill(user_id, remaining).await
  }

  async fn refill(
    &self,
    user_id: &str,
    remaining: Option<Vec<Uuid>>,
  ) -> Result<Option<Vec<Product>>> {
    let Some(held) = remaining else {
      return Ok(None);
    };
    let limit = SWIPE_PAGE_SIZE.saturating_sub(held.len());
    let batch = self
      .store_call(self.store.candidate_batch(user_id, &held, limit))
      .await?;
    Ok(Some(batch))
  }

  /// The match-formation state machine, evaluated after every non-dismiss
  /// fact on a live product.
  async fn form_match(
    &self,
    swiper: &str,
    product: &Product,
    kind: AttitudeKind,
    first_interest: bool,
  ) -> Result<()> {
    let owner = product.owner_id.as_str();
    // Swiping one's own product records a fact but can never match.
    if owner == swiper {
      return Ok(());
    }

    if let Some(existing) =
      self.store_call(self.store.find_match(swiper, owner)).await?
    {
      // Already matched: a new product-level interest extends the match
      // instead of announcing a second one. Re-swipes change nothing.
      if first_interest {
        self.announce_addition(existing.id, swiper, owner, product);
      }
      return Ok(());
    }

    // WillingToPay skips the mutual-interest lookup entirely: a payment
    // offer always qualifies, reciprocity flag or not.
    let mutual = match kind {
      AttitudeKind::WillingToPay => false,
      _ => {
        self
          .store_call(self.store.mutual_interest_exists(owner, swiper))
          .await?
      }
    };
    if !eligible(kind, product.requires_return, mutual) {
      return Ok(());
    }

    let (formed, created) = self
      .store_call(self.store.create_or_get_match(swiper, owner))
      .await?;
    if created {
      tracing::debug!(matched = %formed.id, a = swiper, b = owner, "match formed");
      for side in [swiper, owner] {
        if let Some(view) =
          self.store_call(self.store.match_view(formed.id, side)).await?
        {
          self.emit(side, Event::NewMatch(view));
        }
      }
    } else if first_interest {
      // Lost a concurrent race: the pair is matched now, so the product
      // joins the winner's match like any other addition.
      self.announce_addition(formed.id, swiper, owner, product);
    }
    Ok(())
  }

  fn announce_addition(
    &self,
    match_id: Uuid,
    swiper: &str,
    owner: &str,
    product: &Product,
  ) {
    self.emit(
      swiper,
      Event::ProductAddedToMatch(ProductAddition {
        match_id,
        product_id: product.id,
        product: Some(product.clone()),
      }),
    );
    self.emit(
      owner,
      Event::ProductAddedToMatch(ProductAddition {
        match_id,
        product_id: product.id,
        product: None,
      }),
    );
  }

  // ── Reconnection ──────────────────────────────────────────────────────────

  /// Compute everything the client missed since `since`. Re-registering
  /// the push connection is the transport's job, done when the client
  /// reopens its event stream.
  pub async fn reconnect(
    &self,
    user_id: &str,
    since: DateTime<Utc>,
  ) -> Result<SyncDelta> {
    self.store_call(self.store.delta_since(user_id, since)).await
  }
}
