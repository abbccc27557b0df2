//! Engine integration tests against the in-memory SQLite store.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use troc_core::{
  Error,
  attitude::AttitudeKind,
  event::{Envelope, Event},
  product::{NewProduct, Product, ProductUpdate},
  push::PushChannel,
  store::BarterStore as _,
  user::UserProfile,
};
use troc_store_sqlite::SqliteStore;
use uuid::Uuid;

use crate::{ConnectionHub, Engine, SWIPE_PAGE_SIZE};

// ─── Harness ─────────────────────────────────────────────────────────────────

/// A push channel that remembers every delivery, for asserting on fan-out.
#[derive(Default)]
struct RecordingPush {
  deliveries: Mutex<Vec<(String, Envelope)>>,
}

impl PushChannel for RecordingPush {
  fn push(&self, user_id: &str, envelope: Envelope) {
    self
      .deliveries
      .lock()
      .unwrap()
      .push((user_id.to_owned(), envelope));
  }
}

impl RecordingPush {
  fn events_for(&self, user_id: &str) -> Vec<Event> {
    self
      .deliveries
      .lock()
      .unwrap()
      .iter()
      .filter(|(user, _)| user == user_id)
      .map(|(_, env)| env.event.clone())
      .collect()
  }

  fn names_for(&self, user_id: &str) -> Vec<&'static str> {
    self
      .events_for(user_id)
      .iter()
      .map(Event::name)
      .collect()
  }

  fn clear(&self) { self.deliveries.lock().unwrap().clear(); }
}

async fn setup() -> (Engine<SqliteStore>, Arc<SqliteStore>, Arc<RecordingPush>)
{
  let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
  let push = Arc::new(RecordingPush::default());
  let engine = Engine::new(Arc::clone(&store), push.clone());
  (engine, store, push)
}

fn profile(id: &str) -> UserProfile {
  UserProfile {
    id:          id.into(),
    name:        id.to_uppercase(),
    picture_url: None,
  }
}

async fn login(engine: &Engine<SqliteStore>, id: &str) {
  engine.login(profile(id)).await.unwrap();
}

async fn list(
  engine: &Engine<SqliteStore>,
  owner: &str,
  category: u8,
  requires_return: bool,
) -> Product {
  engine
    .create_product(NewProduct {
      owner_id: owner.into(),
      category,
      title: format!("{owner}'s item"),
      description: "as seen".into(),
      requires_return,
    })
    .await
    .unwrap()
}

// ─── Login ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn login_bootstrap_carries_catalog_candidates_and_matches() {
  let (engine, _store, _push) = setup().await;
  login(&engine, "bob").await;
  let bobs = list(&engine, "bob", 0, false).await;

  let bootstrap = engine.login(profile("alice")).await.unwrap();
  assert_eq!(bootstrap.user.id, "alice");
  assert_eq!(
    bootstrap.categories.len(),
    troc_core::user::CATEGORIES.len()
  );
  assert!(bootstrap.own_products.is_empty());
  assert_eq!(bootstrap.candidates.len(), 1);
  assert_eq!(bootstrap.candidates[0].id, bobs.id);
  assert!(bootstrap.matches.is_empty());
}

#[tokio::test]
async fn login_rejects_blank_identity() {
  let (engine, _store, _push) = setup().await;
  let err = engine
    .login(UserProfile {
      id:          "  ".into(),
      name:        "Ghost".into(),
      picture_url: None,
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Validation(_)));
}

// ─── Match formation ─────────────────────────────────────────────────────────

#[tokio::test]
async fn interest_without_reciprocity_requirement_always_matches() {
  let (engine, store, push) = setup().await;
  login(&engine, "alice").await;
  login(&engine, "bob").await;
  let bobs = list(&engine, "bob", 0, false).await;

  engine
    .swipe("alice", bobs.id, AttitudeKind::Interested, None)
    .await
    .unwrap();

  // Bob never reacted to anything of Alice's, yet the match stands.
  let m = store.find_match("alice", "bob").await.unwrap();
  assert!(m.is_some());
  assert_eq!(push.names_for("alice"), vec!["new-match"]);
  assert_eq!(push.names_for("bob"), vec!["new-match"]);
}

#[tokio::test]
async fn reciprocity_blocks_until_interest_is_mutual() {
  let (engine, store, push) = setup().await;
  login(&engine, "alice").await;
  login(&engine, "bob").await;
  let alices = list(&engine, "alice", 0, true).await;
  let bobs = list(&engine, "bob", 0, true).await;

  engine
    .swipe("alice", bobs.id, AttitudeKind::Interested, None)
    .await
    .unwrap();
  assert!(store.find_match("alice", "bob").await.unwrap().is_none());
  assert!(push.events_for("alice").is_empty());
  assert!(push.events_for("bob").is_empty());

  // The counter-swipe completes the pair.
  engine
    .swipe("bob", alices.id, AttitudeKind::Interested, None)
    .await
    .unwrap();
  assert!(store.find_match("alice", "bob").await.unwrap().is_some());
  assert_eq!(push.names_for("alice"), vec!["new-match"]);
  assert_eq!(push.names_for("bob"), vec!["new-match"]);
}

#[tokio::test]
async fn willing_to_pay_matches_despite_reciprocity_requirement() {
  let (engine, store, _push) = setup().await;
  login(&engine, "alice").await;
  login(&engine, "bob").await;
  let bobs = list(&engine, "bob", 0, true).await;

  engine
    .swipe("alice", bobs.id, AttitudeKind::WillingToPay, None)
    .await
    .unwrap();
  assert!(store.find_match("alice", "bob").await.unwrap().is_some());
}

#[tokio::test]
async fn dismiss_only_suppresses() {
  let (engine, store, push) = setup().await;
  login(&engine, "alice").await;
  login(&engine, "bob").await;
  let bobs = list(&engine, "bob", 0, false).await;

  let batch = engine
    .swipe("alice", bobs.id, AttitudeKind::Dismiss, Some(vec![]))
    .await
    .unwrap()
    .unwrap();

  assert!(store.find_match("alice", "bob").await.unwrap().is_none());
  assert!(push.events_for("bob").is_empty());
  // Suppressed: the refill no longer offers it.
  assert!(batch.is_empty());
}

#[tokio::test]
async fn swipe_on_deleted_product_is_recorded_and_quiet() {
  let (engine, store, push) = setup().await;
  login(&engine, "alice").await;
  login(&engine, "bob").await;
  let gone = list(&engine, "bob", 0, false).await;
  assert!(engine.delete_product(gone.id).await.unwrap());

  // Accepted, no error, no match, no noise.
  engine
    .swipe("alice", gone.id, AttitudeKind::WillingToPay, None)
    .await
    .unwrap();
  assert!(store.find_match("alice", "bob").await.unwrap().is_none());
  assert!(push.events_for("alice").is_empty());

  // A later swipe on a live product still completes a match.
  let live = list(&engine, "bob", 0, false).await;
  engine
    .swipe("alice", live.id, AttitudeKind::Interested, None)
    .await
    .unwrap();
  assert!(store.find_match("alice", "bob").await.unwrap().is_some());
}

#[tokio::test]
async fn repeated_swipes_change_nothing() {
  let (engine, store, push) = setup().await;
  login(&engine, "alice").await;
  login(&engine, "bob").await;
  let bobs = list(&engine, "bob", 0, false).await;

  engine
    .swipe("alice", bobs.id, AttitudeKind::Interested, None)
    .await
    .unwrap();
  let first = store.find_match("alice", "bob").await.unwrap().unwrap();
  push.clear();

  engine
    .swipe("alice", bobs.id, AttitudeKind::Interested, None)
    .await
    .unwrap();
  engine
    .swipe("alice", bobs.id, AttitudeKind::WillingToPay, None)
    .await
    .unwrap();

  let second = store.find_match("alice", "bob").await.unwrap().unwrap();
  assert_eq!(first.id, second.id);
  assert!(push.events_for("alice").is_empty());
  assert!(push.events_for("bob").is_empty());
}

#[tokio::test]
async fn new_interest_extends_an_existing_match() {
  let (engine, _store, push) = setup().await;
  login(&engine, "alice").await;
  login(&engine, "bob").await;
  let first = list(&engine, "bob", 0, false).await;
  let second = list(&engine, "bob", 0, false).await;

  engine
    .swipe("alice", first.id, AttitudeKind::Interested, None)
    .await
    .unwrap();
  push.clear();

  engine
    .swipe("alice", second.id, AttitudeKind::Interested, None)
    .await
    .unwrap();

  // The interested side gets the full record, the owner just the id.
  let alice_events = push.events_for("alice");
  let bob_events = push.events_for("bob");
  match (&alice_events[..], &bob_events[..]) {
    (
      [Event::ProductAddedToMatch(to_alice)],
      [Event::ProductAddedToMatch(to_bob)],
    ) => {
      assert_eq!(to_alice.product_id, second.id);
      assert!(to_alice.product.is_some());
      assert_eq!(to_bob.product_id, second.id);
      assert!(to_bob.product.is_none());
    }
    other => panic!("unexpected events: {other:?}"),
  }
}

#[tokio::test]
async fn concurrent_opposite_swipes_create_exactly_one_match() {
  let (engine, store, _push) = setup().await;

  for round in 0..100 {
    let a = format!("a{round}");
    let b = format!("b{round}");
    login(&engine, &a).await;
    login(&engine, &b).await;
    let product_a = list(&engine, &a, 0, false).await;
    let product_b = list(&engine, &b, 0, false).await;

    let (left, right) = tokio::join!(
      engine.swipe(&a, product_b.id, AttitudeKind::Interested, None),
      engine.swipe(&b, product_a.id, AttitudeKind::Interested, None),
    );
    left.unwrap();
    right.unwrap();

    let matches = store.matches_for_user(&a).await.unwrap();
    assert_eq!(matches.len(), 1, "round {round}: duplicate match rows");
    assert_eq!(
      matches[0].id,
      store.find_match(&b, &a).await.unwrap().unwrap().id
    );
  }
}

// ─── Product updates ─────────────────────────────────────────────────────────

#[tokio::test]
async fn product_update_notifies_matched_interested_users_only() {
  let (engine, _store, push) = setup().await;
  login(&engine, "alice").await;
  login(&engine, "bob").await;
  login(&engine, "carol").await;
  let bobs = list(&engine, "bob", 0, false).await;
  let other = list(&engine, "bob", 0, false).await;

  // Alice matches with Bob through `bobs`; Carol stays unmatched.
  engine
    .swipe("alice", bobs.id, AttitudeKind::Interested, None)
    .await
    .unwrap();
  push.clear();

  engine
    .update_product(ProductUpdate {
      id:              bobs.id,
      category:        bobs.category,
      title:           "polished".into(),
      description:     bobs.description.clone(),
      requires_return: bobs.requires_return,
    })
    .await
    .unwrap();

  let names = push.names_for("alice");
  assert_eq!(names, vec!["product-updated-in-match"]);
  assert!(push.events_for("carol").is_empty());

  // Updating a product nobody shares stays quiet.
  push.clear();
  engine
    .update_product(ProductUpdate {
      id:              other.id,
      category:        other.category,
      title:           "still unseen".into(),
      description:     other.description.clone(),
      requires_return: other.requires_return,
    })
    .await
    .unwrap();
  assert!(push.events_for("alice").is_empty());
}

#[tokio::test]
async fn updating_a_missing_product_is_not_found() {
  let (engine, _store, _push) = setup().await;
  login(&engine, "alice").await;

  let err = engine
    .update_product(ProductUpdate {
      id:              Uuid::new_v4(),
      category:        0,
      title:           "ghost".into(),
      description:     String::new(),
      requires_return: false,
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::ProductNotFound(_)));
}

// ─── Messages ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn message_is_stored_pushed_and_tagged() {
  let (engine, store, push) = setup().await;
  login(&engine, "alice").await;
  login(&engine, "bob").await;
  let bobs = list(&engine, "bob", 0, false).await;
  engine
    .swipe("alice", bobs.id, AttitudeKind::Interested, None)
    .await
    .unwrap();
  let m = store.find_match("alice", "bob").await.unwrap().unwrap();
  push.clear();

  let sent = engine.send_message(m.id, "alice", "hi bob").await.unwrap();
  assert!(sent.own);
  assert_eq!(sent.content, "hi bob");

  let bob_events = push.events_for("bob");
  match &bob_events[..] {
    [Event::MessageReceived(view)] => {
      assert!(!view.own);
      assert_eq!(view.content, "hi bob");
    }
    other => panic!("unexpected events: {other:?}"),
  }
  assert!(push.events_for("alice").is_empty());
}

#[tokio::test]
async fn message_to_missing_match_is_an_explicit_failure() {
  let (engine, _store, _push) = setup().await;
  login(&engine, "alice").await;

  let err = engine
    .send_message(Uuid::new_v4(), "alice", "hello?")
    .await
    .unwrap_err();
  assert!(matches!(err, Error::MatchNotFound(_)));

  let err = engine
    .send_message(Uuid::new_v4(), "alice", "   ")
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Validation(_)));
}

// ─── Candidates ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn refill_is_skipped_without_a_remaining_list() {
  let (engine, _store, _push) = setup().await;
  login(&engine, "alice").await;
  login(&engine, "bob").await;
  list(&engine, "bob", 0, false).await;

  let none = engine.refresh_candidates("alice", None).await.unwrap();
  assert!(none.is_none());
}

#[tokio::test]
async fn refill_tops_the_page_back_up() {
  let (engine, _store, _push) = setup().await;
  login(&engine, "alice").await;
  login(&engine, "bob").await;
  let mut listed = Vec::new();
  for _ in 0..(SWIPE_PAGE_SIZE + 2) {
    listed.push(list(&engine, "bob", 0, false).await.id);
  }

  let full = engine
    .refresh_candidates("alice", Some(vec![]))
    .await
    .unwrap()
    .unwrap();
  assert_eq!(full.len(), SWIPE_PAGE_SIZE);

  // Holding seven ids leaves room for exactly three more, none repeated.
  let held: Vec<Uuid> = full.iter().take(7).map(|p| p.id).collect();
  let topped = engine
    .refresh_candidates("alice", Some(held.clone()))
    .await
    .unwrap()
    .unwrap();
  assert_eq!(topped.len(), 3);
  assert!(topped.iter().all(|p| !held.contains(&p.id)));
}

// ─── End to end ──────────────────────────────────────────────────────────────

/// The full round trip: a paid swipe forms the match, the owner hears about
/// it live, and the swiper — reconnecting with a stale watermark — recovers
/// the match and the owner's message through delta-sync.
#[tokio::test]
async fn paid_swipe_live_event_then_delta_sync_recovery() {
  let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
  let hub = Arc::new(ConnectionHub::new());
  let engine = Engine::new(Arc::clone(&store), hub.clone());

  login(&engine, "alice").await;
  login(&engine, "bob").await;
  engine.update_wishlist("alice", vec![1]).await.unwrap();
  let p = list(&engine, "bob", 1, true).await;

  // Alice's client last synced before any of this.
  let watermark = Utc::now();

  // Bob is online; Alice is not.
  let (_conn, mut bob_rx) = hub.register("bob");

  let refill = engine
    .swipe("alice", p.id, AttitudeKind::WillingToPay, Some(vec![]))
    .await
    .unwrap();
  assert!(refill.is_some());

  // Bob's live event: a new match naming his product, with no messages.
  let envelope = bob_rx.try_recv().expect("bob should hear about the match");
  let Event::NewMatch(view) = &envelope.event else {
    panic!("expected new-match, got {:?}", envelope.event);
  };
  assert_eq!(view.own_product_ids, vec![p.id]);
  assert!(view.messages.is_empty());

  engine.send_message(view.match_id, "bob", "hi").await.unwrap();

  // Alice reconnects with her stale watermark.
  let delta = engine.reconnect("alice", watermark).await.unwrap();
  assert_eq!(delta.new_matches.len(), 1);
  let recovered = &delta.new_matches[0];
  assert_eq!(recovered.match_id, view.match_id);
  assert_eq!(recovered.foreign_products.len(), 1);
  assert_eq!(recovered.foreign_products[0].id, p.id);
  assert_eq!(recovered.messages.len(), 1);
  assert!(!recovered.messages[0].own);
  assert_eq!(recovered.messages[0].content, "hi");
  assert!(delta.as_of >= recovered.messages[0].sent_at);

  // Syncing again from the fresh watermark replays nothing.
  let quiet = engine.reconnect("alice", delta.as_of).await.unwrap();
  assert!(quiet.new_matches.is_empty());
  assert!(quiet.messages.is_empty());
}
