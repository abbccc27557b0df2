//! HTTP layer for Troc.
//!
//! Exposes an axum [`Router`] with the JSON operation routes, the per-user
//! SSE push stream, and the product picture routes, backed by any
//! [`BarterStore`]. TLS and reverse-proxy concerns are the caller's
//! responsibility; identity comes from the external user directory and is
//! taken at face value.

pub mod blob;
pub mod error;
pub mod handlers;

pub use error::ApiError;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{get, post, put},
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use troc_core::{push::PushChannel, store::BarterStore};
use troc_engine::{ConnectionHub, Engine};

use blob::ImageStore;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and the
/// `TROC_*` environment.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:       String,
  #[serde(default = "default_port")]
  pub port:       u16,
  #[serde(default = "default_store_path")]
  pub store_path: PathBuf,
  #[serde(default = "default_image_dir")]
  pub image_dir:  PathBuf,
}

fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 4970 }
fn default_store_path() -> PathBuf { PathBuf::from("data/troc.db") }
fn default_image_dir() -> PathBuf { PathBuf::from("data/images") }

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S> {
  pub engine: Engine<S>,
  pub hub:    Arc<ConnectionHub>,
  pub images: Arc<ImageStore>,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      engine: self.engine.clone(),
      hub:    Arc::clone(&self.hub),
      images: Arc::clone(&self.images),
    }
  }
}

impl<S: BarterStore> AppState<S> {
  /// Wire an engine, hub, and image store together over `store`.
  pub fn new(store: Arc<S>, images: ImageStore) -> Self {
    let hub = Arc::new(ConnectionHub::new());
    let engine = Engine::new(store, Arc::clone(&hub) as Arc<dyn PushChannel>);
    Self { engine, hub, images: Arc::new(images) }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the axum [`Router`] for the Troc server.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: BarterStore + 'static,
{
  Router::new()
    .route("/api/login", post(handlers::session::login::<S>))
    .route("/api/wishlist", put(handlers::session::update_wishlist::<S>))
    .route("/api/products", post(handlers::products::create::<S>))
    .route(
      "/api/products/{id}",
      put(handlers::products::update::<S>)
        .delete(handlers::products::delete::<S>),
    )
    .route("/api/swipes", post(handlers::swipes::swipe::<S>))
    .route("/api/candidates", post(handlers::swipes::refresh::<S>))
    .route(
      "/api/matches/{id}/messages",
      post(handlers::messages::send::<S>),
    )
    .route("/api/reconnect", post(handlers::sync::reconnect::<S>))
    .route("/api/events/{user_id}", get(handlers::events::stream::<S>))
    .route("/images/{file}", get(handlers::images::serve::<S>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

// ─── Integration tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
  use serde_json::{Value, json};
  use tempfile::TempDir;
  use tower::ServiceExt as _;
  use troc_store_sqlite::SqliteStore;
  use uuid::Uuid;

  use super::*;

  async fn make_state() -> (AppState<SqliteStore>, TempDir) {
    let dir = TempDir::new().unwrap();
    let store = SqliteStore::open_in_memory().await.unwrap();
    let images = ImageStore::open(dir.path().to_path_buf()).await.unwrap();
    (AppState::new(Arc::new(store), images), dir)
  }

  async fn send_json(
    state: AppState<SqliteStore>,
    method: &str,
    uri: &str,
    body: Value,
  ) -> (StatusCode, Value) {
    let req = Request::builder()
      .method(method)
      .uri(uri)
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(body.to_string()))
      .unwrap();
    let resp = router(state).oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
      .await
      .unwrap();
    let value = if bytes.is_empty() {
      Value::Null
    } else {
      serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
  }

  fn login_body(id: &str) -> Value {
    json!({ "id": id, "name": id.to_uppercase(), "picture_url": null })
  }

  async fn login(state: &AppState<SqliteStore>, id: &str) -> Value {
    let (status, body) =
      send_json(state.clone(), "POST", "/api/login", login_body(id)).await;
    assert_eq!(status, StatusCode::OK);
    body
  }

  async fn create_product(
    state: &AppState<SqliteStore>,
    owner: &str,
    category: u8,
    requires_return: bool,
    picture: Option<&str>,
  ) -> Value {
    let (status, body) = send_json(
      state.clone(),
      "POST",
      "/api/products",
      json!({
        "owner_id": owner,
        "category": category,
        "title": format!("{owner}'s item"),
        "description": "works fine",
        "requires_return": requires_return,
        "picture": picture,
      }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create failed: {body}");
    body["data"].clone()
  }

  // ── Login ───────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn login_returns_stamped_bootstrap() {
    let (state, _dir) = make_state().await;
    let body = login(&state, "alice").await;

    assert!(body["at"].is_string());
    assert_eq!(body["data"]["user"]["id"], "alice");
    assert_eq!(
      body["data"]["categories"].as_array().unwrap().len(),
      troc_core::user::CATEGORIES.len()
    );
    assert!(body["data"]["matches"].as_array().unwrap().is_empty());
  }

  #[tokio::test]
  async fn blank_login_is_rejected_before_any_write() {
    let (state, _dir) = make_state().await;
    let (status, body) =
      send_json(state, "POST", "/api/login", login_body("  ")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
  }

  // ── Products ────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn unknown_category_is_rejected() {
    let (state, _dir) = make_state().await;
    login(&state, "alice").await;

    let (status, _) = send_json(
      state,
      "POST",
      "/api/products",
      json!({
        "owner_id": "alice",
        "category": 99,
        "title": "mystery",
        "description": "",
        "requires_return": false,
      }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn bad_base64_picture_is_rejected() {
    let (state, _dir) = make_state().await;
    login(&state, "alice").await;

    let (status, _) = send_json(
      state,
      "POST",
      "/api/products",
      json!({
        "owner_id": "alice",
        "category": 0,
        "title": "camera",
        "description": "",
        "requires_return": false,
        "picture": "!!!not-base64!!!",
      }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn picture_round_trips_through_the_image_route() {
    let (state, _dir) = make_state().await;
    login(&state, "alice").await;

    let fake_jpeg = b"\xff\xd8\xff\xe0 not really a jpeg";
    let encoded = B64.encode(fake_jpeg);
    let product =
      create_product(&state, "alice", 0, false, Some(encoded.as_str())).await;
    let id = product["id"].as_str().unwrap();

    let req = Request::builder()
      .uri(format!("/images/{id}.jpg"))
      .body(Body::empty())
      .unwrap();
    let resp = router(state.clone()).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let ct = resp
      .headers()
      .get(header::CONTENT_TYPE)
      .unwrap()
      .to_str()
      .unwrap();
    assert_eq!(ct, "image/jpeg");
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
      .await
      .unwrap();
    assert_eq!(&bytes[..], &fake_jpeg[..]);

    // Deleting the product takes the picture with it.
    let (status, _) = send_json(
      state.clone(),
      "DELETE",
      &format!("/api/products/{id}"),
      Value::Null,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let req = Request::builder()
      .uri(format!("/images/{id}.jpg"))
      .body(Body::empty())
      .unwrap();
    let resp = router(state).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn deleting_a_missing_product_is_404() {
    let (state, _dir) = make_state().await;
    let (status, _) = send_json(
      state,
      "DELETE",
      &format!("/api/products/{}", Uuid::new_v4()),
      Value::Null,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  // ── Messages ────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn message_to_unknown_match_is_404() {
    let (state, _dir) = make_state().await;
    login(&state, "alice").await;

    let (status, _) = send_json(
      state,
      "POST",
      &format!("/api/matches/{}/messages", Uuid::new_v4()),
      json!({ "sender_id": "alice", "content": "hello?" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  // ── The swipe → match → reconnect flow ──────────────────────────────────

  #[tokio::test]
  async fn swipe_forms_match_and_reconnect_recovers_it() {
    let (state, _dir) = make_state().await;
    login(&state, "alice").await;
    login(&state, "bob").await;
    let product =
      create_product(&state, "bob", 1, true, None).await;

    // Alice last synced before any of this happened.
    let stale_watermark = chrono::Utc::now().to_rfc3339();

    let (status, swipe_resp) = send_json(
      state.clone(),
      "POST",
      "/api/swipes",
      json!({
        "user_id": "alice",
        "product_id": product["id"],
        "kind": "willing_to_pay",
        "remaining": [],
      }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    // Refill was requested with an empty hand: a (possibly empty) batch,
    // not null.
    assert!(swipe_resp["data"].is_array());
    assert!(swipe_resp["at"].is_string());

    let (status, delta) = send_json(
      state.clone(),
      "POST",
      "/api/reconnect",
      json!({ "user_id": "alice", "since": stale_watermark }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let new_matches = delta["data"]["new_matches"].as_array().unwrap();
    assert_eq!(new_matches.len(), 1);
    assert_eq!(
      new_matches[0]["foreign_products"][0]["id"],
      product["id"]
    );
    assert_eq!(delta["at"], delta["data"]["as_of"]);

    // The counterpart can message through the recovered match id.
    let match_id = new_matches[0]["match_id"].as_str().unwrap();
    let (status, sent) = send_json(
      state,
      "POST",
      &format!("/api/matches/{match_id}/messages"),
      json!({ "sender_id": "bob", "content": "hi" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sent["data"]["own"], true);
  }

  #[tokio::test]
  async fn refresh_without_remaining_returns_null_batch() {
    let (state, _dir) = make_state().await;
    login(&state, "alice").await;

    let (status, body) = send_json(
      state,
      "POST",
      "/api/candidates",
      json!({ "user_id": "alice" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].is_null());
  }
}
