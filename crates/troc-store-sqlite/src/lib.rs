//! SQLite backend for the Troc barter store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! pool without blocking the async runtime. Multi-step writes (attitude
//! closure expansion, the match check-then-insert, product insert with
//! self-suppression) run inside rusqlite transactions on that thread.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
