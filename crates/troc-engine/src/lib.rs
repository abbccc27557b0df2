//! The swipe-to-match engine and its notification fan-out.
//!
//! [`Engine`] is generic over any [`troc_core::store::BarterStore`] and any
//! [`troc_core::push::PushChannel`]; it owns the decision logic — when a
//! swipe forms a match, who hears about what, how a reconnecting client
//! catches up — while the store owns atomicity and the transport owns
//! connection lifecycles.

mod engine;

pub mod hub;

pub use engine::{Bootstrap, Engine, SWIPE_PAGE_SIZE};
pub use hub::ConnectionHub;

#[cfg(test)]
mod tests;
