//! JSON operation handlers, grouped by resource.
//!
//! Every handler is generic over the store backend, mirroring the engine.
//! Every state-mutating response is wrapped in
//! [`troc_core::event::Stamped`] so its timestamp can serve directly as the
//! client's next watermark.

pub mod events;
pub mod images;
pub mod messages;
pub mod products;
pub mod session;
pub mod swipes;
pub mod sync;
