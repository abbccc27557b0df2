//! The per-user push channel abstraction.
//!
//! Delivery is fire-and-forget to whatever connections are currently open:
//! at-most-once, no queuing, no retry. A user with no open connection is a
//! silent no-op — the reconnection delta-sync is the sole recovery path for
//! missed events.

use crate::event::Envelope;

/// Addressable push to all live connections of a user.
pub trait PushChannel: Send + Sync {
  /// Deliver `envelope` to every open connection registered for
  /// `user_id`. Must not block and must not fail the caller.
  fn push(&self, user_id: &str, envelope: Envelope);
}
