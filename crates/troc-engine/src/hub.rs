//! [`ConnectionHub`] — the process-local map from user ids to live push
//! connections.
//!
//! The hub holds no persistent state: it is rebuilt from scratch on process
//! restart and whenever a client (re)connects. Registration happens when a
//! client announces its user id after connecting; deregistration on
//! disconnect. A user may hold several connections at once (multiple
//! devices); delivery goes to all of them, fire-and-forget.

use std::{
  collections::HashMap,
  sync::{Mutex, PoisonError},
};

use tokio::sync::mpsc;
use troc_core::{event::Envelope, push::PushChannel};
use uuid::Uuid;

struct Connection {
  id: Uuid,
  tx: mpsc::UnboundedSender<Envelope>,
}

/// Concurrency-safe user → connections table implementing [`PushChannel`].
///
/// The mutex is only ever held for map bookkeeping — sends are unbounded
/// channel writes and never block.
#[derive(Default)]
pub struct ConnectionHub {
  connections: Mutex<HashMap<String, Vec<Connection>>>,
}

impl ConnectionHub {
  pub fn new() -> Self { Self::default() }

  /// Register a new connection for `user_id`. Returns the connection id
  /// (needed to deregister) and the receiving end the transport drains.
  pub fn register(
    &self,
    user_id: &str,
  ) -> (Uuid, mpsc::UnboundedReceiver<Envelope>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let id = Uuid::new_v4();
    let mut map = self.lock();
    map
      .entry(user_id.to_owned())
      .or_default()
      .push(Connection { id, tx });
    tracing::debug!(user = user_id, connection = %id, "connection registered");
    (id, rx)
  }

  /// Remove one connection of `user_id`. Unknown ids are ignored — a
  /// disconnect may race an explicit logout.
  pub fn deregister(&self, user_id: &str, connection_id: Uuid) {
    let mut map = self.lock();
    if let Some(conns) = map.get_mut(user_id) {
      conns.retain(|c| c.id != connection_id);
      if conns.is_empty() {
        map.remove(user_id);
      }
    }
    tracing::debug!(
      user = user_id,
      connection = %connection_id,
      "connection deregistered"
    );
  }

  /// Number of live connections for `user_id`.
  pub fn connection_count(&self, user_id: &str) -> usize {
    self.lock().get(user_id).map_or(0, Vec::len)
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<Connection>>> {
    self.connections.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

impl PushChannel for ConnectionHub {
  fn push(&self, user_id: &str, envelope: Envelope) {
    let mut map = self.lock();
    let Some(conns) = map.get_mut(user_id) else {
      // Nobody connected: at-most-once means the event is simply gone.
      // Delta-sync is the recovery path.
      return;
    };
    // A closed receiver means the transport went away without
    // deregistering; prune it here.
    conns.retain(|c| c.tx.send(envelope.clone()).is_ok());
    if conns.is_empty() {
      map.remove(user_id);
    }
  }
}
