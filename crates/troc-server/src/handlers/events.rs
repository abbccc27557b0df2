//! The per-user push stream.
//!
//! `GET /api/events/{user_id}` opens a server-sent-events stream. Opening
//! it registers a connection in the hub under the announced user id (a user
//! may hold several at once — one per device); dropping the stream, however
//! the disconnect happens, deregisters it through the guard's `Drop`. The
//! hub never buffers for absent users: whatever a closed stream misses is
//! recovered via `/api/reconnect`.

use std::{
  pin::Pin,
  sync::Arc,
  task::{Context, Poll},
};

use axum::{
  extract::{Path, State},
  response::sse::{Event as SseEvent, KeepAlive, KeepAliveStream, Sse},
};
use futures::Stream;
use tokio::sync::mpsc;
use troc_core::{event::Envelope, store::BarterStore};
use troc_engine::ConnectionHub;
use uuid::Uuid;

use crate::AppState;

/// Deregisters the connection when the stream goes away.
struct ConnectionGuard {
  hub:           Arc<ConnectionHub>,
  user_id:       String,
  connection_id: Uuid,
}

impl Drop for ConnectionGuard {
  fn drop(&mut self) {
    self.hub.deregister(&self.user_id, self.connection_id);
  }
}

/// An SSE stream fed by the hub's channel for one connection.
pub struct EventStream {
  rx:     mpsc::UnboundedReceiver<Envelope>,
  _guard: ConnectionGuard,
}

impl Stream for EventStream {
  type Item = Result<SseEvent, axum::Error>;

  fn poll_next(
    self: Pin<&mut Self>,
    cx: &mut Context<'_>,
  ) -> Poll<Option<Self::Item>> {
    let this = self.get_mut();
    match this.rx.poll_recv(cx) {
      Poll::Ready(Some(envelope)) => {
        let event = SseEvent::default()
          .event(envelope.event.name())
          .json_data(&envelope);
        Poll::Ready(Some(event))
      }
      Poll::Ready(None) => Poll::Ready(None),
      Poll::Pending => Poll::Pending,
    }
  }
}

/// `GET /api/events/{user_id}`.
pub async fn stream<S>(
  State(state): State<AppState<S>>,
  Path(user_id): Path<String>,
) -> Sse<KeepAliveStream<EventStream>>
where
  S: BarterStore + 'static,
{
  let (connection_id, rx) = state.hub.register(&user_id);
  let guard = ConnectionGuard {
    hub: Arc::clone(&state.hub),
    user_id,
    connection_id,
  };
  Sse::new(EventStream { rx, _guard: guard }).keep_alive(KeepAlive::default())
}
