use crate::domain::{Color, PlayerIdentity};
use axum::extract::ws::{Message, WebSocket};
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

/// Identifies one live websocket connection. Atomic-counter identity plus
/// a process-wide registry keyed on it, mirroring the teacher's
/// `actors/websocket.rs` exactly — socket identity must survive moves
/// between tasks, so it is a small `Copy` key rather than the socket
/// object itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SocketId(usize);

static NEXT_ID: AtomicUsize = AtomicUsize::new(1);

/// A socket's subscription back-reference: `{gameId, color}` only, never
/// the game object itself (§9 "Cyclic references"). This is the *only*
/// pointer from socket back to game; the strong reference runs the other
/// way, from `PlayerData.socket` to here.
#[derive(Debug, Clone, Copy)]
pub struct Subscription {
    pub game_id: i64,
    pub color: Color,
}

struct SocketData {
    to_client: mpsc::Sender<Message>,
    reader_task: AbortHandle,
    writer_task: AbortHandle,
    subscription: Option<Subscription>,
    /// Set by the external auth adapter once the handshake identifies the
    /// connection (§1 "authentication... treated as an adapter"). `joingame`
    /// and `resync` key off this to find the player's game.
    identity: Option<PlayerIdentity>,
}

static ALL_SOCKETS: Lazy<DashMap<SocketId, SocketData>> = Lazy::new(DashMap::new);

impl SocketId {
    fn next() -> SocketId {
        SocketId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn subscription(&self) -> Option<Subscription> {
        ALL_SOCKETS.get(self).and_then(|s| s.subscription)
    }

    pub fn set_subscription(&self, subscription: Option<Subscription>) {
        if let Some(mut entry) = ALL_SOCKETS.get_mut(self) {
            entry.subscription = subscription;
        }
    }

    pub fn identity(&self) -> Option<PlayerIdentity> {
        ALL_SOCKETS.get(self).and_then(|s| s.identity.clone())
    }

    pub fn set_identity(&self, identity: Option<PlayerIdentity>) {
        if let Some(mut entry) = ALL_SOCKETS.get_mut(self) {
            entry.identity = identity;
        }
    }

    /// Best-effort send — per §5, there are no retries on outbound
    /// messages; a closed socket is simply skipped and observed later as
    /// a disconnect.
    pub fn send(&self, message: Message) {
        if let Some(entry) = ALL_SOCKETS.get(self) {
            let sender = entry.to_client.clone();
            tokio::spawn(async move {
                let _ = sender.send(message).await;
            });
        }
    }

    pub fn send_json(&self, value: &impl serde::Serialize) {
        if let Ok(text) = serde_json::to_string(value) {
            self.send(Message::Text(text));
        }
    }

    /// Aborts both the reader and writer tasks and removes the registry
    /// entry. Idempotent.
    pub fn remove(&self) {
        if let Some((_, data)) = ALL_SOCKETS.remove(self) {
            data.reader_task.abort();
            data.writer_task.abort();
        }
    }
}

/// Splits an accepted `WebSocket` into reader/writer tasks and registers
/// a fresh `SocketId` for it, exactly as the teacher's `handle_socket`
/// does. `on_message` is invoked from the reader task for every inbound
/// text frame; `on_close` runs once the reader task observes a closed
/// connection (normal close or error), which is where disconnect timers
/// get armed.
pub fn register_socket<F, C>(socket: WebSocket, on_message: F, on_close: C) -> SocketId
where
    F: Fn(SocketId, String) + Send + Sync + 'static,
    C: FnOnce(SocketId) + Send + 'static,
{
    let id = SocketId::next();
    let (mut sink, mut stream) = socket.split();
    let (to_client, mut from_handlers) = mpsc::channel::<Message>(32);

    let writer_task = tokio::spawn(async move {
        while let Some(message) = from_handlers.recv().await {
            if sink.send(message).await.is_err() {
                break;
            }
        }
    })
    .abort_handle();

    let reader_task = tokio::spawn(async move {
        while let Some(Ok(message)) = stream.next().await {
            if let Message::Text(text) = message {
                on_message(id, text);
            }
        }
        on_close(id);
    })
    .abort_handle();

    ALL_SOCKETS.insert(
        id,
        SocketData { to_client, reader_task, writer_task, subscription: None, identity: None },
    );

    id
}

/// Registers a socket identity with no backing connection — there is
/// nothing downstream of `to_client` to actually flush the channel, so
/// `send`/`send_json` are effectively no-ops. Lets router/handler tests
/// exercise real `SocketId` plumbing (`subscribe`, `identity`) without
/// standing up an actual `WebSocket`.
#[cfg(test)]
pub fn register_test_socket() -> SocketId {
    let id = SocketId::next();
    let (to_client, _from_handlers) = mpsc::channel::<Message>(32);
    let noop = tokio::spawn(async {}).abort_handle();
    ALL_SOCKETS.insert(
        id,
        SocketData { to_client, reader_task: noop.clone(), writer_task: noop, subscription: None, identity: None },
    );
    id
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fresh_ids_are_distinct() {
        let a = SocketId::next();
        let b = SocketId::next();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_socket_carries_identity_and_subscription() {
        let id = register_test_socket();
        assert!(id.subscription().is_none());
        id.set_identity(Some(PlayerIdentity::Guest { browser_id: "x".into() }));
        assert_eq!(id.identity(), Some(PlayerIdentity::Guest { browser_id: "x".into() }));
    }
}
