//! Server Application State
//!
//! Shared state accessible by all WebSocket handlers.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::registry::PresentationRegistry;
use crate::types::SessionId;

use super::protocol::ServerMessage;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    registry: Arc<PresentationRegistry>,

    /// Connected clients, keyed by their session
    clients: DashMap<SessionId, ClientState>,
}

/// Per-client state
#[derive(Debug, Clone)]
pub struct ClientState {
    pub session_id: SessionId,

    pub connected_at: DateTime<Utc>,

    /// Channel to send messages to this client
    pub tx: mpsc::Sender<ServerMessage>,
}

impl AppState {
    pub fn new(registry: Arc<PresentationRegistry>) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                registry,
                clients: DashMap::new(),
            }),
        }
    }

    pub fn registry(&self) -> &Arc<PresentationRegistry> {
        &self.inner.registry
    }

    /// Open a session for a new connection
    pub fn register_client(&self, tx: mpsc::Sender<ServerMessage>) -> SessionId {
        let session_id = self.inner.registry.open_session();
        self.inner.clients.insert(
            session_id,
            ClientState {
                session_id,
                connected_at: Utc::now(),
                tx,
            },
        );
        tracing::info!(session = %session_id, "Client connected");
        session_id
    }

    /// Forget a connection. Drops its sender, so its outgoing queue drains
    /// and closes.
    pub fn remove_client(&self, session_id: SessionId) {
        if let Some((_, client)) = self.inner.clients.remove(&session_id) {
            let duration = Utc::now() - client.connected_at;
            tracing::info!(
                session = %session_id,
                "Client disconnected after {}s",
                duration.num_seconds()
            );
        }
    }

    /// Send a message to a specific client
    pub fn send_to_client(&self, session_id: SessionId, message: ServerMessage) {
        if let Some(client) = self.inner.clients.get(&session_id) {
            if let Err(e) = client.tx.try_send(message) {
                tracing::warn!(session = %session_id, "Failed to send message: {}", e);
            }
        }
    }

    /// Get the number of connected clients
    pub fn client_count(&self) -> usize {
        self.inner.clients.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presentation::DisplayOptions;
    use fieldview_script::{spawn_quickjs_bridge, BridgeOptions};

    #[tokio::test]
    async fn test_client_lifecycle() {
        let bridge = spawn_quickjs_bridge(BridgeOptions::default()).unwrap();
        let state = AppState::new(Arc::new(PresentationRegistry::new(bridge, DisplayOptions::default())));
        let (tx, mut rx) = mpsc::channel(4);

        let session = state.register_client(tx);
        assert_eq!(state.client_count(), 1);
        assert_eq!(state.registry().session_count(), 1);

        state.send_to_client(session, ServerMessage::pong("1"));
        assert!(matches!(rx.recv().await, Some(ServerMessage::Pong { .. })));

        state.remove_client(session);
        assert_eq!(state.client_count(), 0);
        assert!(rx.recv().await.is_none());
    }
}
