//! Process-wide session registry.
//!
//! Maps session id to live state. Entries survive socket disconnects and
//! are removed only by explicit stop or a terminal finalization failure.
//! The outer map admits concurrent readers; each entry's mutex serializes
//! that session's mutations.

use crate::session::messages::SocketSender;
use crate::session::state::SessionState;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::info;

pub type SharedSessionState = Arc<Mutex<SessionState>>;

#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SharedSessionState>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent under reconnect: an existing entry keeps its PCM and
    /// sub-tasks, and only callers swap the socket handle.
    pub async fn create(&self, session_id: &str) -> SharedSessionState {
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                info!("Registering session state: {}", session_id);
                Arc::new(Mutex::new(SessionState::new(session_id)))
            })
            .clone()
    }

    pub async fn get(&self, session_id: &str) -> Option<SharedSessionState> {
        self.sessions.read().await.get(session_id).cloned()
    }

    /// Swap only the socket handle, preserving everything else.
    /// Returns false when no entry exists.
    pub async fn replace_socket(&self, session_id: &str, socket: SocketSender) -> bool {
        match self.get(session_id).await {
            Some(state) => {
                state.lock().await.socket = Some(socket);
                true
            }
            None => false,
        }
    }

    pub async fn remove(&self, session_id: &str) -> Option<SharedSessionState> {
        let removed = self.sessions.write().await.remove(session_id);
        if removed.is_some() {
            info!("Removed session state: {}", session_id);
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_create_is_idempotent() {
        let registry = SessionRegistry::new();

        let first = registry.create("s1").await;
        first.lock().await.pcm.extend_from_slice(&[1, 2, 3]);
        first.lock().await.frames_received = 7;

        let second = registry.create("s1").await;
        let state = second.lock().await;
        assert_eq!(state.pcm, vec![1, 2, 3]);
        assert_eq!(state.frames_received, 7);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_replace_socket_preserves_state() {
        let registry = SessionRegistry::new();
        let entry = registry.create("s1").await;
        entry.lock().await.pcm.extend_from_slice(&[9; 16]);

        let (tx, _rx) = mpsc::unbounded_channel();
        assert!(registry.replace_socket("s1", tx).await);

        let state = entry.lock().await;
        assert!(state.socket.is_some());
        assert_eq!(state.pcm.len(), 16);
    }

    #[tokio::test]
    async fn test_replace_socket_without_entry() {
        let registry = SessionRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        assert!(!registry.replace_socket("missing", tx).await);
    }

    #[tokio::test]
    async fn test_remove() {
        let registry = SessionRegistry::new();
        registry.create("s1").await;
        assert!(registry.remove("s1").await.is_some());
        assert!(registry.get("s1").await.is_none());
        assert!(registry.remove("s1").await.is_none());
    }
}
