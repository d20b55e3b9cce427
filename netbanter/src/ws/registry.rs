use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::ws::{ConnectionId, Outbox};

/// A connection that has identified itself
#[derive(Debug, Clone)]
pub struct Participant {
    pub connection_id: ConnectionId,
    pub name: String,
    pub(crate) outbox: Outbox,
}

/// Registry of identified peers, keyed by connection
#[derive(Clone)]
pub struct ConnectionRegistry {
    participants: Arc<RwLock<HashMap<ConnectionId, Participant>>>,
}

impl ConnectionRegistry {
    /// Create a new empty connection registry
    pub fn new() -> Self {
        Self {
            participants: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register a participant for the outbox's connection. Last write wins.
    pub async fn register(&self, outbox: Outbox, name: impl Into<String>) {
        let connection_id = outbox.id();
        let participant = Participant {
            connection_id,
            name: name.into(),
            outbox,
        };
        tracing::debug!(connection_id = %connection_id, name = %participant.name, "Participant registered");
        self.participants
            .write()
            .await
            .insert(connection_id, participant);
    }

    /// Remove a participant, returning it if it was registered
    pub async fn unregister(&self, connection_id: &ConnectionId) -> Option<Participant> {
        let removed = self.participants.write().await.remove(connection_id);
        if let Some(ref participant) = removed {
            tracing::debug!(connection_id = %connection_id, name = %participant.name, "Participant unregistered");
        }
        removed
    }

    /// Point-in-time copy of all participants. The lock is released on return.
    pub async fn snapshot(&self) -> Vec<Participant> {
        self.participants.read().await.values().cloned().collect()
    }

    /// Get the count of currently identified participants
    pub async fn count(&self) -> usize {
        self.participants.read().await.len()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
