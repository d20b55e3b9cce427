use crate::ws::{
    Broadcaster, ConnectionId, ConnectionRegistry, InboundEvent, OutboundEvent, Outbox,
    Participant,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, no name yet
    Unidentified,
    Active { name: String },
    Closed,
}

/// Per-connection chat logic. Owns the state machine of one peer.
pub struct Session {
    outbox: Outbox,
    state: SessionState,
    registry: ConnectionRegistry,
    broadcaster: Broadcaster,
}

impl Session {
    pub fn new(outbox: Outbox, registry: ConnectionRegistry, broadcaster: Broadcaster) -> Self {
        Self {
            outbox,
            state: SessionState::Unidentified,
            registry,
            broadcaster,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.outbox.id()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Decode and apply one text frame.
    ///
    /// An error means the frame was not a valid event and the connection
    /// should be closed.
    pub async fn handle_frame(&mut self, text: &str) -> crate::error::Result<()> {
        let event: InboundEvent = serde_json::from_str(text)?;
        self.handle_event(event).await;
        Ok(())
    }

    pub async fn handle_event(&mut self, event: InboundEvent) {
        tracing::trace!(connection_id = %self.id(), event = ?event, "Handling event");
        match event {
            InboundEvent::Identify { name } => match self.state {
                SessionState::Unidentified => self.identify(name).await,
                SessionState::Active { .. } => {
                    tracing::debug!(connection_id = %self.id(), "Ignoring identify from an active session");
                }
                SessionState::Closed => {}
            },
            InboundEvent::ChatMessage { text } => match &self.state {
                SessionState::Active { name } => {
                    if text.trim().is_empty() {
                        return;
                    }
                    let text = format!("{}: {}", name, text);
                    self.broadcaster
                        .broadcast(OutboundEvent::ChatMessage { text }, None)
                        .await;
                }
                SessionState::Unidentified => {
                    tracing::debug!(connection_id = %self.id(), "Ignoring message before identify");
                }
                SessionState::Closed => {}
            },
        }
    }

    async fn identify(&mut self, name: String) {
        let name = name.trim();
        if name.is_empty() {
            return;
        }
        let name = name.to_string();
        self.registry.register(self.outbox.clone(), name.clone()).await;
        tracing::info!(connection_id = %self.id(), name = %name, "User joined");
        self.state = SessionState::Active { name: name.clone() };
        self.broadcaster
            .broadcast(OutboundEvent::UserJoined { name }, None)
            .await;
    }

    /// Move to `Closed`, announcing the departure if the peer had identified.
    /// Only the first call has any effect.
    pub async fn disconnect(&mut self) -> Option<Participant> {
        if self.state == SessionState::Closed {
            return None;
        }
        self.state = SessionState::Closed;
        let participant = self.registry.unregister(&self.outbox.id()).await?;
        tracing::info!(connection_id = %self.id(), name = %participant.name, "User left");
        self.broadcaster
            .broadcast(
                OutboundEvent::UserLeft {
                    name: participant.name.clone(),
                },
                None,
            )
            .await;
        Some(participant)
    }
}
