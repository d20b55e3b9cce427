use std::sync::Arc;

use crate::error::DeliveryError;
use crate::ws::{ConnectionId, ConnectionRegistry, OutboundEvent};

/// Outcome of one broadcast, kept for logging and tests
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: Vec<ConnectionId>,
    pub failed: Vec<(ConnectionId, DeliveryError)>,
}

/// Fans events out to every identified participant
#[derive(Clone)]
pub struct Broadcaster {
    registry: ConnectionRegistry,
}

impl Broadcaster {
    pub fn new(registry: ConnectionRegistry) -> Self {
        Self { registry }
    }

    /// Queue `event` for every participant except `exclude`.
    ///
    /// Delivery only enqueues, so a call returns once every recipient's queue
    /// has been tried. Two calls made one after the other reach each
    /// recipient in the same order. Per-recipient failures are recorded in
    /// the report and never returned as errors.
    pub async fn broadcast(
        &self,
        event: OutboundEvent,
        exclude: Option<ConnectionId>,
    ) -> DeliveryReport {
        let event = Arc::new(event);
        let recipients = self.registry.snapshot().await;
        let mut report = DeliveryReport::default();

        for participant in recipients {
            if Some(participant.connection_id) == exclude {
                continue;
            }
            match participant.outbox.deliver(event.clone()) {
                Ok(()) => report.delivered.push(participant.connection_id),
                Err(e) => {
                    // Closed peers are about to be unregistered by their own session
                    if e == DeliveryError::Closed {
                        tracing::debug!(
                            connection_id = %participant.connection_id,
                            "Skipping closed connection"
                        );
                    } else {
                        tracing::warn!(
                            connection_id = %participant.connection_id,
                            error = %e,
                            "Failed to deliver event"
                        );
                    }
                    report.failed.push((participant.connection_id, e));
                }
            }
        }

        tracing::debug!(
            event = ?event,
            delivered = report.delivered.len(),
            failed = report.failed.len(),
            "Broadcast finished"
        );
        report
    }
}
