use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError, Receiver, Sender};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::DeliveryError;
use crate::ws::OutboundEvent;

/// Identity assigned to a peer when its connection is accepted
pub type ConnectionId = Uuid;

/// Cloneable handle for queueing events to one peer.
///
/// The queue is bounded. A peer that lets it fill up is disconnected instead
/// of slowing down everybody else's broadcasts.
#[derive(Debug, Clone)]
pub struct Outbox {
    id: ConnectionId,
    tx: Sender<Arc<OutboundEvent>>,
    cancel_token: CancellationToken,
}

impl Outbox {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue an event without waiting for the peer
    pub fn deliver(&self, event: Arc<OutboundEvent>) -> Result<(), DeliveryError> {
        if self.cancel_token.is_cancelled() {
            return Err(DeliveryError::Closed);
        }
        match self.tx.try_send(event) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                tracing::warn!(
                    connection_id = %self.id,
                    "Outbound queue overflow, disconnecting slow peer"
                );
                self.cancel_token.cancel();
                Err(DeliveryError::QueueFull)
            }
            Err(TrySendError::Closed(_)) => Err(DeliveryError::Closed),
        }
    }

    /// Mark the connection closed, cancelling its reader and writer
    pub fn close(&self) {
        self.cancel_token.cancel();
    }
}

/// One peer's duplex channel, before it is split between the reader and writer tasks
#[derive(Debug)]
pub struct Connection {
    outbox: Outbox,
    rx: Receiver<Arc<OutboundEvent>>,
}

impl Connection {
    pub fn new(capacity: usize, cancel_token: CancellationToken) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            outbox: Outbox {
                id: Uuid::new_v4(),
                tx,
                cancel_token,
            },
            rx,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.outbox.id
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.outbox.cancel_token.clone()
    }

    pub fn into_parts(self) -> (Outbox, Receiver<Arc<OutboundEvent>>) {
        (self.outbox, self.rx)
    }
}
