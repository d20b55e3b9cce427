use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::{stream::SplitSink, SinkExt, StreamExt};
use tokio::sync::mpsc::Receiver;
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use crate::ws::{
    Broadcaster, Connection, ConnectionId, ConnectionRegistry, OutboundEvent, Session,
};

const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// State shared with WebSocket handlers
#[derive(Clone)]
pub struct ChatState {
    pub registry: ConnectionRegistry,
    pub broadcaster: Broadcaster,
    pub outbound_queue_capacity: usize,
    pub max_frame_size: usize,
    /// Parent of every connection's token, cancelled on shutdown
    pub cancel_token: CancellationToken,
    pub tracker: TaskTracker,
}

impl ChatState {
    pub fn new(
        outbound_queue_capacity: usize,
        max_frame_size: usize,
        cancel_token: CancellationToken,
    ) -> Self {
        let registry = ConnectionRegistry::new();
        Self {
            broadcaster: Broadcaster::new(registry.clone()),
            registry,
            outbound_queue_capacity,
            max_frame_size,
            cancel_token,
            tracker: TaskTracker::new(),
        }
    }
}

/// WebSocket upgrade handler for chat peers
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ChatState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> Response {
    if state.cancel_token.is_cancelled() {
        tracing::debug!(peer = %addr, "Rejecting connection during shutdown");
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    let tracker = state.tracker.clone();
    ws.max_message_size(state.max_frame_size)
        .on_failed_upgrade(move |e| {
            tracing::warn!(peer = %addr, error = %e, "WebSocket upgrade failed");
        })
        .on_upgrade(move |socket| tracker.track_future(handle_socket(socket, addr, state)))
}

/// Drive one peer from accept to close
async fn handle_socket(socket: WebSocket, addr: SocketAddr, state: Arc<ChatState>) {
    let connection = Connection::new(
        state.outbound_queue_capacity,
        state.cancel_token.child_token(),
    );
    let connection_id = connection.id();
    let cancel_token = connection.cancel_token();
    let (outbox, outbound_rx) = connection.into_parts();
    tracing::info!(connection_id = %connection_id, peer = %addr, "Connection accepted");

    let (sender, mut receiver) = socket.split();
    let writer = tokio::spawn(write_outbound(
        sender,
        outbound_rx,
        cancel_token.clone(),
        connection_id,
    ));

    let mut session = Session::new(
        outbox.clone(),
        state.registry.clone(),
        state.broadcaster.clone(),
    );

    loop {
        let msg = tokio::select! {
            _ = cancel_token.cancelled() => {
                tracing::debug!(connection_id = %connection_id, "Connection cancelled");
                break;
            }
            msg = receiver.next() => msg,
        };
        match msg {
            Some(Ok(Message::Text(text))) => {
                tracing::debug!(
                    connection_id = %connection_id,
                    message_length = text.len(),
                    "Received text message"
                );
                if let Err(e) = session.handle_frame(text.as_str()).await {
                    tracing::warn!(
                        connection_id = %connection_id,
                        error = %e,
                        "Closing connection on malformed event"
                    );
                    break;
                }
            }
            Some(Ok(Message::Binary(_))) => {
                tracing::warn!(
                    connection_id = %connection_id,
                    "Closing connection on unexpected binary message"
                );
                break;
            }
            Some(Ok(Message::Close(frame))) => {
                tracing::debug!(
                    connection_id = %connection_id,
                    reason = ?frame,
                    "Peer closed connection"
                );
                break;
            }
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                // Pings are answered by the protocol layer
            }
            Some(Err(e)) => {
                tracing::warn!(
                    connection_id = %connection_id,
                    error = %e,
                    "WebSocket error"
                );
                break;
            }
            None => break,
        }
    }

    // Cleanup on disconnect
    session.disconnect().await;
    outbox.close();
    if let Err(e) = writer.await {
        tracing::error!(connection_id = %connection_id, error = %e, "Writer task failed");
    }
    tracing::info!(connection_id = %connection_id, peer = %addr, "Connection closed");
}

/// Drain a peer's outbound queue into its socket until the connection is cancelled
async fn write_outbound(
    mut sender: SplitSink<WebSocket, Message>,
    mut rx: Receiver<Arc<OutboundEvent>>,
    cancel_token: CancellationToken,
    connection_id: ConnectionId,
) {
    loop {
        let event = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => break,
            event = rx.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };
        let text = match serde_json::to_string(event.as_ref()) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(connection_id = %connection_id, error = %e, "Failed to encode event");
                continue;
            }
        };
        let sent = tokio::select! {
            _ = cancel_token.cancelled() => break,
            sent = sender.send(Message::Text(text.into())) => sent,
        };
        if let Err(e) = sent {
            tracing::debug!(connection_id = %connection_id, error = %e, "Failed to write to peer");
            cancel_token.cancel();
            break;
        }
    }
    match tokio::time::timeout(CLOSE_TIMEOUT, sender.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::trace!(connection_id = %connection_id, error = %e, "Failed to close socket");
        }
        Err(_) => {
            tracing::debug!(connection_id = %connection_id, "Timed out closing socket");
        }
    }
}
