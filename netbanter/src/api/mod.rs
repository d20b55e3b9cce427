use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::ws::{websocket_handler, ChatState};

async fn health(State(st): State<Arc<ChatState>>) -> (StatusCode, Json<serde_json::Value>) {
    let participants = st.registry.count().await;
    (
        StatusCode::OK,
        Json(json!({"status": "ok", "participants": participants})),
    )
}

pub fn router(st: Arc<ChatState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws", get(websocket_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(st)
}
