use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::app::AppState;

/// GET /health — liveness probe, returns server metadata and connection count.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let providers: Vec<Value> = state
        .config
        .providers
        .iter()
        .map(|p| json!({ "name": p.name, "kind": p.kind, "model": p.model }))
        .collect();

    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "protocol": hearth_protocol::PROTOCOL_VERSION,
        "ws_connections": state.broadcaster.connection_count(),
        "providers": providers,
    }))
}
