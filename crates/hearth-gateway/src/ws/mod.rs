pub mod broadcast;
pub mod dispatch;
pub mod handlers;
pub mod handshake;
pub mod message;
pub mod send;
pub mod stream;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use hearth_protocol::EventFrame;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::app::AppState;

/// Lifecycle state of one connection. `AwaitingConnect` carries the nonce
/// it challenged the client with so `verify_auth` has something to compare
/// a signed response against in future auth modes; today only the mode
/// match itself is checked.
pub enum ConnState {
    AwaitingConnect { nonce: String },
    Authenticated,
    Closing,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

async fn handle_connection(socket: WebSocket, state: Arc<AppState>) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    info!(conn_id = %conn_id, "websocket connection opened");
    let (mut sink, mut stream) = socket.split();
    let mut broadcast_rx = state.broadcaster.subscribe();

    let nonce = handshake::make_nonce();
    let challenge = handshake::challenge_event(&nonce, state.next_seq());
    if sink.send(Message::Text(challenge.into())).await.is_err() {
        return;
    }

    let mut conn_state = ConnState::AwaitingConnect { nonce };
    let handshake_deadline =
        tokio::time::sleep(Duration::from_millis(state.config.gateway.handshake_timeout_ms));
    tokio::pin!(handshake_deadline);

    let mut heartbeat = tokio::time::interval(Duration::from_secs(state.config.gateway.heartbeat_interval_secs));
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if text.len() > state.config.gateway.max_payload_bytes {
                            warn!(conn_id = %conn_id, "frame exceeds max payload size, dropping connection");
                            break;
                        }
                        conn_state = message::handle(&conn_id, &text, conn_state, &mut sink, &state).await;
                        if matches!(conn_state, ConnState::Closing) {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sink.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        warn!(conn_id = %conn_id, error = %err, "websocket read error");
                        break;
                    }
                }
            }
            event = broadcast_rx.recv() => {
                match event {
                    Ok(payload) => {
                        if sink.send(Message::Text(payload.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
            _ = heartbeat.tick() => {
                if matches!(conn_state, ConnState::Authenticated) {
                    let frame = EventFrame::new("tick", serde_json::json!({}), state.next_seq());
                    let text = serde_json::to_string(&frame).unwrap_or_else(|_| "{}".to_string());
                    if sink.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
            }
            _ = &mut handshake_deadline, if matches!(conn_state, ConnState::AwaitingConnect { .. }) => {
                info!(conn_id = %conn_id, "handshake timed out, dropping connection");
                break;
            }
        }
    }

    info!(conn_id = %conn_id, "websocket connection closed");
}
