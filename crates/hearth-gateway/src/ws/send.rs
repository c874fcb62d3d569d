use axum::extract::ws::Message;
use futures_util::stream::SplitSink;
use futures_util::SinkExt;
use serde::Serialize;

use axum::extract::ws::WebSocket;

pub type WsSink = SplitSink<WebSocket, Message>;

/// Serialize `payload` and send it as a single text frame.
pub async fn json<T: Serialize>(tx: &mut WsSink, payload: &T) -> Result<(), axum::Error> {
    let text = serde_json::to_string(payload).unwrap_or_else(|_| "{}".to_string());
    tx.send(Message::Text(text.into())).await
}
