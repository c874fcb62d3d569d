use std::sync::Arc;

use hearth_agent::TurnEvent;
use hearth_protocol::{EventFrame, ReqFrame};
use serde_json::json;
use tracing::warn;

use crate::app::AppState;
use crate::ws::send::WsSink;

#[derive(serde::Deserialize)]
struct SendStreamParams {
    session_id: String,
    message: String,
    provider: String,
    #[serde(default)]
    model: String,
}

/// Run `chat/send_stream`: push every `TurnEvent` as its own event frame as
/// the turn progresses. `EventFrame` itself carries only a sequence number,
/// not a request id, so every payload here embeds `request_id` for the UI
/// to correlate chunks back to the call that started them.
pub async fn handle(req: &ReqFrame, tx: &mut WsSink, state: &Arc<AppState>) {
    let params: SendStreamParams = match serde_json::from_value(req.params.clone()) {
        Ok(p) => p,
        Err(err) => {
            send_stream_end(tx, state, &req.id, false, Some(err.to_string())).await;
            return;
        }
    };

    let echo = EventFrame::new(
        "user_message",
        json!({ "request_id": req.id, "session_id": params.session_id, "content": params.message }),
        state.next_seq(),
    );
    let _ = crate::ws::send::json(tx, &echo).await;

    let (events_tx, mut events_rx) = tokio::sync::mpsc::channel(64);
    let request_id = req.id.clone();
    let turn_state = state.clone();
    let turn = tokio::spawn(async move {
        turn_state
            .orchestrator
            .handle_turn(&params.session_id, &params.message, &params.provider, &params.model, events_tx)
            .await
    });

    while let Some(event) = events_rx.recv().await {
        let frame = to_event_frame(&request_id, event, state.next_seq());
        if crate::ws::send::json(tx, &frame).await.is_err() {
            break;
        }
    }

    match turn.await {
        // The real `stream_end` already flowed through `events_rx` above.
        Ok(Ok(_outcome)) => {}
        Ok(Err(err)) => send_stream_end(tx, state, &request_id, false, Some(err.to_string())).await,
        Err(join_err) => warn!(error = %join_err, "chat/send_stream turn task did not finish cleanly"),
    }
}

async fn send_stream_end(tx: &mut WsSink, state: &Arc<AppState>, request_id: &str, success: bool, error: Option<String>) {
    let frame = EventFrame::new(
        "stream_end",
        json!({ "request_id": request_id, "success": success, "error": error }),
        state.next_seq(),
    );
    let _ = crate::ws::send::json(tx, &frame).await;
}

fn to_event_frame(request_id: &str, event: TurnEvent, seq: u64) -> EventFrame {
    match event {
        TurnEvent::StreamStart { message_id } => {
            EventFrame::new("stream_start", json!({ "request_id": request_id, "message_id": message_id }), seq)
        }
        TurnEvent::StreamChunk { message_id, text } => EventFrame::new(
            "stream_chunk",
            json!({ "request_id": request_id, "message_id": message_id, "chunk": text }),
            seq,
        ),
        TurnEvent::ToolCall { name, args } => {
            EventFrame::new("tool_call", json!({ "request_id": request_id, "name": name, "args": args }), seq)
        }
        TurnEvent::ToolResult { name, result, is_error } => EventFrame::new(
            "tool_result",
            json!({ "request_id": request_id, "name": name, "result": result, "is_error": is_error }),
            seq,
        ),
        TurnEvent::StreamEnd { message_id, success, error, truncated } => EventFrame::new(
            "stream_end",
            json!({
                "request_id": request_id,
                "message_id": message_id,
                "success": success,
                "error": error,
                "truncated": truncated,
            }),
            seq,
        ),
    }
}
