use std::sync::Arc;

use hearth_protocol::{ConnectParams, InboundFrame, ResFrame};

use crate::app::AppState;
use crate::ws::send::WsSink;
use crate::ws::{handshake, ConnState};

/// Parse one inbound text frame and advance the connection's state machine.
pub async fn handle(
    conn_id: &str,
    text: &str,
    conn_state: ConnState,
    tx: &mut WsSink,
    state: &Arc<AppState>,
) -> ConnState {
    let frame: InboundFrame = match serde_json::from_str(text) {
        Ok(f) => f,
        Err(err) => {
            tracing::warn!(conn_id, error = %err, "malformed frame");
            return conn_state;
        }
    };
    let Some(req) = frame.as_req() else {
        return conn_state;
    };

    match conn_state {
        ConnState::AwaitingConnect { nonce } => handle_auth(req, nonce, tx, state).await,
        ConnState::Authenticated => {
            if req.method == hearth_protocol::methods::CHAT_SEND_STREAM {
                crate::ws::stream::handle(req, tx, state).await;
            } else {
                let res = crate::ws::dispatch::route(&req.method, &req.params, &req.id, state).await;
                let _ = crate::ws::send::json(tx, &res).await;
            }
            ConnState::Authenticated
        }
        ConnState::Closing => ConnState::Closing,
    }
}

async fn handle_auth(
    req: &hearth_protocol::ReqFrame,
    _nonce: String,
    tx: &mut WsSink,
    state: &Arc<AppState>,
) -> ConnState {
    if req.method != hearth_protocol::methods::CONNECT {
        let res = ResFrame::err(&req.id, "UNAUTHENTICATED", "connect required before any other method");
        let _ = crate::ws::send::json(tx, &res).await;
        return ConnState::Closing;
    }

    let params: ConnectParams = match serde_json::from_value(req.params.clone()) {
        Ok(p) => p,
        Err(err) => {
            let res = ResFrame::err(&req.id, "INVALID_PARAMS", err.to_string());
            let _ = crate::ws::send::json(tx, &res).await;
            return ConnState::Closing;
        }
    };

    if let Err(err) = handshake::verify_auth(&params, &state.config.gateway.auth) {
        let res = ResFrame::err(&req.id, "UNAUTHENTICATED", err);
        let _ = crate::ws::send::json(tx, &res).await;
        return ConnState::Closing;
    }

    let hello = handshake::hello_ok_payload(state.config.gateway.max_payload_bytes);
    let payload = serde_json::to_value(&hello).unwrap_or(serde_json::Value::Null);
    let res = ResFrame::ok(&req.id, payload);
    let _ = crate::ws::send::json(tx, &res).await;
    ConnState::Authenticated
}
