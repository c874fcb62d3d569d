use uuid::Uuid;

use hearth_core::config::{AuthConfig, AuthMode};
use hearth_protocol::{
    AuthPayload, ClientPolicy, ConnectParams, EventFrame, HelloOk, RateLimitPolicy, ServerFeatures,
    ServerInfo, PROTOCOL_VERSION,
};

pub fn make_nonce() -> String {
    Uuid::new_v4().to_string().replace('-', "")
}

pub fn challenge_event(nonce: &str, seq: u64) -> String {
    let frame = EventFrame::new(
        "connect.challenge",
        serde_json::json!({ "nonce": nonce }),
        seq,
    );
    serde_json::to_string(&frame).unwrap_or_else(|_| "{}".to_string())
}

/// Check `params.auth` against the configured mode. `TailscaleWhois` and
/// `TrustedProxy` are accepted on the wire (see `AuthPayload`'s own
/// doc comment) but this installation has nowhere to route them yet.
pub fn verify_auth(params: &ConnectParams, auth: &AuthConfig) -> Result<(), String> {
    match auth.mode {
        AuthMode::None => Ok(()),
        AuthMode::Token => match &params.auth {
            AuthPayload::Token { token } => {
                if Some(token.as_str()) == auth.token.as_deref() {
                    Ok(())
                } else {
                    Err("invalid token".to_string())
                }
            }
            _ => Err("token auth required".to_string()),
        },
        AuthMode::Password => match &params.auth {
            AuthPayload::Password { password } => {
                if Some(password.as_str()) == auth.password.as_deref() {
                    Ok(())
                } else {
                    Err("invalid password".to_string())
                }
            }
            _ => Err("password auth required".to_string()),
        },
    }
}

pub fn hello_ok_payload(max_payload_bytes: usize) -> HelloOk {
    HelloOk {
        protocol: PROTOCOL_VERSION,
        server: ServerInfo {
            name: "hearth".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            node_id: "primary".to_string(),
        },
        features: ServerFeatures {
            streaming: true,
            prompt_caching: false,
            scheduling: true,
        },
        snapshot: serde_json::Value::Object(Default::default()),
        policy: ClientPolicy {
            max_message_size: max_payload_bytes,
            rate_limit: Some(RateLimitPolicy { requests_per_minute: 120 }),
        },
    }
}
