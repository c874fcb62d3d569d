use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A client -> server request frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReqFrame {
    #[serde(rename = "type")]
    pub frame_type: String,
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// Shape of the `error` field on a `ResFrame`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorShape {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

/// A server -> client response frame, correlated to a `ReqFrame` by `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResFrame {
    #[serde(rename = "type")]
    pub frame_type: String,
    pub id: String,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorShape>,
}

impl ResFrame {
    pub fn ok(id: impl Into<String>, payload: Value) -> Self {
        Self {
            frame_type: "res".to_string(),
            id: id.into(),
            ok: true,
            payload: Some(payload),
            error: None,
        }
    }

    pub fn err(id: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            frame_type: "res".to_string(),
            id: id.into(),
            ok: false,
            payload: None,
            error: Some(ErrorShape {
                code: code.into(),
                message: message.into(),
                retryable: None,
            }),
        }
    }

    pub fn err_retryable(
        id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
        retryable: bool,
    ) -> Self {
        Self {
            frame_type: "res".to_string(),
            id: id.into(),
            ok: false,
            payload: None,
            error: Some(ErrorShape {
                code: code.into(),
                message: message.into(),
                retryable: Some(retryable),
            }),
        }
    }
}

/// Monotonic counters carried on event frames so clients can detect gaps.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct StateVersion {
    pub seq: u64,
}

/// A server -> client unsolicited event (streaming chunks, presence, etc.).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventFrame {
    #[serde(rename = "type")]
    pub frame_type: String,
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
}

impl EventFrame {
    pub fn new(event: impl Into<String>, payload: Value, seq: u64) -> Self {
        Self {
            frame_type: "event".to_string(),
            event: event.into(),
            payload: Some(payload),
            seq: Some(seq),
        }
    }
}

/// Any frame a client may send. We only ever expect `req` frames inbound,
/// but keep this open so future frame kinds don't break `serde_json`
/// untagged matching at the call site.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InboundFrame {
    Req(ReqFrame),
    Unknown(Value),
}

impl InboundFrame {
    pub fn as_req(&self) -> Option<&ReqFrame> {
        match self {
            InboundFrame::Req(r) => Some(r),
            InboundFrame::Unknown(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn req_frame_round_trips() {
        let raw = r#"{"type":"req","id":"1","method":"chat/send","params":{"text":"hi"}}"#;
        let frame: InboundFrame = serde_json::from_str(raw).unwrap();
        let req = frame.as_req().expect("should parse as req");
        assert_eq!(req.method, "chat/send");
    }

    #[test]
    fn ok_response_omits_error_field() {
        let res = ResFrame::ok("1", serde_json::json!({"a": 1}));
        let serialized = serde_json::to_value(&res).unwrap();
        assert!(serialized.get("error").is_none());
    }
}
