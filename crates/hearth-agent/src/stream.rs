use crate::provider::FinishReason;

/// Uniform event union every backend's `stream` emits, regardless of how
/// the wire protocol underneath shapes it. This is the one contract the UI
/// and the tool loop both read against.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// Provider-assigned message id, first event of every stream.
    Start { message_id: String },

    /// A delta of assistant text.
    Chunk { text: String },

    /// Internal reasoning content (extended thinking on providers that
    /// support it). Never shown to end users directly; allowed but not
    /// required by any backend.
    Thinking { text: String },

    /// Possibly-partial tool-call arguments as they stream in. Buffered by
    /// the backend and not forwarded further until `ToolCallComplete`.
    ToolCallRequest {
        tool_call_id: String,
        name: String,
        args_json: serde_json::Value,
    },

    /// Finalized tool call — exactly one per `tool_call_id`, emitted before `End`.
    ToolCallComplete {
        tool_call_id: String,
        name: String,
        args_json: serde_json::Value,
    },

    Usage { prompt_tokens: u32, completion_tokens: u32 },

    End { finish_reason: FinishReason },

    Error { kind: String, message: String, retryable: bool },
}

/// Parse a single SSE line into its `event:`/`data:` component. Shared by
/// every backend's stream parser — each backend still owns interpreting
/// what the `data:` payload means.
#[derive(Debug, PartialEq, Eq)]
pub enum SseParsed {
    Event(String),
    Data(String),
}

pub fn parse_sse_line(line: &str) -> Option<SseParsed> {
    if let Some(event_type) = line.strip_prefix("event: ") {
        Some(SseParsed::Event(event_type.to_string()))
    } else {
        line.strip_prefix("data: ").map(|data| SseParsed::Data(data.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_event_and_data_lines() {
        assert_eq!(
            parse_sse_line("event: message_start"),
            Some(SseParsed::Event("message_start".to_string()))
        );
        assert_eq!(
            parse_sse_line(r#"data: {"type":"ping"}"#),
            Some(SseParsed::Data(r#"{"type":"ping"}"#.to_string()))
        );
    }

    #[test]
    fn ignores_blank_lines() {
        assert!(parse_sse_line("").is_none());
    }
}
