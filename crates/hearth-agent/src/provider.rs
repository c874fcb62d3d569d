use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::stream::StreamEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// A single message in the conversation passed to a provider. Tool-call
/// structure for the native-tool-calling path travels through
/// `raw_messages` on `ChatRequest`, not through this plain-text shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

/// Request to an LLM provider. `raw_messages`, when set, overrides
/// `messages` — it carries the structured tool_use/tool_result content
/// blocks the tool loop builds up, which a plain `ChatMessage` can't
/// represent.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub system: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    pub tools: Vec<ToolDefinition>,
    pub raw_messages: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    ToolCalls,
    Length,
    Error,
}

#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub model: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub finish_reason: FinishReason,
    pub tool_calls: Vec<ToolCall>,
}

#[derive(Debug, thiserror::Error, Clone)]
pub enum ProviderError {
    #[error("http error: {0}")]
    Http(String),

    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl ProviderError {
    /// Whether a fresh attempt is worth making — rate limits, transient
    /// 5xx, and idempotent network failures are; auth, schema rejection,
    /// and cancellation are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Http(_) => true,
            ProviderError::RateLimited { .. } => true,
            ProviderError::Api { status, .. } => *status >= 500,
            ProviderError::Unavailable(_) => true,
            ProviderError::Parse(_) => false,
            ProviderError::Cancelled => false,
        }
    }
}

impl From<ProviderError> for hearth_core::KernelError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::Cancelled => hearth_core::KernelError::Cancelled,
            other => {
                let retryable = other.is_retryable();
                hearth_core::KernelError::Provider {
                    retryable,
                    message: other.to_string(),
                }
            }
        }
    }
}

/// Single abstraction over every LLM backend: `send` (buffered) and
/// `stream` (the uniform event sequence). A provider without native
/// streaming gets `stream` for free via the default implementation, which
/// synthesizes `Start -> Chunk* -> End` from `send`'s result.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError>;

    async fn stream(
        &self,
        req: &ChatRequest,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<(), ProviderError> {
        let resp = self.send(req).await?;
        let message_id = hearth_core::new_id();
        let _ = tx.send(StreamEvent::Start { message_id }).await;
        if !resp.content.is_empty() {
            let _ = tx
                .send(StreamEvent::Chunk { text: resp.content.clone() })
                .await;
        }
        for call in &resp.tool_calls {
            let _ = tx
                .send(StreamEvent::ToolCallComplete {
                    tool_call_id: call.id.clone(),
                    name: call.name.clone(),
                    args_json: call.input.clone(),
                })
                .await;
        }
        let _ = tx
            .send(StreamEvent::Usage {
                prompt_tokens: resp.prompt_tokens,
                completion_tokens: resp.completion_tokens,
            })
            .await;
        let _ = tx
            .send(StreamEvent::End { finish_reason: resp.finish_reason })
            .await;
        Ok(())
    }
}
