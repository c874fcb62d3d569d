//! Memory tools: `remember`, `recall`, `forget`.

use std::sync::Arc;

use async_trait::async_trait;
use hearth_core::new_id;
use hearth_rag::{Memory, MemoryCategory, MemorySource, RagStore, Tag};

use super::{Tool, ToolResult};

pub struct RememberTool {
    rag: Arc<RagStore>,
}

impl RememberTool {
    pub fn new(rag: Arc<RagStore>) -> Self {
        Self { rag }
    }
}

#[async_trait]
impl Tool for RememberTool {
    fn name(&self) -> &str {
        "remember"
    }

    fn description(&self) -> &str {
        "Persist a long-term memory so it can be recalled in future conversations."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "text": { "type": "string" },
                "category": {
                    "type": "string",
                    "enum": ["fact", "preference", "decision", "entity", "observation", "other"]
                },
                "importance": { "type": "integer", "minimum": 1, "maximum": 10 },
                "ttl_days": { "type": "integer", "description": "optional expiry, in days from now" }
            },
            "required": ["text", "category", "importance"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let text = match input.get("text").and_then(|v| v.as_str()) {
            Some(v) => v.to_string(),
            None => return ToolResult::error("missing required parameter: text"),
        };
        let category: MemoryCategory = match input
            .get("category")
            .and_then(|v| v.as_str())
            .map(|s| s.parse())
        {
            Some(Ok(c)) => c,
            Some(Err(_)) => return ToolResult::error("invalid category"),
            None => return ToolResult::error("missing required parameter: category"),
        };
        let importance = match input.get("importance").and_then(|v| v.as_u64()) {
            Some(v) => v.clamp(1, 10) as u8,
            None => return ToolResult::error("missing required parameter: importance"),
        };
        let created_at = chrono::Utc::now();
        let expires_at = input
            .get("ttl_days")
            .and_then(|v| v.as_i64())
            .map(|days| (created_at + chrono::Duration::days(days)).to_rfc3339());

        let memory = Memory {
            memory_id: new_id(),
            text,
            category,
            source: MemorySource::Agent,
            importance,
            created_at: created_at.to_rfc3339(),
            expires_at,
        };

        match self.rag.write_memory(&memory).await {
            Ok(()) => ToolResult::success(serde_json::json!({"memory_id": memory.memory_id}).to_string()),
            Err(e) => ToolResult::error(e.to_string()),
        }
    }
}

pub struct RecallTool {
    rag: Arc<RagStore>,
}

impl RecallTool {
    pub fn new(rag: Arc<RagStore>) -> Self {
        Self { rag }
    }
}

#[async_trait]
impl Tool for RecallTool {
    fn name(&self) -> &str {
        "recall"
    }

    fn description(&self) -> &str {
        "Search long-term memories relevant to a query."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string" },
                "k": { "type": "integer", "default": 5 }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let query = match input.get("query").and_then(|v| v.as_str()) {
            Some(v) => v,
            None => return ToolResult::error("missing required parameter: query"),
        };
        let k = input.get("k").and_then(|v| v.as_u64()).unwrap_or(5) as usize;
        let hits = self.rag.search(query, k, Some(Tag::Memory)).await;
        ToolResult::success(serde_json::to_string(&hits).unwrap_or_default())
    }
}

pub struct ForgetTool {
    rag: Arc<RagStore>,
}

impl ForgetTool {
    pub fn new(rag: Arc<RagStore>) -> Self {
        Self { rag }
    }
}

#[async_trait]
impl Tool for ForgetTool {
    fn name(&self) -> &str {
        "forget"
    }

    fn description(&self) -> &str {
        "Delete a long-term memory by id."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "memory_id": { "type": "string" }
            },
            "required": ["memory_id"]
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let memory_id = match input.get("memory_id").and_then(|v| v.as_str()) {
            Some(v) => v,
            None => return ToolResult::error("missing required parameter: memory_id"),
        };
        match self.rag.delete_memory(memory_id) {
            Ok(()) => ToolResult::success(serde_json::json!({"ok": true}).to_string()),
            Err(e) => ToolResult::error(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_rag::{init_db, EmbeddingGenerator, EmbeddingProvider};
    use rusqlite::Connection;

    fn fresh_rag() -> Arc<RagStore> {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        let embedder = EmbeddingGenerator::new(
            EmbeddingProvider::HashBased { dimension: 16 },
            16,
            std::time::Duration::from_secs(5),
        );
        Arc::new(RagStore::new(conn, embedder))
    }

    #[tokio::test]
    async fn remember_then_recall_round_trips() {
        let rag = fresh_rag();
        let remember = RememberTool::new(rag.clone());
        let result = remember
            .execute(serde_json::json!({
                "text": "user prefers Celsius",
                "category": "preference",
                "importance": 7
            }))
            .await;
        assert!(!result.is_error);

        let recall = RecallTool::new(rag);
        let result = recall
            .execute(serde_json::json!({"query": "temperature units", "k": 3}))
            .await;
        assert!(!result.is_error);
        assert!(result.content.contains("Celsius"));
    }

    #[tokio::test]
    async fn forget_unknown_memory_is_error() {
        let rag = fresh_rag();
        let forget = ForgetTool::new(rag);
        let result = forget
            .execute(serde_json::json!({"memory_id": "does-not-exist"}))
            .await;
        assert!(result.is_error);
    }
}
