//! Retrieval tool: `search_context`, spanning entities, session chunks, and
//! memories alike (unlike `recall`, which is scoped to the memory tag).

use std::sync::Arc;

use async_trait::async_trait;
use hearth_rag::RagStore;

use super::{Tool, ToolResult};

pub struct SearchContextTool {
    rag: Arc<RagStore>,
}

impl SearchContextTool {
    pub fn new(rag: Arc<RagStore>) -> Self {
        Self { rag }
    }
}

#[async_trait]
impl Tool for SearchContextTool {
    fn name(&self) -> &str {
        "search_context"
    }

    fn description(&self) -> &str {
        "Search indexed context (entities, past conversation summaries, memories) for relevant background."
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
        let hits = self.rag.search(query, k, None).await;
        ToolResult::success(serde_json::to_string(&hits).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_rag::{init_db, EntityRecord, EmbeddingGenerator, EmbeddingProvider};
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
    async fn search_context_finds_indexed_entity() {
        let rag = fresh_rag();
        rag.write_entity(&EntityRecord {
            entity_id: "light.kitchen".to_string(),
            domain: "light".to_string(),
            friendly_name: "Kitchen ceiling light".to_string(),
            area: Some("kitchen".to_string()),
            device_class: None,
            unit: None,
            attributes_digest: "warm white dimmable".to_string(),
        })
        .await
        .unwrap();

        let tool = SearchContextTool::new(rag);
        let result = tool
            .execute(serde_json::json!({"query": "kitchen light", "k": 3}))
            .await;
        assert!(!result.is_error);
        assert!(result.content.contains("light.kitchen"));
    }

    #[tokio::test]
    async fn search_context_missing_query_is_error() {
        let rag = fresh_rag();
        let tool = SearchContextTool::new(rag);
        let result = tool.execute(serde_json::json!({})).await;
        assert!(result.is_error);
    }
}
