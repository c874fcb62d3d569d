//! Per-turn RAG retrieval and context block formatting (§4.5 "Retrieval for
//! a turn", §6.4 Context Block Format).

use hearth_rag::{RagStore, Tag};

const ENTITY_K: usize = 8;
const CHUNK_K: usize = 6;
const MEMORY_K: usize = 5;

/// Run the three category-filtered searches and format the results into a
/// single system message. Returns `None` when all three come back empty —
/// no context block is emitted in that case.
pub async fn build_context_block(rag: &RagStore, query: &str) -> Option<String> {
    let entities = rag.search(query, ENTITY_K, Some(Tag::Entity)).await;
    let chunks = rag.search(query, CHUNK_K, Some(Tag::Chunk)).await;
    let memories = rag.search(query, MEMORY_K, Some(Tag::Memory)).await;

    if entities.is_empty() && chunks.is_empty() && memories.is_empty() {
        return None;
    }

    let mut out = String::from("## Relevant context\n");

    if !entities.is_empty() {
        out.push_str("### Entities\n");
        for hit in &entities {
            let friendly_name = hit.payload.get("friendly_name").and_then(|v| v.as_str()).unwrap_or("unknown");
            let entity_id = hit.payload.get("entity_id").and_then(|v| v.as_str()).unwrap_or(&hit.id);
            let domain = hit.payload.get("domain").and_then(|v| v.as_str()).unwrap_or("unknown");
            let area = hit.payload.get("area").and_then(|v| v.as_str()).unwrap_or("unknown area");
            out.push_str(&format!(
                "- {friendly_name} ({entity_id}) — domain={domain}, area={area}\n"
            ));
        }
    }

    if !chunks.is_empty() {
        out.push_str("### Past conversations\n");
        for hit in &chunks {
            let session_id = hit.payload.get("session_id").and_then(|v| v.as_str()).unwrap_or("unknown");
            let truncated_id: String = session_id.chars().take(8).collect();
            let timestamp = hit.payload.get("created_at").and_then(|v| v.as_str()).unwrap_or("");
            let text = hit.payload.get("text").and_then(|v| v.as_str()).unwrap_or("");
            out.push_str(&format!("- [session {truncated_id}, {timestamp}] {text}\n"));
        }
    }

    if !memories.is_empty() {
        out.push_str("### Long-term memories\n");
        for hit in &memories {
            let category = hit.payload.get("category").and_then(|v| v.as_str()).unwrap_or("other");
            let importance = hit.payload.get("importance").and_then(|v| v.as_u64()).unwrap_or(0);
            let text = hit.payload.get("text").and_then(|v| v.as_str()).unwrap_or("");
            out.push_str(&format!("- [{category}, importance={importance}] {text}\n"));
        }
    }

    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_rag::{init_db, EmbeddingGenerator, EmbeddingProvider, EntityRecord};
    use rusqlite::Connection;

    fn fresh_rag() -> RagStore {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        let embedder = EmbeddingGenerator::new(
            EmbeddingProvider::HashBased { dimension: 16 },
            16,
            std::time::Duration::from_secs(5),
        );
        RagStore::new(conn, embedder)
    }

    #[tokio::test]
    async fn empty_index_yields_no_context_block() {
        let rag = fresh_rag();
        assert!(build_context_block(&rag, "anything").await.is_none());
    }

    #[tokio::test]
    async fn indexed_entity_appears_in_the_entities_section() {
        let rag = fresh_rag();
        rag.write_entity(&EntityRecord {
            entity_id: "light.kitchen".to_string(),
            domain: "light".to_string(),
            friendly_name: "Kitchen ceiling light".to_string(),
            area: Some("kitchen".to_string()),
            device_class: None,
            unit: None,
            attributes_digest: String::new(),
        })
        .await
        .unwrap();

        let block = build_context_block(&rag, "kitchen light").await.unwrap();
        assert!(block.contains("### Entities"));
        assert!(block.contains("light.kitchen"));
    }
}
