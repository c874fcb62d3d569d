use std::sync::Mutex;

use rusqlite::{params, Connection};
use tracing::{instrument, warn};

use crate::db::{decode_embedding, encode_embedding};
use crate::embedding::{dot_product, EmbeddingGenerator};
use crate::error::{RagError, Result};
use crate::types::{EntityRecord, Memory, OptimizeProgress, SearchHit, SessionChunk, Tag};
use hearth_core::new_id;

/// Owns the single shared embedding store backing all three RAG indices.
pub struct RagStore {
    db: Mutex<Connection>,
    embedder: EmbeddingGenerator,
}

impl RagStore {
    pub fn new(conn: Connection, embedder: EmbeddingGenerator) -> Self {
        Self {
            db: Mutex::new(conn),
            embedder,
        }
    }

    pub fn dimension(&self) -> usize {
        self.embedder.dimension()
    }

    #[instrument(skip(self, payload))]
    fn insert_record(
        &self,
        tag: Tag,
        id: &str,
        embedding: &[f32],
        payload: serde_json::Value,
        created_at: &str,
        expires_at: Option<&str>,
    ) -> Result<()> {
        if embedding.len() != self.embedder.dimension() {
            return Err(RagError::SchemaMismatch {
                expected: self.embedder.dimension(),
                actual: embedding.len(),
            });
        }
        let payload_json =
            serde_json::to_string(&payload).map_err(|e| RagError::EmbedError(e.to_string()))?;
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT OR REPLACE INTO rag_records (id, tag, payload_json, embedding, dim, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id,
                tag.to_string(),
                payload_json,
                encode_embedding(embedding),
                embedding.len() as i64,
                created_at,
                expires_at,
            ],
        )?;
        Ok(())
    }

    pub async fn write_entity(&self, entity: &EntityRecord) -> Result<()> {
        let text = format!(
            "{} ({}) in {}",
            entity.friendly_name,
            entity.domain,
            entity.area.as_deref().unwrap_or("unknown area")
        );
        let embedding = self.embedder.embed(&text).await?;
        let now = chrono::Utc::now().to_rfc3339();
        let payload = serde_json::to_value(entity).map_err(|e| RagError::EmbedError(e.to_string()))?;
        self.insert_record(Tag::Entity, &entity.entity_id, &embedding, payload, &now, None)
    }

    pub async fn write_chunk(&self, chunk: &SessionChunk) -> Result<()> {
        let embedding = self.embedder.embed(&chunk.text).await?;
        let payload = serde_json::to_value(chunk).map_err(|e| RagError::EmbedError(e.to_string()))?;
        self.insert_record(
            Tag::Chunk,
            &chunk.chunk_id,
            &embedding,
            payload,
            &chunk.created_at,
            None,
        )
    }

    pub async fn write_memory(&self, memory: &Memory) -> Result<()> {
        if let Some(expires) = &memory.expires_at {
            if expires.as_str() <= memory.created_at.as_str() {
                return Err(RagError::EmbedError(
                    "expires_at must be strictly greater than created_at".to_string(),
                ));
            }
        }
        let embedding = self.embedder.embed(&memory.text).await?;
        let payload = serde_json::to_value(memory).map_err(|e| RagError::EmbedError(e.to_string()))?;
        self.insert_record(
            Tag::Memory,
            &memory.memory_id,
            &embedding,
            payload,
            &memory.created_at,
            memory.expires_at.as_deref(),
        )
    }

    #[instrument(skip(self))]
    pub fn delete_memory(&self, memory_id: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        let rows = db.execute(
            "DELETE FROM rag_records WHERE id = ?1 AND tag = 'memory'",
            params![memory_id],
        )?;
        if rows == 0 {
            return Err(RagError::NotFound(memory_id.to_string()));
        }
        Ok(())
    }

    /// Embed `query_text` and rank every record matching `filter` by
    /// dot-product similarity, returning the top `k`. Embedding failures
    /// degrade to an empty result set rather than propagating — retrieval
    /// is best-effort for a turn, never a hard dependency.
    #[instrument(skip(self))]
    pub async fn search(&self, query_text: &str, k: usize, filter: Option<Tag>) -> Vec<SearchHit> {
        let query_embedding = match self.embedder.embed(query_text).await {
            Ok(e) => e,
            Err(err) => {
                warn!(error = %err, "embedding failed during search, returning empty result");
                return Vec::new();
            }
        };

        let now = chrono::Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        let (sql, tag_param) = match filter {
            Some(tag) => (
                "SELECT id, tag, payload_json, embedding FROM rag_records
                 WHERE tag = ?1 AND (expires_at IS NULL OR expires_at > ?2)",
                Some(tag.to_string()),
            ),
            None => (
                "SELECT id, tag, payload_json, embedding FROM rag_records
                 WHERE (expires_at IS NULL OR expires_at > ?2) AND (?1 IS NULL OR tag = ?1)",
                None,
            ),
        };
        let mut stmt = match db.prepare(sql) {
            Ok(s) => s,
            Err(err) => {
                warn!(error = %err, "rag search query failed");
                return Vec::new();
            }
        };
        let rows = stmt.query_map(params![tag_param, now], |row| {
            let id: String = row.get(0)?;
            let tag_str: String = row.get(1)?;
            let payload_json: String = row.get(2)?;
            let embedding_bytes: Vec<u8> = row.get(3)?;
            Ok((id, tag_str, payload_json, embedding_bytes))
        });

        let rows = match rows {
            Ok(r) => r,
            Err(err) => {
                warn!(error = %err, "rag search row mapping failed");
                return Vec::new();
            }
        };

        let mut hits = Vec::new();
        for row in rows.flatten() {
            let (id, tag_str, payload_json, embedding_bytes) = row;
            let tag: Tag = tag_str.parse().unwrap_or(Tag::Memory);
            let embedding = decode_embedding(&embedding_bytes);
            let score = dot_product(&query_embedding, &embedding);
            let payload: serde_json::Value =
                serde_json::from_str(&payload_json).unwrap_or(serde_json::Value::Null);
            hits.push(SearchHit { id, tag, score, payload });
        }

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(k);
        hits
    }

    /// Row counts per index plus the count of memories already past their
    /// `expires_at` but not yet swept by `purge_expired_memories`.
    #[instrument(skip(self))]
    pub fn stats(&self) -> Result<crate::types::RagStats> {
        let now = chrono::Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        let count_tag = |tag: Tag| -> Result<usize> {
            let n: i64 = db.query_row(
                "SELECT COUNT(*) FROM rag_records WHERE tag = ?1",
                params![tag.to_string()],
                |r| r.get(0),
            )?;
            Ok(n as usize)
        };
        let expired: i64 = db.query_row(
            "SELECT COUNT(*) FROM rag_records WHERE tag = 'memory' AND expires_at IS NOT NULL AND expires_at <= ?1",
            params![now],
            |r| r.get(0),
        )?;
        Ok(crate::types::RagStats {
            entities: count_tag(Tag::Entity)?,
            chunks: count_tag(Tag::Chunk)?,
            memories: count_tag(Tag::Memory)?,
            expired_memories: expired as usize,
            dimension: self.embedder.dimension(),
        })
    }

    /// List the most recent (by `created_at`) non-expired records for `tag`,
    /// without an embedding query — backs the plain browse methods
    /// (`rag/memories`, `rag/sessions`, `rag/identity`) that don't take a
    /// search string.
    #[instrument(skip(self))]
    pub fn list_by_tag(&self, tag: Tag, limit: usize) -> Result<Vec<SearchHit>> {
        let now = chrono::Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, payload_json FROM rag_records
             WHERE tag = ?1 AND (expires_at IS NULL OR expires_at > ?2)
             ORDER BY created_at DESC LIMIT ?3",
        )?;
        let rows = stmt.query_map(params![tag.to_string(), now, limit as i64], |row| {
            let id: String = row.get(0)?;
            let payload_json: String = row.get(1)?;
            Ok((id, payload_json))
        })?;
        let mut out = Vec::new();
        for row in rows.flatten() {
            let (id, payload_json) = row;
            let payload: serde_json::Value =
                serde_json::from_str(&payload_json).unwrap_or(serde_json::Value::Null);
            out.push(SearchHit { id, tag, score: 0.0, payload });
        }
        Ok(out)
    }

    /// Physically remove memories whose `expires_at` has passed. Run
    /// periodically by a background sweep, independent of `search`'s
    /// logical filtering (so expired rows don't linger indefinitely).
    #[instrument(skip(self))]
    pub fn purge_expired_memories(&self) -> Result<usize> {
        let now = chrono::Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        let count = db.execute(
            "DELETE FROM rag_records WHERE tag = 'memory' AND expires_at IS NOT NULL AND expires_at <= ?1",
            params![now],
        )?;
        Ok(count)
    }

    /// Delete every chunk keyed to `session_id` — the cascade a session
    /// delete performs alongside its messages/attachments, so no chunk
    /// embedding survives its owning session.
    #[instrument(skip(self))]
    pub fn delete_chunks_for_session(&self, session_id: &str) -> Result<usize> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare("SELECT id, payload_json FROM rag_records WHERE tag = 'chunk'")?;
        let rows = stmt.query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))?;
        let mut ids = Vec::new();
        for row in rows.flatten() {
            let (id, payload_json) = row;
            let chunk: SessionChunk = match serde_json::from_str(&payload_json) {
                Ok(c) => c,
                Err(_) => continue,
            };
            if chunk.session_id == session_id {
                ids.push(id);
            }
        }
        let mut deleted = 0;
        for id in &ids {
            deleted += db.execute("DELETE FROM rag_records WHERE id = ?1", params![id])?;
        }
        Ok(deleted)
    }

    /// Consolidate a session's non-optimized chunks into one summary chunk.
    /// `summarize` performs the actual LLM-driven consolidation (injected so
    /// this crate doesn't depend on the provider adapter); the replace is
    /// atomic — the old chunks are deleted in the same transaction the new
    /// one is inserted in, so a crash mid-optimize never loses data, only
    /// redoes the pass (`force=false` skips already-consolidated chunks).
    #[instrument(skip(self, summarize))]
    pub async fn optimize_session<F, Fut>(
        &self,
        session_id: &str,
        force: bool,
        summarize: F,
        progress: &tokio::sync::mpsc::Sender<OptimizeProgress>,
    ) -> Result<()>
    where
        F: FnOnce(Vec<String>) -> Fut,
        Fut: std::future::Future<Output = String>,
    {
        let _ = progress
            .send(OptimizeProgress {
                phase: "scan".to_string(),
                message: format!("scanning chunks for session {session_id}"),
                progress_pct: 10,
            })
            .await;

        let rows: Vec<(String, String, bool)> = {
            let db = self.db.lock().unwrap();
            let mut stmt = db.prepare(
                "SELECT id, payload_json, payload_json LIKE '%\"optimized\":true%'
                 FROM rag_records WHERE tag = 'chunk'",
            )?;
            let mapped = stmt.query_map([], |r| {
                Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?, r.get::<_, bool>(2)?))
            })?;
            let mut out = Vec::new();
            for row in mapped {
                let (id, payload_json, optimized_guess) = row?;
                let chunk: SessionChunk = match serde_json::from_str(&payload_json) {
                    Ok(c) => c,
                    Err(_) => continue,
                };
                if chunk.session_id != session_id {
                    continue;
                }
                if chunk.optimized && !force {
                    continue;
                }
                out.push((id, chunk.text, optimized_guess));
            }
            out
        };

        if rows.is_empty() {
            let _ = progress
                .send(OptimizeProgress {
                    phase: "done".to_string(),
                    message: "nothing to optimize".to_string(),
                    progress_pct: 100,
                })
                .await;
            return Ok(());
        }

        let texts: Vec<String> = rows.iter().map(|(_, t, _)| t.clone()).collect();
        let ids: Vec<String> = rows.iter().map(|(id, _, _)| id.clone()).collect();

        let _ = progress
            .send(OptimizeProgress {
                phase: "summarize".to_string(),
                message: format!("consolidating {} chunks", texts.len()),
                progress_pct: 50,
            })
            .await;

        let summary_text = summarize(texts).await;
        let summary_embedding = self.embedder.embed(&summary_text).await?;
        let now = chrono::Utc::now().to_rfc3339();
        let consolidated = SessionChunk {
            chunk_id: new_id(),
            session_id: session_id.to_string(),
            start_msg: 0,
            end_msg: 0,
            text: summary_text,
            text_length: 0,
            optimized: true,
            created_at: now.clone(),
        };
        let payload = serde_json::to_value(&consolidated).map_err(|e| RagError::EmbedError(e.to_string()))?;
        let payload_json =
            serde_json::to_string(&payload).map_err(|e| RagError::EmbedError(e.to_string()))?;

        {
            let mut db = self.db.lock().unwrap();
            let tx = db.transaction()?;
            for id in &ids {
                tx.execute("DELETE FROM rag_records WHERE id = ?1", params![id])?;
            }
            tx.execute(
                "INSERT INTO rag_records (id, tag, payload_json, embedding, dim, created_at, expires_at)
                 VALUES (?1, 'chunk', ?2, ?3, ?4, ?5, NULL)",
                params![
                    consolidated.chunk_id,
                    payload_json,
                    encode_embedding(&summary_embedding),
                    summary_embedding.len() as i64,
                    now,
                ],
            )?;
            tx.commit()?;
        }

        let _ = progress
            .send(OptimizeProgress {
                phase: "done".to_string(),
                message: "optimization committed".to_string(),
                progress_pct: 100,
            })
            .await;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn record_count(&self, tag: Tag) -> usize {
        let db = self.db.lock().unwrap();
        db.query_row(
            "SELECT COUNT(*) FROM rag_records WHERE tag = ?1",
            params![tag.to_string()],
            |r| r.get::<_, i64>(0),
        )
        .unwrap_or(0) as usize
    }
}

/// Build a chunk spanning `[start_msg, end_msg]` from its rendered text.
/// Default window: the assistant turn plus its preceding user turn.
pub fn build_session_chunk(session_id: &str, start_msg: u32, end_msg: u32, text: String) -> SessionChunk {
    SessionChunk {
        chunk_id: new_id(),
        session_id: session_id.to_string(),
        start_msg,
        end_msg,
        text_length: text.chars().count() as u32,
        text,
        optimized: false,
        created_at: chrono::Utc::now().to_rfc3339(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use crate::embedding::EmbeddingProvider;
    use crate::types::{MemoryCategory, MemorySource};

    fn fresh_store(dim: usize) -> RagStore {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        let embedder = EmbeddingGenerator::new(
            EmbeddingProvider::HashBased { dimension: dim },
            dim,
            std::time::Duration::from_secs(5),
        );
        RagStore::new(conn, embedder)
    }

    #[tokio::test]
    async fn mismatched_dimension_is_rejected() {
        let store = fresh_store(16);
        let bad_embedding = vec![0.0_f32; 8];
        let err = store.insert_record(
            Tag::Memory,
            "m1",
            &bad_embedding,
            serde_json::json!({}),
            "2026-01-01T00:00:00Z",
            None,
        );
        assert!(matches!(err, Err(RagError::SchemaMismatch { .. })));
    }

    #[tokio::test]
    async fn search_excludes_expired_memories() {
        let store = fresh_store(16);
        let expired = Memory {
            memory_id: new_id(),
            text: "milk expires soon".to_string(),
            category: MemoryCategory::Fact,
            source: MemorySource::User,
            importance: 5,
            created_at: "2020-01-01T00:00:00Z".to_string(),
            expires_at: Some("2020-01-02T00:00:00Z".to_string()),
        };
        store.write_memory(&expired).await.unwrap();
        let hits = store.search("milk", 5, Some(Tag::Memory)).await;
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn search_returns_top_k_sorted_by_score() {
        let store = fresh_store(16);
        for text in ["kitchen light", "living room light", "garage door"] {
            let mem = Memory {
                memory_id: new_id(),
                text: text.to_string(),
                category: MemoryCategory::Observation,
                source: MemorySource::Auto,
                importance: 3,
                created_at: chrono::Utc::now().to_rfc3339(),
                expires_at: None,
            };
            store.write_memory(&mem).await.unwrap();
        }
        let hits = store.search("kitchen light", 2, Some(Tag::Memory)).await;
        assert_eq!(hits.len(), 2);
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn stats_counts_records_per_tag() {
        let store = fresh_store(16);
        let mem = Memory {
            memory_id: new_id(),
            text: "kettle is loud".to_string(),
            category: MemoryCategory::Observation,
            source: MemorySource::Auto,
            importance: 2,
            created_at: chrono::Utc::now().to_rfc3339(),
            expires_at: None,
        };
        store.write_memory(&mem).await.unwrap();
        let chunk = build_session_chunk("s1", 0, 1, "hi".to_string());
        store.write_chunk(&chunk).await.unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.memories, 1);
        assert_eq!(stats.chunks, 1);
        assert_eq!(stats.entities, 0);
        assert_eq!(stats.dimension, 16);
    }

    #[tokio::test]
    async fn list_by_tag_excludes_expired_and_respects_limit() {
        let store = fresh_store(16);
        let expired = Memory {
            memory_id: new_id(),
            text: "old milk".to_string(),
            category: MemoryCategory::Fact,
            source: MemorySource::User,
            importance: 1,
            created_at: "2020-01-01T00:00:00Z".to_string(),
            expires_at: Some("2020-01-02T00:00:00Z".to_string()),
        };
        store.write_memory(&expired).await.unwrap();
        for text in ["fact a", "fact b", "fact c"] {
            let mem = Memory {
                memory_id: new_id(),
                text: text.to_string(),
                category: MemoryCategory::Fact,
                source: MemorySource::User,
                importance: 4,
                created_at: chrono::Utc::now().to_rfc3339(),
                expires_at: None,
            };
            store.write_memory(&mem).await.unwrap();
        }

        let listed = store.list_by_tag(Tag::Memory, 2).unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|h| h.payload["text"] != "old milk"));
    }

    #[tokio::test]
    async fn delete_chunks_for_session_only_removes_that_sessions_chunks() {
        let store = fresh_store(16);
        store.write_chunk(&build_session_chunk("s1", 0, 1, "s1 talk".to_string())).await.unwrap();
        store.write_chunk(&build_session_chunk("s1", 2, 3, "s1 more talk".to_string())).await.unwrap();
        store.write_chunk(&build_session_chunk("s2", 0, 1, "s2 talk".to_string())).await.unwrap();

        let deleted = store.delete_chunks_for_session("s1").unwrap();
        assert_eq!(deleted, 2);

        let stats = store.stats().unwrap();
        assert_eq!(stats.chunks, 1);
        let remaining = store.list_by_tag(Tag::Chunk, 10).unwrap();
        assert_eq!(remaining[0].payload["session_id"], "s2");
    }

    #[tokio::test]
    async fn optimize_is_idempotent_without_force() {
        let store = fresh_store(16);
        let chunk = build_session_chunk("s1", 0, 1, "hello there".to_string());
        store.write_chunk(&chunk).await.unwrap();
        let (tx, _rx) = tokio::sync::mpsc::channel(8);
        store
            .optimize_session("s1", false, |texts| async move { texts.join(" | ") }, &tx)
            .await
            .unwrap();
        assert_eq!(store.record_count(Tag::Chunk), 1);

        let (tx2, _rx2) = tokio::sync::mpsc::channel(8);
        store
            .optimize_session("s1", false, |texts| async move { texts.join(" | ") }, &tx2)
            .await
            .unwrap();
        assert_eq!(store.record_count(Tag::Chunk), 1);
    }
}
