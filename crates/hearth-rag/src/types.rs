use serde::{Deserialize, Serialize};

/// Which of the three indices a record belongs to. All three share one
/// embedding store; `tag` is what separates them at query time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tag {
    Entity,
    Chunk,
    Memory,
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Tag::Entity => "entity",
            Tag::Chunk => "chunk",
            Tag::Memory => "memory",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Tag {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "entity" => Ok(Tag::Entity),
            "chunk" => Ok(Tag::Chunk),
            "memory" => Ok(Tag::Memory),
            other => Err(format!("unknown tag: {other}")),
        }
    }
}

/// A control-plane entity snapshot, produced by the RAG indexer from the
/// external registry and refreshed on registry-change events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRecord {
    pub entity_id: String,
    pub domain: String,
    pub friendly_name: String,
    pub area: Option<String>,
    pub device_class: Option<String>,
    pub unit: Option<String>,
    pub attributes_digest: String,
}

/// A chunk spans a contiguous message window — by default one assistant
/// turn plus its preceding user turn. Chunks are immutable once written;
/// only the optimizer replaces them, in the same transaction that marks the
/// consolidated result `optimized=true`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionChunk {
    pub chunk_id: String,
    pub session_id: String,
    pub start_msg: u32,
    pub end_msg: u32,
    pub text: String,
    pub text_length: u32,
    pub optimized: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryCategory {
    Fact,
    Preference,
    Decision,
    Entity,
    Observation,
    Other,
}

impl std::fmt::Display for MemoryCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MemoryCategory::Fact => "fact",
            MemoryCategory::Preference => "preference",
            MemoryCategory::Decision => "decision",
            MemoryCategory::Entity => "entity",
            MemoryCategory::Observation => "observation",
            MemoryCategory::Other => "other",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for MemoryCategory {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fact" => Ok(MemoryCategory::Fact),
            "preference" => Ok(MemoryCategory::Preference),
            "decision" => Ok(MemoryCategory::Decision),
            "entity" => Ok(MemoryCategory::Entity),
            "observation" => Ok(MemoryCategory::Observation),
            "other" => Ok(MemoryCategory::Other),
            other => Err(format!("unknown memory category: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemorySource {
    User,
    Agent,
    Auto,
}

impl std::fmt::Display for MemorySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MemorySource::User => "user",
            MemorySource::Agent => "agent",
            MemorySource::Auto => "auto",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for MemorySource {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(MemorySource::User),
            "agent" => Ok(MemorySource::Agent),
            "auto" => Ok(MemorySource::Auto),
            other => Err(format!("unknown memory source: {other}")),
        }
    }
}

/// A single remembered fact, preference, decision, or observation.
/// `importance` is on a 1-10 scale; memories past `expires_at` are filtered
/// from retrieval and physically purged by a periodic sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub memory_id: String,
    pub text: String,
    pub category: MemoryCategory,
    pub source: MemorySource,
    pub importance: u8,
    pub created_at: String,
    pub expires_at: Option<String>,
}

/// One hit from `search`, carrying the similarity score alongside the
/// record's JSON payload (caller deserializes to the concrete type matching
/// the `Tag` filter it searched with).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub tag: Tag,
    pub score: f32,
    pub payload: serde_json::Value,
}

/// Progress event emitted during the offline optimize operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizeProgress {
    pub phase: String,
    pub message: String,
    pub progress_pct: u8,
}

/// Row counts per index, surfaced on the `rag/stats` method.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RagStats {
    pub entities: usize,
    pub chunks: usize,
    pub memories: usize,
    pub expired_memories: usize,
    pub dimension: usize,
}
