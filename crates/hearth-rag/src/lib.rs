pub mod db;
pub mod embedding;
pub mod error;
pub mod store;
pub mod types;

pub use db::init_db;
pub use embedding::{cosine_similarity, dot_product, EmbeddingGenerator, EmbeddingProvider};
pub use error::RagError;
pub use store::{build_session_chunk, RagStore};
pub use types::{
    EntityRecord, Memory, MemoryCategory, MemorySource, OptimizeProgress, RagStats, SearchHit,
    SessionChunk, Tag,
};
