//! Embedding generation backing the RAG subsystem's write and search paths.
//!
//! Falls back to a deterministic hash-based embedder when no embedding API
//! key is configured, so the system degrades to something testable instead
//! of failing outright.

use tracing::{debug, warn};

use crate::error::{RagError, Result};

pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
const OPENAI_API_URL: &str = "https://api.openai.com/v1/embeddings";
const DEFAULT_MODEL: &str = "text-embedding-3-small";

/// Embedding backend configuration.
#[derive(Debug, Clone)]
pub enum EmbeddingProvider {
    OpenAi {
        api_key: String,
        model: String,
    },
    /// Deterministic fallback used when no embedding API key is configured.
    HashBased { dimension: usize },
}

impl EmbeddingProvider {
    /// Build from environment, falling back to hashing when unset.
    pub fn from_env(dimension: usize) -> Self {
        if let Ok(api_key) = std::env::var(OPENAI_API_KEY_ENV) {
            debug!("using OpenAI embedding provider");
            return Self::OpenAi {
                api_key,
                model: DEFAULT_MODEL.to_string(),
            };
        }
        warn!("no embedding API key found, using hash-based fallback");
        Self::HashBased { dimension }
    }

    pub fn is_real(&self) -> bool {
        !matches!(self, Self::HashBased { .. })
    }
}

/// Generates embeddings for text, either via a real API call or the
/// deterministic fallback.
#[derive(Clone)]
pub struct EmbeddingGenerator {
    provider: EmbeddingProvider,
    dimension: usize,
    client: reqwest::Client,
    timeout: std::time::Duration,
}

impl EmbeddingGenerator {
    pub fn new(provider: EmbeddingProvider, dimension: usize, timeout: std::time::Duration) -> Self {
        Self {
            provider,
            dimension,
            client: reqwest::Client::new(),
            timeout,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn is_real(&self) -> bool {
        self.provider.is_real()
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        match &self.provider {
            EmbeddingProvider::OpenAi { api_key, model } => {
                self.embed_openai(text, api_key, model).await
            }
            EmbeddingProvider::HashBased { dimension } => Ok(hash_based_embedding(text, *dimension)),
        }
    }

    pub async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        match &self.provider {
            EmbeddingProvider::OpenAi { api_key, model } => {
                self.embed_batch_openai(texts, api_key, model).await
            }
            EmbeddingProvider::HashBased { dimension } => Ok(texts
                .iter()
                .map(|t| hash_based_embedding(t, *dimension))
                .collect()),
        }
    }

    async fn embed_openai(&self, text: &str, api_key: &str, model: &str) -> Result<Vec<f32>> {
        let response = self
            .client
            .post(OPENAI_API_URL)
            .timeout(self.timeout)
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&serde_json::json!({ "model": model, "input": text }))
            .send()
            .await
            .map_err(|e| RagError::EmbedError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RagError::EmbedError(format!("OpenAI API error {status}: {body}")));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| RagError::EmbedError(e.to_string()))?;

        parse_embedding_response(&json)
    }

    async fn embed_batch_openai(
        &self,
        texts: &[&str],
        api_key: &str,
        model: &str,
    ) -> Result<Vec<Vec<f32>>> {
        let response = self
            .client
            .post(OPENAI_API_URL)
            .timeout(self.timeout)
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&serde_json::json!({ "model": model, "input": texts }))
            .send()
            .await
            .map_err(|e| RagError::EmbedError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RagError::EmbedError(format!("OpenAI API error {status}: {body}")));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| RagError::EmbedError(e.to_string()))?;

        parse_batch_embedding_response(&json)
    }
}

fn parse_embedding_response(json: &serde_json::Value) -> Result<Vec<f32>> {
    let embedding = json["data"][0]["embedding"]
        .as_array()
        .ok_or_else(|| RagError::EmbedError("invalid response format".to_string()))?;
    embedding
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| RagError::EmbedError("invalid embedding value".to_string()))
        })
        .collect()
}

fn parse_batch_embedding_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json["data"]
        .as_array()
        .ok_or_else(|| RagError::EmbedError("invalid response format".to_string()))?;
    data.iter()
        .map(|item| {
            let embedding = item["embedding"]
                .as_array()
                .ok_or_else(|| RagError::EmbedError("invalid embedding format".to_string()))?;
            embedding
                .iter()
                .map(|v| {
                    v.as_f64()
                        .map(|f| f as f32)
                        .ok_or_else(|| RagError::EmbedError("invalid embedding value".to_string()))
                })
                .collect()
        })
        .collect()
}

/// Deterministic fake embedding derived from a hash of the input text.
/// Not suitable for real semantic search — only keeps the system testable
/// and functional when no real embedding provider is configured.
pub fn hash_based_embedding(text: &str, dimension: usize) -> Vec<f32> {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut embedding = Vec::with_capacity(dimension);
    for i in 0..dimension {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        i.hash(&mut hasher);
        let hash = hasher.finish();
        let value = ((hash as f64 / u64::MAX as f64) * 2.0 - 1.0) as f32;
        embedding.push(value);
    }

    let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        for x in &mut embedding {
            *x /= magnitude;
        }
    }
    embedding
}

/// Dot-product similarity, used by search (cosine is used for tests where
/// a scale-invariant score is more intuitive — both are monotonic on
/// normalized embeddings).
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot = dot_product(a, b);
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    dot / (mag_a * mag_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_based_embedding_is_deterministic() {
        let e1 = hash_based_embedding("hello world", 32);
        let e2 = hash_based_embedding("hello world", 32);
        assert_eq!(e1, e2);
    }

    #[test]
    fn hash_based_embedding_differs_across_texts() {
        let e1 = hash_based_embedding("turn on the lights", 16);
        let e2 = hash_based_embedding("turn off the lights", 16);
        assert_ne!(e1, e2);
    }

    #[test]
    fn hash_based_embedding_is_unit_length() {
        let e = hash_based_embedding("normalize me", 64);
        let mag: f32 = e.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((mag - 1.0).abs() < 0.0001);
    }

    #[test]
    fn cosine_similarity_of_identical_vectors_is_one() {
        let v = vec![0.3, 0.4, 0.5];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 0.0001);
    }
}
