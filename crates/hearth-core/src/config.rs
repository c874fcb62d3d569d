use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// Gateway bind settings.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            auth: AuthConfig::default(),
            handshake_timeout_ms: default_handshake_timeout_ms(),
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            max_payload_bytes: default_max_payload_bytes(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8787
}

fn default_handshake_timeout_ms() -> u64 {
    5_000
}

fn default_heartbeat_interval_secs() -> u64 {
    30
}

fn default_max_payload_bytes() -> usize {
    1_048_576
}

/// Auth mode for the WS/HTTP boundary. A single-household installation only
/// needs `None` or `Token` in practice; `Password` is kept for a UI login
/// screen but compares in plaintext until an argon2 pass is wired in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    #[default]
    None,
    Token,
    Password,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub mode: AuthMode,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// One configured upstream LLM backend.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub kind: ProviderKind,
    pub endpoint: String,
    pub model: String,
    pub api_key_env: String,
    #[serde(default = "default_provider_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
}

fn default_provider_timeout_ms() -> u64 {
    30_000
}

/// RAG subsystem tuning knobs.
#[derive(Debug, Clone, Deserialize)]
pub struct RagConfig {
    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,
    #[serde(default = "default_extraction_interval_secs")]
    pub auto_extraction_interval_secs: u64,
    #[serde(default = "default_importance_threshold")]
    pub importance_threshold: f32,
    #[serde(default = "default_embedding_timeout_ms")]
    pub embedding_timeout_ms: u64,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            embedding_dim: default_embedding_dim(),
            auto_extraction_interval_secs: default_extraction_interval_secs(),
            importance_threshold: default_importance_threshold(),
            embedding_timeout_ms: default_embedding_timeout_ms(),
        }
    }
}

fn default_embedding_dim() -> usize {
    256
}

fn default_extraction_interval_secs() -> u64 {
    3600
}

fn default_importance_threshold() -> f32 {
    0.35
}

fn default_embedding_timeout_ms() -> u64 {
    10_000
}

/// Agent orchestrator tuning knobs.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: u32,
    #[serde(default = "default_tool_timeout_ms")]
    pub tool_timeout_ms: u64,
    #[serde(default = "default_turn_timeout_ms")]
    pub turn_timeout_ms: u64,
    /// Run auto memory extraction every N completed turns.
    #[serde(default = "default_memory_extraction_interval")]
    pub memory_extraction_interval: u32,
    /// Minimum importance (1-10) a candidate fact needs to be written as a
    /// long-term memory during auto extraction.
    #[serde(default = "default_memory_importance_threshold")]
    pub memory_importance_threshold: u8,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_tool_iterations: default_max_tool_iterations(),
            tool_timeout_ms: default_tool_timeout_ms(),
            turn_timeout_ms: default_turn_timeout_ms(),
            memory_extraction_interval: default_memory_extraction_interval(),
            memory_importance_threshold: default_memory_importance_threshold(),
        }
    }
}

fn default_max_tool_iterations() -> u32 {
    10
}

fn default_memory_extraction_interval() -> u32 {
    3
}

fn default_memory_importance_threshold() -> u8 {
    5
}

fn default_tool_timeout_ms() -> u64 {
    15_000
}

fn default_turn_timeout_ms() -> u64 {
    120_000
}

/// Top-level configuration, layered Toml-file-then-environment the same way
/// the teacher's gateway config loads (`figment`, env prefix split on `_`).
#[derive(Debug, Clone, Deserialize)]
pub struct HearthConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
    #[serde(default)]
    pub rag: RagConfig,
    #[serde(default)]
    pub agent: AgentConfig,
}

fn default_database_path() -> String {
    "hearth.sqlite3".to_string()
}

impl HearthConfig {
    /// Load from `path` (if present) layered under `HEARTH_`-prefixed env vars.
    pub fn load(path: &str) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("HEARTH_").split("_"))
            .extract()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_with_no_file_or_env() {
        let cfg: HearthConfig = Figment::new().extract().expect("defaults should be enough");
        assert_eq!(cfg.gateway.port, 8787);
        assert_eq!(cfg.agent.max_tool_iterations, 10);
        assert_eq!(cfg.rag.embedding_dim, 256);
    }

    #[test]
    fn toml_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hearth.toml");
        std::fs::write(&path, "database_path = \"custom.sqlite3\"\n[gateway]\nport = 9999\n")
            .unwrap();
        let cfg = HearthConfig::load(path.to_str().unwrap()).unwrap();
        assert_eq!(cfg.gateway.port, 9999);
        assert_eq!(cfg.database_path, "custom.sqlite3");
    }
}
