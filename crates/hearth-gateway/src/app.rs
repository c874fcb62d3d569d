use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use rusqlite::Connection;
use tracing::warn;

use hearth_agent::home::{HomeHandle, MockHome};
use hearth_agent::providers::anthropic::AnthropicProvider;
use hearth_agent::providers::openai::OpenAiProvider;
use hearth_agent::{LlmProvider, MessageContext, Orchestrator, ToolRegistry};
use hearth_core::config::{HearthConfig, ProviderConfig, ProviderKind};
use hearth_core::TurnRunner;
use hearth_rag::{EmbeddingGenerator, EmbeddingProvider, RagStore};
use hearth_scheduler::{SchedulerEngine, SchedulerHandle};
use hearth_sessions::{PreferencesStore, SessionStore};

use crate::ws::broadcast::EventBroadcaster;

/// Backs every subsystem lookup `Orchestrator`/tools need. Kept separate
/// from `AppState` so the circular dependency between the scheduler (which
/// needs a `TurnRunner`) and the orchestrator (which needs this context
/// already holding the scheduler) resolves through one `OnceLock` instead
/// of a reference cycle.
pub struct GatewayContext {
    sessions: SessionStore,
    preferences: PreferencesStore,
    rag: Arc<RagStore>,
    home: Arc<dyn HomeHandle>,
    providers: HashMap<String, Arc<dyn LlmProvider>>,
    scheduler: OnceLock<Arc<SchedulerHandle>>,
    agent_config: hearth_core::config::AgentConfig,
}

impl MessageContext for GatewayContext {
    fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    fn rag(&self) -> &Arc<RagStore> {
        &self.rag
    }

    fn scheduler(&self) -> &Arc<SchedulerHandle> {
        self.scheduler
            .get()
            .expect("scheduler is initialized once during startup, before any turn runs")
    }

    fn home(&self) -> &Arc<dyn HomeHandle> {
        &self.home
    }

    fn preferences(&self) -> &PreferencesStore {
        &self.preferences
    }

    fn agent_config(&self) -> &hearth_core::config::AgentConfig {
        &self.agent_config
    }

    fn provider(&self, name: &str) -> Option<Arc<dyn LlmProvider>> {
        self.providers.get(name).cloned()
    }
}

/// Shared process state, constructed once at startup and handed to every
/// request as an `Arc`. Mirrors one shared-resource policy for the whole
/// kernel (§5): every subsystem is a field here, nothing is re-opened per
/// request.
pub struct AppState {
    pub config: HearthConfig,
    pub ctx: Arc<GatewayContext>,
    pub orchestrator: Arc<Orchestrator<GatewayContext>>,
    pub event_seq: AtomicU64,
    pub broadcaster: EventBroadcaster,
    scheduler_shutdown: tokio::sync::watch::Sender<bool>,
}

impl AppState {
    pub fn new(config: HearthConfig) -> anyhow::Result<Arc<Self>> {
        let sessions_conn = Connection::open(&config.database_path)?;
        hearth_sessions::init_db(&sessions_conn)?;
        let sessions = SessionStore::new(sessions_conn);

        let prefs_conn = Connection::open(&config.database_path)?;
        hearth_sessions::init_db(&prefs_conn)?;
        let preferences = PreferencesStore::load(prefs_conn)?;

        let rag_conn = Connection::open(rag_database_path(&config.database_path))?;
        hearth_rag::init_db(&rag_conn)?;
        let embedder = EmbeddingGenerator::new(
            EmbeddingProvider::from_env(config.rag.embedding_dim),
            config.rag.embedding_dim,
            Duration::from_millis(config.rag.embedding_timeout_ms),
        );
        let rag = Arc::new(RagStore::new(rag_conn, embedder));

        let home: Arc<dyn HomeHandle> = Arc::new(MockHome::new());
        let providers = build_providers(&config.providers);

        let ctx = Arc::new(GatewayContext {
            sessions,
            preferences,
            rag,
            home,
            providers,
            scheduler: OnceLock::new(),
            agent_config: config.agent.clone(),
        });

        let orchestrator = Arc::new(Orchestrator::new(ctx.clone()));

        let scheduler_conn = Connection::open(&config.database_path)?;
        let runner: Arc<dyn TurnRunner> = orchestrator.clone();
        let scheduler_handle = SchedulerHandle::new(scheduler_conn, runner)?;
        let engine = SchedulerEngine::new(scheduler_handle.clone());
        ctx.scheduler
            .set(Arc::new(scheduler_handle))
            .unwrap_or_else(|_| unreachable!("scheduler is only ever set once, here"));

        let (scheduler_shutdown, shutdown_rx) = tokio::sync::watch::channel(false);
        tokio::spawn(engine.run(shutdown_rx));

        Ok(Arc::new(Self {
            config,
            ctx,
            orchestrator,
            event_seq: AtomicU64::new(0),
            broadcaster: EventBroadcaster::new(),
            scheduler_shutdown,
        }))
    }

    /// Signal the scheduler engine's tick loop to stop. Called from `main`'s
    /// graceful-shutdown hook so cron/interval jobs stop firing before the
    /// process exits.
    pub fn stop_scheduler(&self) {
        let _ = self.scheduler_shutdown.send(true);
    }

    /// Next monotonic sequence number for an outbound event, shared across
    /// every connection (the client tracks its own high-water mark per the
    /// `StateVersion` contract).
    pub fn next_seq(&self) -> u64 {
        self.event_seq.fetch_add(1, Ordering::Relaxed)
    }

    pub fn scheduler(&self) -> &Arc<SchedulerHandle> {
        self.ctx.scheduler()
    }

    pub fn build_tools(&self) -> ToolRegistry {
        self.ctx.build_tools()
    }
}

/// Sibling of `database_path` holding the three RAG indices, kept in its
/// own file per §6.2 rather than sharing the sessions/messages database.
fn rag_database_path(database_path: &str) -> PathBuf {
    let path = Path::new(database_path);
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    dir.join("rag.db")
}

fn build_providers(configs: &[ProviderConfig]) -> HashMap<String, Arc<dyn LlmProvider>> {
    let mut providers: HashMap<String, Arc<dyn LlmProvider>> = HashMap::new();
    for cfg in configs {
        let api_key = match std::env::var(&cfg.api_key_env) {
            Ok(key) => key,
            Err(_) => {
                warn!(provider = %cfg.name, env = %cfg.api_key_env, "provider API key not set, skipping");
                continue;
            }
        };
        let provider: Arc<dyn LlmProvider> = match cfg.kind {
            ProviderKind::OpenAi => Arc::new(OpenAiProvider::with_path(
                cfg.name.clone(),
                api_key,
                cfg.endpoint.clone(),
                "/v1/chat/completions".to_string(),
            )),
            ProviderKind::Anthropic => {
                Arc::new(AnthropicProvider::new(api_key, Some(cfg.endpoint.clone())))
            }
        };
        providers.insert(cfg.name.clone(), provider);
    }
    providers
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(crate::ws::ws_handler))
        .route("/health", get(crate::http::health::health_handler))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rag_database_path_sits_beside_the_main_database() {
        assert_eq!(rag_database_path("hearth.sqlite3"), PathBuf::from("./rag.db"));
        assert_eq!(rag_database_path("/var/lib/hearth/hearth.sqlite3"), PathBuf::from("/var/lib/hearth/rag.db"));
    }

    #[test]
    fn build_providers_skips_entries_missing_their_api_key_env() {
        let configs = vec![ProviderConfig {
            name: "test-provider".to_string(),
            kind: ProviderKind::OpenAi,
            endpoint: "https://example.invalid".to_string(),
            model: "gpt-test".to_string(),
            api_key_env: "HEARTH_TEST_PROVIDER_KEY_DOES_NOT_EXIST".to_string(),
            timeout_ms: 1000,
        }];
        let providers = build_providers(&configs);
        assert!(providers.is_empty());
    }
}

