//! Shared context interface the orchestrator runs against.
//!
//! Defined here (in `hearth-agent`) rather than in the gateway so the
//! orchestrator stays host-agnostic: `hearth-gateway`'s `AppState` is the
//! only implementer today, but a test harness or a second host could supply
//! its own.

use std::sync::Arc;

use hearth_core::config::AgentConfig;
use hearth_rag::RagStore;
use hearth_scheduler::SchedulerHandle;
use hearth_sessions::{PreferencesStore, SessionStore};

use crate::home::HomeHandle;
use crate::provider::LlmProvider;
use crate::tools::ToolRegistry;

/// Minimal context interface required by `handle_turn`. Each subsystem is a
/// field on one value constructed once at startup (§5 Shared-resource
/// policy) — no global statics, no per-call construction of the stores
/// themselves (tool registries are the exception: cheap to rebuild per turn
/// since they only clone `Arc`s).
pub trait MessageContext: Send + Sync {
    fn sessions(&self) -> &SessionStore;
    fn rag(&self) -> &Arc<RagStore>;
    fn scheduler(&self) -> &Arc<SchedulerHandle>;
    fn home(&self) -> &Arc<dyn HomeHandle>;
    fn preferences(&self) -> &PreferencesStore;
    fn agent_config(&self) -> &AgentConfig;

    /// Resolve a configured provider by name (`"openai"`, `"anthropic"`, a
    /// router alias, ...). `None` if the name isn't configured.
    fn provider(&self, name: &str) -> Option<Arc<dyn LlmProvider>>;

    /// Build a fresh tool registry for one turn. Tools are cheap to
    /// construct — each just clones the `Arc`s it needs from this context.
    fn build_tools(&self) -> ToolRegistry {
        crate::tools::default_registry(
            self.home().clone(),
            self.rag().clone(),
            self.scheduler().clone(),
        )
    }
}
