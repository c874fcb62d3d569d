use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// The final assistant message of a completed turn, returned to whoever
/// re-entered the pipeline (the scheduler records it in run history; a
/// best-effort title/emoji pass may also read it).
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub message_id: String,
    pub final_text: String,
}

/// Abstraction over "run one agent turn to completion", implemented
/// concretely by the agent orchestrator and depended on abstractly by the
/// scheduler, so `hearth-scheduler` can re-enter the turn pipeline on a
/// fired job without creating a `hearth-scheduler <-> hearth-agent` cycle.
/// Same idiom as passing a `MessageContext` instead of a global singleton:
/// depend on a trait object, wire the concrete type at the top (gateway
/// startup).
#[async_trait]
pub trait TurnRunner: Send + Sync {
    /// Run a turn for `session_id` seeded with `input` (a user message or a
    /// synthetic scheduler-generated prompt). Returns once the turn reaches a
    /// terminal state; streaming chunks, if any, are delivered through the
    /// orchestrator's own broadcast path, not returned here. An `Err` means
    /// the turn ended in `status=error`; the partial assistant message is
    /// still persisted in the session by the orchestrator itself.
    async fn run_turn(
        &self,
        session_id: &str,
        input: &str,
        cancel: CancellationToken,
    ) -> Result<TurnOutcome>;
}
