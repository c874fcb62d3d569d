//! Concrete WS method handler functions.
//!
//! Each function extracts its parameters, calls the appropriate `AppState`
//! subsystem, and returns a `ResFrame`. `dispatch::route` is the only
//! caller — keep this module free of I/O side-effects beyond the subsystem
//! calls (no direct DB access, no raw sockets).

use std::sync::Arc;

use hearth_agent::MessageContext;
use hearth_core::KernelError;
use hearth_protocol::ResFrame;
use hearth_rag::Tag;
use tracing::warn;

use crate::app::AppState;

fn err_frame(id: &str, err: impl Into<KernelError>) -> ResFrame {
    let err: KernelError = err.into();
    warn!(code = err.code(), error = %err, "request failed");
    ResFrame::err(id, err.code(), err.to_string())
}

fn missing(id: &str, field: &str) -> ResFrame {
    ResFrame::err(id, "INVALID_PARAMS", format!("missing '{field}' field"))
}

fn param_str<'a>(params: &'a serde_json::Value, field: &str) -> Option<&'a str> {
    params.get(field).and_then(|v| v.as_str())
}

// ---------------------------------------------------------------------------
// chat/send, chat/abort
// ---------------------------------------------------------------------------

/// Handler for `chat/send`. Params: `{ session_id, message, provider, model? }`.
/// Runs a turn to completion and returns the final assistant message as a
/// single `result` payload — no streaming events. `chat/send_stream` is
/// handled outside this dispatch table since it pushes events as they
/// happen rather than returning one `ResFrame`.
pub async fn handle_chat_send(params: &serde_json::Value, id: &str, state: &Arc<AppState>) -> ResFrame {
    let Some(session_id) = param_str(params, "session_id") else { return missing(id, "session_id") };
    let Some(message) = param_str(params, "message") else { return missing(id, "message") };
    let Some(provider) = param_str(params, "provider") else { return missing(id, "provider") };
    let model = param_str(params, "model").unwrap_or_default();

    let (tx, _rx) = tokio::sync::mpsc::channel(32);

    match state.orchestrator.handle_turn(session_id, message, provider, model, tx).await {
        Ok(outcome) => ResFrame::ok(
            id,
            serde_json::json!({ "message_id": outcome.message_id, "text": outcome.final_text }),
        ),
        Err(e) => err_frame(id, e),
    }
}

/// Handler for `chat/abort`. Params: `{ session_id }`.
pub async fn handle_chat_abort(params: &serde_json::Value, id: &str, state: &Arc<AppState>) -> ResFrame {
    let Some(session_id) = param_str(params, "session_id") else { return missing(id, "session_id") };
    let cancelled = state.orchestrator.cancel(session_id);
    ResFrame::ok(id, serde_json::json!({ "cancelled": cancelled }))
}

// ---------------------------------------------------------------------------
// sessions/*
// ---------------------------------------------------------------------------

pub async fn handle_sessions_list(_params: &serde_json::Value, id: &str, state: &Arc<AppState>) -> ResFrame {
    match state.ctx.sessions().list_sessions() {
        Ok(sessions) => ResFrame::ok(id, serde_json::json!({ "sessions": sessions })),
        Err(e) => err_frame(id, e),
    }
}

pub async fn handle_sessions_get(params: &serde_json::Value, id: &str, state: &Arc<AppState>) -> ResFrame {
    let Some(session_id) = param_str(params, "session_id") else { return missing(id, "session_id") };
    match state.ctx.sessions().get_session(session_id) {
        Ok(session) => {
            let messages = state.ctx.sessions().list_messages(session_id).unwrap_or_default();
            ResFrame::ok(id, serde_json::json!({ "session": session, "messages": messages }))
        }
        Err(e) => err_frame(id, e),
    }
}

pub async fn handle_sessions_create(params: &serde_json::Value, id: &str, state: &Arc<AppState>) -> ResFrame {
    let title = param_str(params, "title").map(str::to_string);
    match state.ctx.sessions().create_session(title) {
        Ok(session) => ResFrame::ok(id, serde_json::json!({ "session": session })),
        Err(e) => err_frame(id, e),
    }
}

/// Deletes a session and cascades to its RAG chunks as well as its
/// messages/attachments: `SessionStore` owns the sessions database and has
/// no reference to the RAG index, so the chunk side of the cascade happens
/// here, where both stores are in reach.
pub async fn handle_sessions_delete(params: &serde_json::Value, id: &str, state: &Arc<AppState>) -> ResFrame {
    let Some(session_id) = param_str(params, "session_id") else { return missing(id, "session_id") };
    match state.ctx.sessions().delete_session(session_id) {
        Ok(()) => {
            if let Err(e) = state.ctx.rag().delete_chunks_for_session(session_id) {
                warn!(session_id, error = %e, "failed to cascade-delete rag chunks for deleted session");
            }
            ResFrame::ok(id, serde_json::json!({ "deleted": true }))
        }
        Err(e) => err_frame(id, e),
    }
}

/// Handler for `sessions/generate_emoji`. Params: `{ session_id, emoji }`.
/// Unlike the housekeeping pass in the orchestrator (which derives title and
/// emoji together from the opening message), this is the on-demand path the
/// UI uses when the user picks an emoji directly.
pub async fn handle_sessions_generate_emoji(
    params: &serde_json::Value,
    id: &str,
    state: &Arc<AppState>,
) -> ResFrame {
    let Some(session_id) = param_str(params, "session_id") else { return missing(id, "session_id") };
    let Some(emoji) = param_str(params, "emoji") else { return missing(id, "emoji") };
    match state.ctx.sessions().set_session_emoji(session_id, emoji) {
        Ok(()) => ResFrame::ok(id, serde_json::json!({ "emoji": emoji })),
        Err(e) => err_frame(id, e),
    }
}

// ---------------------------------------------------------------------------
// rag/*
// ---------------------------------------------------------------------------

pub async fn handle_rag_stats(_params: &serde_json::Value, id: &str, state: &Arc<AppState>) -> ResFrame {
    match state.ctx.rag().stats() {
        Ok(stats) => ResFrame::ok(id, serde_json::json!({ "stats": stats })),
        Err(e) => err_frame(id, e),
    }
}

pub async fn handle_rag_search(params: &serde_json::Value, id: &str, state: &Arc<AppState>) -> ResFrame {
    const DEFAULT_LIMIT: usize = 10;
    let Some(query) = param_str(params, "query") else { return missing(id, "query") };
    let limit = params.get("limit").and_then(|v| v.as_u64()).map(|n| n as usize).unwrap_or(DEFAULT_LIMIT);
    let filter = params.get("tag").and_then(|v| v.as_str()).and_then(parse_tag);
    let hits = state.ctx.rag().search(query, limit, filter).await;
    ResFrame::ok(id, serde_json::json!({ "hits": hits }))
}

fn list_by_tag_response(tag: Tag, params: &serde_json::Value, id: &str, state: &Arc<AppState>) -> ResFrame {
    const DEFAULT_LIMIT: usize = 50;
    let limit = params.get("limit").and_then(|v| v.as_u64()).map(|n| n as usize).unwrap_or(DEFAULT_LIMIT);
    match state.ctx.rag().list_by_tag(tag, limit) {
        Ok(hits) => ResFrame::ok(id, serde_json::json!({ "hits": hits })),
        Err(e) => err_frame(id, e),
    }
}

pub async fn handle_rag_memories(params: &serde_json::Value, id: &str, state: &Arc<AppState>) -> ResFrame {
    list_by_tag_response(Tag::Memory, params, id, state)
}

pub async fn handle_rag_sessions(params: &serde_json::Value, id: &str, state: &Arc<AppState>) -> ResFrame {
    list_by_tag_response(Tag::Chunk, params, id, state)
}

pub async fn handle_rag_identity(params: &serde_json::Value, id: &str, state: &Arc<AppState>) -> ResFrame {
    list_by_tag_response(Tag::Entity, params, id, state)
}

pub async fn handle_rag_memory_delete(params: &serde_json::Value, id: &str, state: &Arc<AppState>) -> ResFrame {
    let Some(memory_id) = param_str(params, "memory_id") else { return missing(id, "memory_id") };
    match state.ctx.rag().delete_memory(memory_id) {
        Ok(()) => ResFrame::ok(id, serde_json::json!({ "deleted": true })),
        Err(e) => err_frame(id, e),
    }
}

/// Handler for `rag/identity/update`. Params mirror `EntityRecord` minus the
/// digest, which this call recomputes so a stale client can't poison it.
pub async fn handle_rag_identity_update(
    params: &serde_json::Value,
    id: &str,
    state: &Arc<AppState>,
) -> ResFrame {
    let Some(entity_id) = param_str(params, "entity_id") else { return missing(id, "entity_id") };
    let Some(domain) = param_str(params, "domain") else { return missing(id, "domain") };
    let Some(friendly_name) = param_str(params, "friendly_name") else {
        return missing(id, "friendly_name");
    };
    let area = param_str(params, "area").map(str::to_string);
    let device_class = param_str(params, "device_class").map(str::to_string);
    let unit = param_str(params, "unit").map(str::to_string);

    let entity = hearth_rag::EntityRecord {
        entity_id: entity_id.to_string(),
        domain: domain.to_string(),
        friendly_name: friendly_name.to_string(),
        area,
        device_class,
        unit,
        attributes_digest: format!("{:x}", digest_entity(entity_id, friendly_name)),
    };
    match state.ctx.rag().write_entity(&entity).await {
        Ok(()) => ResFrame::ok(id, serde_json::json!({ "entity": entity })),
        Err(e) => err_frame(id, e),
    }
}

/// `attributes_digest` only needs to change when an entity's identity
/// fields change, not to be cryptographically strong — a stable hash of the
/// fields that make up the digest is enough to invalidate stale RAG hits.
fn digest_entity(entity_id: &str, friendly_name: &str) -> u64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let mut hasher = DefaultHasher::new();
    entity_id.hash(&mut hasher);
    friendly_name.hash(&mut hasher);
    hasher.finish()
}

fn parse_tag(s: &str) -> Option<Tag> {
    match s {
        "entity" => Some(Tag::Entity),
        "chunk" => Some(Tag::Chunk),
        "memory" => Some(Tag::Memory),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_tag_accepts_known_values_only() {
        assert_eq!(parse_tag("entity"), Some(Tag::Entity));
        assert_eq!(parse_tag("chunk"), Some(Tag::Chunk));
        assert_eq!(parse_tag("memory"), Some(Tag::Memory));
        assert_eq!(parse_tag("bogus"), None);
    }

    #[test]
    fn digest_entity_is_stable_and_identity_sensitive() {
        let a = digest_entity("light.kitchen", "Kitchen Light");
        let b = digest_entity("light.kitchen", "Kitchen Light");
        let c = digest_entity("light.kitchen", "Kitchen Lamp");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn missing_reports_the_absent_field() {
        let frame = missing("req-1", "session_id");
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value["error"]["code"], "INVALID_PARAMS");
        assert!(value["error"]["message"].as_str().unwrap().contains("session_id"));
    }
}

/// Handler for `rag/optimize/analyze`. Params: `{ session_id }`. Read-only
/// preview of how many chunks a `rag/optimize/run` pass would consolidate —
/// does not touch the index.
pub async fn handle_rag_optimize_analyze(
    params: &serde_json::Value,
    id: &str,
    state: &Arc<AppState>,
) -> ResFrame {
    let Some(session_id) = param_str(params, "session_id") else { return missing(id, "session_id") };
    let hits = match state.ctx.rag().list_by_tag(Tag::Chunk, 500) {
        Ok(hits) => hits,
        Err(e) => return err_frame(id, e),
    };
    let pending = hits
        .iter()
        .filter(|h| {
            h.payload.get("session_id").and_then(|v| v.as_str()) == Some(session_id)
                && h.payload.get("optimized").and_then(|v| v.as_bool()) != Some(true)
        })
        .count();
    ResFrame::ok(id, serde_json::json!({ "session_id": session_id, "chunks_pending": pending }))
}

/// Handler for `rag/optimize/run`. Params: `{ session_id, force? }`. Runs the
/// consolidation pass to completion using the session's configured
/// optimizer provider/model (falling back to its default provider), and
/// logs progress as it arrives rather than streaming it — the uniform
/// dispatch path only returns one `ResFrame` per request.
pub async fn handle_rag_optimize_run(params: &serde_json::Value, id: &str, state: &Arc<AppState>) -> ResFrame {
    let Some(session_id) = param_str(params, "session_id") else { return missing(id, "session_id") };
    let force = params.get("force").and_then(|v| v.as_bool()).unwrap_or(false);

    let prefs = state.ctx.preferences().snapshot();
    let provider_name = prefs.rag_optimizer_provider.clone().or_else(|| prefs.default_provider.clone());
    let Some(provider_name) = provider_name else {
        return ResFrame::err(id, "INVALID_INPUT", "no optimizer provider configured");
    };
    let Some(provider) = state.ctx.provider(&provider_name) else {
        return ResFrame::err(id, "INVALID_INPUT", format!("unknown provider: {provider_name}"));
    };
    let model = prefs.rag_optimizer_model.clone().unwrap_or_default();

    let (progress_tx, mut progress_rx) = tokio::sync::mpsc::channel(8);
    let session_id_owned = session_id.to_string();
    tokio::spawn(async move {
        while let Some(update) = progress_rx.recv().await {
            tracing::info!(session_id = %session_id_owned, phase = %update.phase, pct = update.progress_pct, "rag optimize progress");
        }
    });

    let summarize = |chunks: Vec<String>| async move {
        let request = hearth_agent::ChatRequest {
            model: model.clone(),
            system: "Summarize the following conversation chunks into one concise paragraph \
                preserving names, decisions, and facts."
                .to_string(),
            messages: vec![hearth_agent::ChatMessage {
                role: hearth_agent::provider::Role::User,
                content: chunks.join("\n---\n"),
            }],
            max_tokens: 512,
            temperature: None,
            tools: Vec::new(),
            raw_messages: None,
        };
        match provider.send(&request).await {
            Ok(resp) => resp.content,
            Err(_) => chunks.join("\n"),
        }
    };

    match state.ctx.rag().optimize_session(session_id, force, summarize, &progress_tx).await {
        Ok(()) => ResFrame::ok(id, serde_json::json!({ "session_id": session_id })),
        Err(e) => err_frame(id, e),
    }
}

// ---------------------------------------------------------------------------
// scheduler/*
// ---------------------------------------------------------------------------

pub async fn handle_scheduler_list(_params: &serde_json::Value, id: &str, state: &Arc<AppState>) -> ResFrame {
    match state.scheduler().list_jobs() {
        Ok(jobs) => ResFrame::ok(id, serde_json::json!({ "jobs": jobs })),
        Err(e) => err_frame(id, e),
    }
}

pub async fn handle_scheduler_enable(params: &serde_json::Value, id: &str, state: &Arc<AppState>) -> ResFrame {
    let Some(job_id) = param_str(params, "job_id") else { return missing(id, "job_id") };
    let enabled = params.get("enabled").and_then(|v| v.as_bool()).unwrap_or(true);
    match state.scheduler().enable_job(job_id, enabled) {
        Ok(()) => ResFrame::ok(id, serde_json::json!({ "job_id": job_id, "enabled": enabled })),
        Err(e) => err_frame(id, e),
    }
}

pub async fn handle_scheduler_remove(params: &serde_json::Value, id: &str, state: &Arc<AppState>) -> ResFrame {
    let Some(job_id) = param_str(params, "job_id") else { return missing(id, "job_id") };
    match state.scheduler().remove_job(job_id) {
        Ok(()) => ResFrame::ok(id, serde_json::json!({ "removed": true })),
        Err(e) => err_frame(id, e),
    }
}

pub async fn handle_scheduler_run(params: &serde_json::Value, id: &str, state: &Arc<AppState>) -> ResFrame {
    let Some(job_id) = param_str(params, "job_id") else { return missing(id, "job_id") };
    match state.scheduler().run_now(job_id).await {
        Ok(record) => ResFrame::ok(id, serde_json::json!({ "run": record })),
        Err(e) => err_frame(id, e),
    }
}

pub async fn handle_scheduler_history(params: &serde_json::Value, id: &str, state: &Arc<AppState>) -> ResFrame {
    const DEFAULT_LIMIT: usize = 50;
    let limit = params.get("limit").and_then(|v| v.as_u64()).map(|n| n as usize).unwrap_or(DEFAULT_LIMIT);
    let history = state.scheduler().history(limit);
    ResFrame::ok(id, serde_json::json!({ "history": history }))
}

pub async fn handle_scheduler_status(_params: &serde_json::Value, id: &str, state: &Arc<AppState>) -> ResFrame {
    match state.scheduler().status() {
        Ok(status) => ResFrame::ok(id, serde_json::json!({ "status": status })),
        Err(e) => err_frame(id, e),
    }
}

// ---------------------------------------------------------------------------
// preferences/*
// ---------------------------------------------------------------------------

pub async fn handle_preferences_get(_params: &serde_json::Value, id: &str, state: &Arc<AppState>) -> ResFrame {
    let prefs = state.ctx.preferences().snapshot();
    ResFrame::ok(id, serde_json::json!({ "preferences": *prefs }))
}

pub async fn handle_preferences_set(params: &serde_json::Value, id: &str, state: &Arc<AppState>) -> ResFrame {
    let Some(key) = param_str(params, "key") else { return missing(id, "key") };
    let Some(value) = param_str(params, "value") else { return missing(id, "value") };
    match state.ctx.preferences().set(key, value) {
        Ok(prefs) => ResFrame::ok(id, serde_json::json!({ "preferences": *prefs })),
        Err(e) => err_frame(id, e),
    }
}

// ---------------------------------------------------------------------------
// providers/config, models/list, config/models/*
// ---------------------------------------------------------------------------

pub async fn handle_providers_config(_params: &serde_json::Value, id: &str, state: &Arc<AppState>) -> ResFrame {
    let providers: Vec<_> = state
        .config
        .providers
        .iter()
        .map(|p| serde_json::json!({ "name": p.name, "kind": p.kind, "model": p.model, "configured": state.ctx.provider(&p.name).is_some() }))
        .collect();
    ResFrame::ok(id, serde_json::json!({ "providers": providers }))
}

pub async fn handle_models_list(_params: &serde_json::Value, id: &str, state: &Arc<AppState>) -> ResFrame {
    let models: Vec<_> = state
        .config
        .providers
        .iter()
        .filter(|p| state.ctx.provider(&p.name).is_some())
        .map(|p| serde_json::json!({ "provider": p.name, "model": p.model }))
        .collect();
    ResFrame::ok(id, serde_json::json!({ "models": models }))
}

pub async fn handle_config_models_get(_params: &serde_json::Value, id: &str, state: &Arc<AppState>) -> ResFrame {
    let prefs = state.ctx.preferences().snapshot();
    ResFrame::ok(
        id,
        serde_json::json!({
            "default_provider": prefs.default_provider,
            "default_model": prefs.default_model,
        }),
    )
}

pub async fn handle_config_models_update(
    params: &serde_json::Value,
    id: &str,
    state: &Arc<AppState>,
) -> ResFrame {
    let prefs_store = state.ctx.preferences();
    if let Some(provider) = param_str(params, "default_provider") {
        if let Err(e) = prefs_store.set("default_provider", provider) {
            return err_frame(id, e);
        }
    }
    if let Some(model) = param_str(params, "default_model") {
        if let Err(e) = prefs_store.set("default_model", model) {
            return err_frame(id, e);
        }
    }
    let prefs = prefs_store.snapshot();
    ResFrame::ok(
        id,
        serde_json::json!({ "default_provider": prefs.default_provider, "default_model": prefs.default_model }),
    )
}
