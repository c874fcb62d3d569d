use std::sync::Arc;

use hearth_protocol::{methods, ResFrame};

use crate::app::AppState;
use crate::ws::handlers;

/// Route a WS method call to its handler. `chat/send_stream` is handled
/// before this is ever reached (see `ws::message`) since it pushes events
/// as it goes instead of returning one `ResFrame`.
pub async fn route(method: &str, params: &serde_json::Value, id: &str, state: &Arc<AppState>) -> ResFrame {
    match method {
        methods::CHAT_SEND => handlers::handle_chat_send(params, id, state).await,
        methods::CHAT_ABORT => handlers::handle_chat_abort(params, id, state).await,

        methods::SESSIONS_LIST => handlers::handle_sessions_list(params, id, state).await,
        methods::SESSIONS_GET => handlers::handle_sessions_get(params, id, state).await,
        methods::SESSIONS_CREATE => handlers::handle_sessions_create(params, id, state).await,
        methods::SESSIONS_DELETE => handlers::handle_sessions_delete(params, id, state).await,
        methods::SESSIONS_GENERATE_EMOJI => handlers::handle_sessions_generate_emoji(params, id, state).await,

        methods::RAG_STATS => handlers::handle_rag_stats(params, id, state).await,
        methods::RAG_SEARCH => handlers::handle_rag_search(params, id, state).await,
        methods::RAG_MEMORIES => handlers::handle_rag_memories(params, id, state).await,
        methods::RAG_SESSIONS => handlers::handle_rag_sessions(params, id, state).await,
        methods::RAG_IDENTITY => handlers::handle_rag_identity(params, id, state).await,
        methods::RAG_MEMORY_DELETE => handlers::handle_rag_memory_delete(params, id, state).await,
        methods::RAG_IDENTITY_UPDATE => handlers::handle_rag_identity_update(params, id, state).await,
        methods::RAG_OPTIMIZE_ANALYZE => handlers::handle_rag_optimize_analyze(params, id, state).await,
        methods::RAG_OPTIMIZE_RUN => handlers::handle_rag_optimize_run(params, id, state).await,

        methods::SCHEDULER_LIST => handlers::handle_scheduler_list(params, id, state).await,
        methods::SCHEDULER_ENABLE => handlers::handle_scheduler_enable(params, id, state).await,
        methods::SCHEDULER_REMOVE => handlers::handle_scheduler_remove(params, id, state).await,
        methods::SCHEDULER_RUN => handlers::handle_scheduler_run(params, id, state).await,
        methods::SCHEDULER_HISTORY => handlers::handle_scheduler_history(params, id, state).await,
        methods::SCHEDULER_STATUS => handlers::handle_scheduler_status(params, id, state).await,

        methods::PREFERENCES_GET => handlers::handle_preferences_get(params, id, state).await,
        methods::PREFERENCES_SET => handlers::handle_preferences_set(params, id, state).await,

        methods::PROVIDERS_CONFIG => handlers::handle_providers_config(params, id, state).await,
        methods::MODELS_LIST => handlers::handle_models_list(params, id, state).await,
        methods::CONFIG_MODELS_GET => handlers::handle_config_models_get(params, id, state).await,
        methods::CONFIG_MODELS_UPDATE => handlers::handle_config_models_update(params, id, state).await,

        methods::CHAT_SEND_STREAM => {
            ResFrame::err(id, "INVALID_REQUEST", "chat/send_stream must be dispatched by the connection loop")
        }
        methods::CONNECT => ResFrame::err(id, "INVALID_REQUEST", "already connected"),

        _ => ResFrame::err(id, "METHOD_NOT_FOUND", format!("method '{method}' not recognized")),
    }
}
