//! Well-known WS method names. Kept as plain `&str` constants rather than an
//! enum so dispatch tables can match directly against the wire string
//! without an intermediate parse step.

pub const CHAT_SEND_STREAM: &str = "chat/send_stream";
pub const CHAT_SEND: &str = "chat/send";
pub const CHAT_ABORT: &str = "chat/abort";

pub const SESSIONS_LIST: &str = "sessions/list";
pub const SESSIONS_GET: &str = "sessions/get";
pub const SESSIONS_CREATE: &str = "sessions/create";
pub const SESSIONS_DELETE: &str = "sessions/delete";
pub const SESSIONS_GENERATE_EMOJI: &str = "sessions/generate_emoji";

pub const RAG_STATS: &str = "rag/stats";
pub const RAG_SEARCH: &str = "rag/search";
pub const RAG_MEMORIES: &str = "rag/memories";
pub const RAG_SESSIONS: &str = "rag/sessions";
pub const RAG_IDENTITY: &str = "rag/identity";
pub const RAG_MEMORY_DELETE: &str = "rag/memory/delete";
pub const RAG_IDENTITY_UPDATE: &str = "rag/identity/update";
pub const RAG_OPTIMIZE_ANALYZE: &str = "rag/optimize/analyze";
pub const RAG_OPTIMIZE_RUN: &str = "rag/optimize/run";

pub const SCHEDULER_LIST: &str = "scheduler/list";
pub const SCHEDULER_ENABLE: &str = "scheduler/enable";
pub const SCHEDULER_REMOVE: &str = "scheduler/remove";
pub const SCHEDULER_RUN: &str = "scheduler/run";
pub const SCHEDULER_HISTORY: &str = "scheduler/history";
pub const SCHEDULER_STATUS: &str = "scheduler/status";

pub const PREFERENCES_GET: &str = "preferences/get";
pub const PREFERENCES_SET: &str = "preferences/set";

pub const PROVIDERS_CONFIG: &str = "providers/config";
pub const MODELS_LIST: &str = "models/list";
pub const CONFIG_MODELS_GET: &str = "config/models/get";
pub const CONFIG_MODELS_UPDATE: &str = "config/models/update";

pub const CONNECT: &str = "connect";

/// All methods that may be dispatched once a connection is authenticated.
/// Useful for generating method-not-found errors with a helpful hint, and
/// for tests that assert every table entry has a handler wired up.
pub const ALL_METHODS: &[&str] = &[
    CHAT_SEND_STREAM,
    CHAT_SEND,
    CHAT_ABORT,
    SESSIONS_LIST,
    SESSIONS_GET,
    SESSIONS_CREATE,
    SESSIONS_DELETE,
    SESSIONS_GENERATE_EMOJI,
    RAG_STATS,
    RAG_SEARCH,
    RAG_MEMORIES,
    RAG_SESSIONS,
    RAG_IDENTITY,
    RAG_MEMORY_DELETE,
    RAG_IDENTITY_UPDATE,
    RAG_OPTIMIZE_ANALYZE,
    RAG_OPTIMIZE_RUN,
    SCHEDULER_LIST,
    SCHEDULER_ENABLE,
    SCHEDULER_REMOVE,
    SCHEDULER_RUN,
    SCHEDULER_HISTORY,
    SCHEDULER_STATUS,
    PREFERENCES_GET,
    PREFERENCES_SET,
    PROVIDERS_CONFIG,
    MODELS_LIST,
    CONFIG_MODELS_GET,
    CONFIG_MODELS_UPDATE,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_methods_list_has_no_duplicates() {
        let mut sorted = ALL_METHODS.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), ALL_METHODS.len());
    }
}
