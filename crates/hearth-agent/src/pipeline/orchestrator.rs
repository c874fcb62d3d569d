//! Agent Orchestrator — drives one turn from user message to terminal
//! state: load/create session, retrieve context, stream the provider call,
//! run any tool rounds, persist everything, and kick off best-effort
//! post-turn housekeeping.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{instrument, warn};

use hearth_core::{new_id, KernelError, MessageStatus, Result, Role as PersistedRole, TurnOutcome, TurnRunner};
use hearth_sessions::{Message, MessageMetadata, MessagePatch, Session, ToolCallRecord};

use crate::compact::{build_messages, CompactorConfig};
use crate::prompt::{build_system_prompt, SessionInfo};
use crate::provider::{ChatMessage, ChatRequest, FinishReason as ProviderFinishReason, LlmProvider, Role as ProviderRole};
use crate::retrieval::build_context_block;
use crate::stream::StreamEvent;

use super::context::MessageContext;

/// UI-facing events one turn emits, in order. A WS handler maps these onto
/// the wire event frames; the non-streaming `TurnRunner` impl below just
/// drains them and keeps the final text.
#[derive(Debug, Clone)]
pub enum TurnEvent {
    StreamStart { message_id: String },
    StreamChunk { message_id: String, text: String },
    ToolCall { name: String, args: serde_json::Value },
    ToolResult { name: String, result: String, is_error: bool },
    /// Always the last event of a turn, success or failure.
    StreamEnd { message_id: String, success: bool, error: Option<String>, truncated: bool },
}

/// Drives turns against a `MessageContext`. One instance per process;
/// `active` tracks every in-flight turn's cancellation token so `chat/abort`
/// can reach it by session id (concurrency model, shared-resource policy).
pub struct Orchestrator<C: MessageContext> {
    ctx: Arc<C>,
    active: DashMap<String, CancellationToken>,
}

impl<C: MessageContext> Orchestrator<C> {
    pub fn new(ctx: Arc<C>) -> Self {
        Self { ctx, active: DashMap::new() }
    }

    /// Cancel the turn currently running for `session_id`, if any. Returns
    /// whether a turn was found and signalled.
    pub fn cancel(&self, session_id: &str) -> bool {
        match self.active.get(session_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    #[instrument(skip(self, events))]
    pub async fn handle_turn(
        &self,
        session_id: &str,
        user_text: &str,
        provider_name: &str,
        model: &str,
        events: mpsc::Sender<TurnEvent>,
    ) -> Result<TurnOutcome> {
        let cancel = CancellationToken::new();
        self.active.insert(session_id.to_string(), cancel.clone());
        let outcome = self.execute_turn(session_id, user_text, provider_name, model, events, cancel).await;
        self.active.remove(session_id);
        outcome
    }

    async fn execute_turn(
        &self,
        session_id: &str,
        user_text: &str,
        provider_name: &str,
        model: &str,
        events: mpsc::Sender<TurnEvent>,
        cancel: CancellationToken,
    ) -> Result<TurnOutcome> {
        if user_text.trim().is_empty() {
            return Err(KernelError::InvalidInput("message has no text and no attachments".to_string()));
        }

        let sessions = self.ctx.sessions();
        let session = match sessions.get_session(session_id) {
            Ok(s) => s,
            Err(_) => sessions.get_or_create_session(session_id, None)?,
        };

        // History strictly before this turn. Messages this turn appends
        // (assistant + tool rounds) are tracked separately and merged back
        // in before each re-send, since a tool round must see its own
        // predecessor's tool results.
        let history_before_turn = sessions.list_messages(session_id)?;

        let user_msg = Message {
            message_id: new_id(),
            session_id: session_id.to_string(),
            role: PersistedRole::User,
            content: user_text.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            status: MessageStatus::Completed,
            error_message: None,
            metadata: MessageMetadata::default(),
            attachments: Vec::new(),
        };
        sessions.append_message(&user_msg)?;

        let provider = self
            .ctx
            .provider(provider_name)
            .ok_or_else(|| KernelError::InvalidInput(format!("unknown provider: {provider_name}")))?;

        let registry = self.ctx.build_tools();
        let tool_schemas = registry.definitions();

        let prefs = self.ctx.preferences().snapshot();
        let info = SessionInfo {
            session_id: session_id.to_string(),
            turn_count: history_before_turn.len() as u32 / 2 + 1,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        let system_prompt = build_system_prompt(&prefs, Some(&info)).to_plain_text();
        let context_block = build_context_block(self.ctx.rag(), user_text).await;

        let max_iterations = self.ctx.agent_config().max_tool_iterations;
        let mut this_turn_messages: Vec<Message> = Vec::new();
        let mut final_text = String::new();
        let mut final_message_id = String::new();
        let mut last_assistant_message_id = String::new();
        let mut turn_error: Option<KernelError> = None;

        'rounds: for _round in 0..max_iterations {
            if cancel.is_cancelled() {
                turn_error = Some(KernelError::Cancelled);
                break;
            }

            let mut history_for_compactor = history_before_turn.clone();
            history_for_compactor.extend(this_turn_messages.clone());

            let (system, raw_messages) = build_messages(
                &system_prompt,
                &history_for_compactor,
                context_block.as_deref(),
                user_text,
                &tool_schemas,
                model,
                CompactorConfig::default(),
            );

            let request = ChatRequest {
                model: model.to_string(),
                system,
                messages: Vec::new(),
                max_tokens: 4096,
                temperature: None,
                tools: tool_schemas.clone(),
                raw_messages: Some(raw_messages),
            };

            let (tx, mut rx) = mpsc::channel::<StreamEvent>(64);
            let send_task = {
                let provider = provider.clone();
                let request = request.clone();
                tokio::spawn(async move { provider.stream(&request, tx).await })
            };

            let assistant_message_id = new_id();
            let assistant_msg = Message {
                message_id: assistant_message_id.clone(),
                session_id: session_id.to_string(),
                role: PersistedRole::Assistant,
                content: String::new(),
                timestamp: chrono::Utc::now().to_rfc3339(),
                status: MessageStatus::Streaming,
                error_message: None,
                metadata: MessageMetadata::default(),
                attachments: Vec::new(),
            };
            sessions.append_message(&assistant_msg)?;
            last_assistant_message_id = assistant_message_id.clone();
            let _ = events
                .send(TurnEvent::StreamStart { message_id: assistant_message_id.clone() })
                .await;

            let mut assistant_text = String::new();
            let mut tool_calls: Vec<ToolCallRecord> = Vec::new();
            let mut round_finish: Option<ProviderFinishReason> = None;

            while let Some(event) = rx.recv().await {
                if cancel.is_cancelled() {
                    turn_error = Some(KernelError::Cancelled);
                    break;
                }
                match event {
                    StreamEvent::Start { .. } | StreamEvent::Thinking { .. } | StreamEvent::ToolCallRequest { .. } => {}
                    StreamEvent::Chunk { text } => {
                        assistant_text.push_str(&text);
                        let _ = events
                            .send(TurnEvent::StreamChunk {
                                message_id: assistant_message_id.clone(),
                                text,
                            })
                            .await;
                    }
                    StreamEvent::ToolCallComplete { tool_call_id, name, args_json } => {
                        tool_calls.push(ToolCallRecord { tool_call_id, name, args_json });
                    }
                    StreamEvent::Usage { .. } => {}
                    StreamEvent::End { finish_reason } => {
                        round_finish = Some(finish_reason);
                        break;
                    }
                    StreamEvent::Error { message, .. } => {
                        turn_error = Some(KernelError::Provider { retryable: false, message });
                        break;
                    }
                }
            }
            // Drop the receiver before joining: if the loop above broke early
            // (cancellation or error) with the stream task still sending,
            // dropping `rx` makes its next `tx.send` fail instead of blocking
            // forever on a full channel.
            drop(rx);
            let _ = send_task.await;

            if let Some(err) = turn_error {
                sessions.update_message(
                    &assistant_message_id,
                    MessagePatch {
                        append_content: None,
                        new_status: Some(MessageStatus::Error),
                        error_message: Some(err.to_string()),
                        merge_metadata: None,
                    },
                )?;
                let _ = events
                    .send(TurnEvent::StreamEnd {
                        message_id: assistant_message_id,
                        success: false,
                        error: Some(err.to_string()),
                        truncated: false,
                    })
                    .await;
                return Err(err);
            }

            match round_finish {
                Some(ProviderFinishReason::ToolCalls) if !tool_calls.is_empty() => {
                    sessions.update_message(
                        &assistant_message_id,
                        MessagePatch {
                            append_content: Some(assistant_text.clone()),
                            new_status: Some(MessageStatus::Completed),
                            error_message: None,
                            merge_metadata: Some(MessageMetadata {
                                tool_calls: Some(tool_calls.clone()),
                                ..Default::default()
                            }),
                        },
                    )?;
                    let mut persisted_assistant = assistant_msg;
                    persisted_assistant.content = assistant_text;
                    persisted_assistant.status = MessageStatus::Completed;
                    persisted_assistant.metadata.tool_calls = Some(tool_calls.clone());
                    this_turn_messages.push(persisted_assistant);

                    for call in &tool_calls {
                        if cancel.is_cancelled() {
                            turn_error = Some(KernelError::Cancelled);
                            break;
                        }

                        let _ = events
                            .send(TurnEvent::ToolCall { name: call.name.clone(), args: call.args_json.clone() })
                            .await;

                        let result = registry.dispatch(&call.name, call.args_json.clone()).await;

                        let _ = events
                            .send(TurnEvent::ToolResult {
                                name: call.name.clone(),
                                result: result.content.clone(),
                                is_error: result.is_error,
                            })
                            .await;

                        let tool_msg = Message {
                            message_id: new_id(),
                            session_id: session_id.to_string(),
                            role: PersistedRole::Tool,
                            content: result.content,
                            timestamp: chrono::Utc::now().to_rfc3339(),
                            status: if result.is_error { MessageStatus::Error } else { MessageStatus::Completed },
                            error_message: None,
                            metadata: MessageMetadata {
                                tool_call_id: Some(call.tool_call_id.clone()),
                                ..Default::default()
                            },
                            attachments: Vec::new(),
                        };
                        sessions.append_message(&tool_msg)?;
                        this_turn_messages.push(tool_msg);
                    }

                    continue 'rounds;
                }
                // `ToolCalls` with no actual calls attached is treated the
                // same as `Stop` — nothing left to dispatch this round.
                Some(ProviderFinishReason::Stop) | Some(ProviderFinishReason::ToolCalls) | None => {
                    sessions.update_message(
                        &assistant_message_id,
                        MessagePatch {
                            append_content: Some(assistant_text.clone()),
                            new_status: Some(MessageStatus::Completed),
                            error_message: None,
                            merge_metadata: None,
                        },
                    )?;
                    final_text = assistant_text;
                    final_message_id = assistant_message_id.clone();
                    let _ = events
                        .send(TurnEvent::StreamEnd {
                            message_id: assistant_message_id,
                            success: true,
                            error: None,
                            truncated: false,
                        })
                        .await;
                    break 'rounds;
                }
                Some(ProviderFinishReason::Length) => {
                    sessions.update_message(
                        &assistant_message_id,
                        MessagePatch {
                            append_content: Some(assistant_text.clone()),
                            new_status: Some(MessageStatus::Completed),
                            error_message: None,
                            merge_metadata: None,
                        },
                    )?;
                    final_text = assistant_text;
                    final_message_id = assistant_message_id.clone();
                    let _ = events
                        .send(TurnEvent::StreamEnd {
                            message_id: assistant_message_id,
                            success: true,
                            error: None,
                            truncated: true,
                        })
                        .await;
                    break 'rounds;
                }
                Some(ProviderFinishReason::Error) => {
                    let err = KernelError::Provider {
                        retryable: false,
                        message: "provider reported an error finish reason".to_string(),
                    };
                    sessions.update_message(
                        &assistant_message_id,
                        MessagePatch {
                            append_content: None,
                            new_status: Some(MessageStatus::Error),
                            error_message: Some(err.to_string()),
                            merge_metadata: None,
                        },
                    )?;
                    let _ = events
                        .send(TurnEvent::StreamEnd {
                            message_id: assistant_message_id,
                            success: false,
                            error: Some(err.to_string()),
                            truncated: false,
                        })
                        .await;
                    return Err(err);
                }
            }
        }

        if let Some(err) = turn_error {
            let _ = events
                .send(TurnEvent::StreamEnd {
                    message_id: last_assistant_message_id,
                    success: false,
                    error: Some(err.to_string()),
                    truncated: false,
                })
                .await;
            return Err(err);
        }
        if final_text.is_empty() {
            let err = KernelError::ResourceExhausted("tool loop exhausted".to_string());
            let _ = events
                .send(TurnEvent::StreamEnd {
                    message_id: last_assistant_message_id,
                    success: false,
                    error: Some(err.to_string()),
                    truncated: false,
                })
                .await;
            return Err(err);
        }

        self.spawn_housekeeping(session_id, &session, provider.clone(), model.to_string());

        Ok(TurnOutcome { message_id: final_message_id, final_text })
    }

    /// Best-effort post-turn work: title refresh, session-chunk indexing,
    /// periodic memory extraction. Never allowed to affect the turn's own
    /// success or failure — failures here are logged and dropped.
    fn spawn_housekeeping(
        &self,
        session_id: &str,
        session: &Session,
        provider: Arc<dyn LlmProvider>,
        model: String,
    ) {
        let ctx = self.ctx.clone();
        let session_id = session_id.to_string();
        let needs_title = session.title.is_none();
        tokio::spawn(async move {
            let history = match ctx.sessions().list_messages(&session_id) {
                Ok(h) => h,
                Err(err) => {
                    warn!(error = %err, "housekeeping: failed to reload history");
                    return;
                }
            };

            if needs_title {
                if let Some(first_user) = history.iter().find(|m| m.role == PersistedRole::User) {
                    generate_title_and_emoji(ctx.as_ref(), &session_id, &first_user.content, provider.as_ref(), &model)
                        .await;
                }
            }

            if history.len() >= 2 {
                let tail = &history[history.len() - 2..];
                let text = tail.iter().map(|m| m.content.as_str()).collect::<Vec<_>>().join("\n");
                let chunk = hearth_rag::build_session_chunk(
                    &session_id,
                    (history.len() - 2) as u32,
                    (history.len() - 1) as u32,
                    text,
                );
                if let Err(err) = ctx.rag().write_chunk(&chunk).await {
                    warn!(error = %err, "housekeeping: failed to index session chunk");
                }
            }

            let turn_count = history.iter().filter(|m| m.role == PersistedRole::User).count() as u32;
            let interval = ctx.agent_config().memory_extraction_interval;
            if interval > 0 && turn_count > 0 && turn_count % interval == 0 {
                extract_memories(ctx.as_ref(), &session_id, &history, provider.as_ref(), &model).await;
            }
        });
    }
}

#[async_trait::async_trait]
impl<C: MessageContext + 'static> TurnRunner for Orchestrator<C> {
    /// Non-streaming entry point used by the scheduler: drains every
    /// `TurnEvent` without forwarding it anywhere and returns the final
    /// outcome once the turn reaches a terminal state.
    async fn run_turn(
        &self,
        session_id: &str,
        input: &str,
        cancel: CancellationToken,
    ) -> Result<TurnOutcome> {
        let prefs = self.ctx.preferences().snapshot();
        let provider_name = prefs.default_provider.clone().unwrap_or_else(|| "openai".to_string());
        let model = prefs.default_model.clone().unwrap_or_else(|| "gpt-4o-mini".to_string());

        let (tx, mut rx) = mpsc::channel::<TurnEvent>(64);
        tokio::spawn(async move { while rx.recv().await.is_some() {} });

        self.active.insert(session_id.to_string(), cancel.clone());
        let outcome = self.execute_turn(session_id, input, &provider_name, &model, tx, cancel).await;
        self.active.remove(session_id);
        outcome
    }
}

#[derive(serde::Deserialize)]
struct ExtractedFact {
    text: String,
    category: String,
    importance: u8,
}

/// Ask the provider to surface memory-worthy facts from the last stretch of
/// conversation and persist the ones clearing the importance bar. Never
/// propagates a failure — extraction is best-effort housekeeping, same as
/// the title refresh and session-chunk indexing it runs alongside.
async fn extract_memories<C: MessageContext>(
    ctx: &C,
    session_id: &str,
    history: &[Message],
    provider: &dyn LlmProvider,
    model: &str,
) {
    let interval = ctx.agent_config().memory_extraction_interval.max(1) as usize;
    let window = (interval * 2).min(history.len());
    let recent = &history[history.len() - window..];
    let transcript = recent
        .iter()
        .map(|m| format!("{}: {}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n");

    let system = "Extract durable facts worth remembering across future conversations \
        from the transcript below: user preferences, stable facts about the user or \
        their home, and decisions made. Reply with a JSON array only, each item shaped \
        as {\"text\": string, \"category\": one of fact|preference|decision|entity|observation|other, \
        \"importance\": integer 1-10}. Reply with an empty array if nothing qualifies."
        .to_string();

    let request = ChatRequest {
        model: model.to_string(),
        system,
        messages: vec![ChatMessage { role: ProviderRole::User, content: transcript }],
        max_tokens: 512,
        temperature: None,
        tools: Vec::new(),
        raw_messages: None,
    };

    let response = match provider.send(&request).await {
        Ok(r) => r,
        Err(err) => {
            warn!(session_id, error = %err, "housekeeping: memory extraction request failed");
            return;
        }
    };

    let facts: Vec<ExtractedFact> = match serde_json::from_str(response.content.trim()) {
        Ok(f) => f,
        Err(err) => {
            warn!(session_id, error = %err, "housekeeping: memory extraction reply wasn't valid JSON");
            return;
        }
    };

    let threshold = ctx.agent_config().memory_importance_threshold;
    for fact in facts {
        if fact.importance < threshold {
            continue;
        }
        let category: hearth_rag::MemoryCategory = match fact.category.parse() {
            Ok(c) => c,
            Err(_) => continue,
        };
        let memory = hearth_rag::Memory {
            memory_id: new_id(),
            text: fact.text,
            category,
            source: hearth_rag::MemorySource::Agent,
            importance: fact.importance.clamp(1, 10),
            created_at: chrono::Utc::now().to_rfc3339(),
            expires_at: None,
        };
        if let Err(err) = ctx.rag().write_memory(&memory).await {
            warn!(session_id, error = %err, "housekeeping: failed to persist extracted memory");
        }
    }
}

#[derive(serde::Deserialize)]
struct TitleAndEmoji {
    title: String,
    emoji: String,
}

/// Best-effort: ask the provider for a short title and a single emoji for a
/// session from its opening message. Either write failing, or the provider
/// call itself failing, just leaves the session with no title/emoji — it is
/// never allowed to surface as a turn error.
async fn generate_title_and_emoji<C: MessageContext>(
    ctx: &C,
    session_id: &str,
    opening_message: &str,
    provider: &dyn LlmProvider,
    model: &str,
) {
    let system = "Given the opening message of a conversation, reply with a JSON object \
        only, shaped as {\"title\": string of 3-6 words summarizing the topic, \"emoji\": \
        a single emoji character representing the topic}. No other text."
        .to_string();

    let request = ChatRequest {
        model: model.to_string(),
        system,
        messages: vec![ChatMessage { role: ProviderRole::User, content: opening_message.to_string() }],
        max_tokens: 64,
        temperature: None,
        tools: Vec::new(),
        raw_messages: None,
    };

    let response = match provider.send(&request).await {
        Ok(r) => r,
        Err(err) => {
            warn!(session_id, error = %err, "housekeeping: title/emoji request failed");
            return;
        }
    };

    let parsed: TitleAndEmoji = match serde_json::from_str(response.content.trim()) {
        Ok(p) => p,
        Err(err) => {
            warn!(session_id, error = %err, "housekeeping: title/emoji reply wasn't valid JSON");
            return;
        }
    };

    if let Err(err) = ctx.sessions().set_session_title(session_id, parsed.title.trim()) {
        warn!(session_id, error = %err, "housekeeping: failed to set session title");
    }
    if let Err(err) = ctx.sessions().set_session_emoji(session_id, parsed.emoji.trim()) {
        warn!(session_id, error = %err, "housekeeping: failed to set session emoji");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use hearth_core::KernelError as CoreError;
    use hearth_rag::{init_db as init_rag_db, EmbeddingGenerator, EmbeddingProvider};
    use hearth_sessions::init_db as init_sessions_db;
    use rusqlite::Connection;

    use crate::home::{HomeHandle, MockHome};
    use crate::provider::{ChatResponse, FinishReason as PFinishReason, LlmProvider, ProviderError, ToolCall};
    use crate::tools::ToolRegistry;

    struct NoopRunner;

    #[async_trait::async_trait]
    impl TurnRunner for NoopRunner {
        async fn run_turn(&self, _: &str, _: &str, _: CancellationToken) -> Result<TurnOutcome> {
            Err(CoreError::Internal("not used in test".to_string()))
        }
    }

    fn fresh_rag() -> Arc<hearth_rag::RagStore> {
        let conn = Connection::open_in_memory().unwrap();
        init_rag_db(&conn).unwrap();
        let embedder = EmbeddingGenerator::new(
            EmbeddingProvider::HashBased { dimension: 16 },
            16,
            std::time::Duration::from_secs(5),
        );
        Arc::new(hearth_rag::RagStore::new(conn, embedder))
    }

    fn fresh_scheduler() -> Arc<hearth_scheduler::SchedulerHandle> {
        let conn = Connection::open_in_memory().unwrap();
        let runner: Arc<dyn TurnRunner> = Arc::new(NoopRunner);
        Arc::new(hearth_scheduler::SchedulerHandle::new(conn, runner).unwrap())
    }

    /// Provider whose responses are scripted by call count, same idiom the
    /// tool loop's own tests use.
    struct ScriptedProvider {
        calls: AtomicUsize,
        responses: Vec<ChatResponse>,
    }

    #[async_trait::async_trait]
    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn send(&self, _req: &ChatRequest) -> std::result::Result<ChatResponse, ProviderError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.responses[call.min(self.responses.len() - 1)].clone())
        }
    }

    struct TestContext {
        sessions: hearth_sessions::SessionStore,
        rag: Arc<hearth_rag::RagStore>,
        scheduler: Arc<hearth_scheduler::SchedulerHandle>,
        home: Arc<dyn HomeHandle>,
        preferences: hearth_sessions::PreferencesStore,
        agent_config: hearth_core::config::AgentConfig,
        provider: Arc<dyn LlmProvider>,
    }

    impl MessageContext for TestContext {
        fn sessions(&self) -> &hearth_sessions::SessionStore {
            &self.sessions
        }
        fn rag(&self) -> &Arc<hearth_rag::RagStore> {
            &self.rag
        }
        fn scheduler(&self) -> &Arc<hearth_scheduler::SchedulerHandle> {
            &self.scheduler
        }
        fn home(&self) -> &Arc<dyn HomeHandle> {
            &self.home
        }
        fn preferences(&self) -> &hearth_sessions::PreferencesStore {
            &self.preferences
        }
        fn agent_config(&self) -> &hearth_core::config::AgentConfig {
            &self.agent_config
        }
        fn provider(&self, _name: &str) -> Option<Arc<dyn LlmProvider>> {
            Some(self.provider.clone())
        }
        fn build_tools(&self) -> ToolRegistry {
            ToolRegistry::new(vec![Box::new(crate::tools::memory::RecallTool::new(self.rag.clone()))])
        }
    }

    fn test_ctx(provider: Arc<dyn LlmProvider>) -> Arc<TestContext> {
        let sessions_conn = Connection::open_in_memory().unwrap();
        init_sessions_db(&sessions_conn).unwrap();
        let prefs_conn = Connection::open_in_memory().unwrap();
        init_sessions_db(&prefs_conn).unwrap();

        Arc::new(TestContext {
            sessions: hearth_sessions::SessionStore::new(sessions_conn),
            rag: fresh_rag(),
            scheduler: fresh_scheduler(),
            home: Arc::new(MockHome::new()),
            preferences: hearth_sessions::PreferencesStore::load(prefs_conn).unwrap(),
            agent_config: hearth_core::config::AgentConfig::default(),
            provider,
        })
    }

    fn stop_response(text: &str) -> ChatResponse {
        ChatResponse {
            content: text.to_string(),
            model: "scripted".to_string(),
            prompt_tokens: 10,
            completion_tokens: 5,
            finish_reason: PFinishReason::Stop,
            tool_calls: vec![],
        }
    }

    #[tokio::test]
    async fn plain_conversational_turn_persists_and_returns_final_text() {
        let provider = Arc::new(ScriptedProvider {
            calls: AtomicUsize::new(0),
            responses: vec![stop_response("hello there")],
        });
        let ctx = test_ctx(provider);
        let orchestrator = Orchestrator::new(ctx.clone());

        let (tx, mut rx) = mpsc::channel(64);
        tokio::spawn(async move { while rx.recv().await.is_some() {} });

        let outcome = orchestrator
            .handle_turn("session-1", "hi", "scripted", "scripted-model", tx)
            .await
            .unwrap();
        assert_eq!(outcome.final_text, "hello there");

        let history = ctx.sessions.list_messages("session-1").unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, PersistedRole::User);
        assert_eq!(history[1].role, PersistedRole::Assistant);
        assert_eq!(history[1].status, MessageStatus::Completed);
    }

    #[tokio::test]
    async fn tool_round_persists_paired_assistant_and_tool_messages() {
        let tool_call_response = ChatResponse {
            content: String::new(),
            model: "scripted".to_string(),
            prompt_tokens: 10,
            completion_tokens: 5,
            finish_reason: PFinishReason::ToolCalls,
            tool_calls: vec![ToolCall {
                id: "call_1".to_string(),
                name: "recall".to_string(),
                input: serde_json::json!({"query": "anything"}),
            }],
        };
        let provider = Arc::new(ScriptedProvider {
            calls: AtomicUsize::new(0),
            responses: vec![tool_call_response, stop_response("done")],
        });
        let ctx = test_ctx(provider);
        let orchestrator = Orchestrator::new(ctx.clone());

        let (tx, mut rx) = mpsc::channel(64);
        tokio::spawn(async move { while rx.recv().await.is_some() {} });

        let outcome = orchestrator
            .handle_turn("session-2", "what do you remember?", "scripted", "scripted-model", tx)
            .await
            .unwrap();
        assert_eq!(outcome.final_text, "done");

        let history = ctx.sessions.list_messages("session-2").unwrap();
        // user, assistant(tool_calls), tool, assistant(final)
        assert_eq!(history.len(), 4);
        assert_eq!(history[1].role, PersistedRole::Assistant);
        assert!(history[1].metadata.tool_calls.is_some());
        assert_eq!(history[2].role, PersistedRole::Tool);
        assert_eq!(
            history[2].metadata.tool_call_id.as_deref(),
            Some("call_1")
        );
        assert_eq!(history[3].role, PersistedRole::Assistant);
    }

    #[tokio::test]
    async fn tool_loop_exhaustion_is_resource_exhausted() {
        let always_tool_call = ChatResponse {
            content: String::new(),
            model: "scripted".to_string(),
            prompt_tokens: 1,
            completion_tokens: 1,
            finish_reason: PFinishReason::ToolCalls,
            tool_calls: vec![ToolCall {
                id: "call_x".to_string(),
                name: "recall".to_string(),
                input: serde_json::json!({"query": "x"}),
            }],
        };
        let provider = Arc::new(ScriptedProvider {
            calls: AtomicUsize::new(0),
            responses: vec![always_tool_call],
        });
        let mut ctx = test_ctx(provider);
        Arc::get_mut(&mut ctx).unwrap().agent_config.max_tool_iterations = 2;

        let orchestrator = Orchestrator::new(ctx);
        let (tx, mut rx) = mpsc::channel(64);
        tokio::spawn(async move { while rx.recv().await.is_some() {} });

        let err = orchestrator
            .handle_turn("session-3", "loop forever", "scripted", "scripted-model", tx)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::ResourceExhausted(_)));
    }

    #[tokio::test]
    async fn memory_extraction_runs_on_the_configured_turn_interval() {
        struct ExtractingProvider {
            calls: AtomicUsize,
        }

        #[async_trait::async_trait]
        impl LlmProvider for ExtractingProvider {
            fn name(&self) -> &str {
                "scripted"
            }

            async fn send(&self, req: &ChatRequest) -> std::result::Result<ChatResponse, ProviderError> {
                let call = self.calls.fetch_add(1, Ordering::SeqCst);
                if req.system.contains("Extract durable facts") {
                    return Ok(ChatResponse {
                        content: serde_json::json!([
                            {"text": "user prefers Celsius", "category": "preference", "importance": 8}
                        ])
                        .to_string(),
                        model: "scripted".to_string(),
                        prompt_tokens: 1,
                        completion_tokens: 1,
                        finish_reason: PFinishReason::Stop,
                        tool_calls: vec![],
                    });
                }
                let _ = call;
                Ok(ChatResponse {
                    content: "ok".to_string(),
                    model: "scripted".to_string(),
                    prompt_tokens: 1,
                    completion_tokens: 1,
                    finish_reason: PFinishReason::Stop,
                    tool_calls: vec![],
                })
            }
        }

        let provider = Arc::new(ExtractingProvider { calls: AtomicUsize::new(0) });
        let mut ctx = test_ctx(provider);
        Arc::get_mut(&mut ctx).unwrap().agent_config.memory_extraction_interval = 1;
        let rag = ctx.rag.clone();

        let orchestrator = Orchestrator::new(ctx);
        let (tx, mut rx) = mpsc::channel(64);
        tokio::spawn(async move { while rx.recv().await.is_some() {} });

        orchestrator
            .handle_turn("session-4", "what's the weather", "scripted", "scripted-model", tx)
            .await
            .unwrap();

        // Housekeeping is fire-and-forget; give it a tick to run.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let hits = rag.search("temperature units", 5, Some(hearth_rag::Tag::Memory)).await;
        assert!(hits.iter().any(|h| h.payload.get("text").and_then(|v| v.as_str()) == Some("user prefers Celsius")));
    }

    #[tokio::test]
    async fn cancel_reaches_an_active_turn_by_session_id() {
        let provider = Arc::new(ScriptedProvider {
            calls: AtomicUsize::new(0),
            responses: vec![stop_response("ok")],
        });
        let ctx = test_ctx(provider);
        let orchestrator = Orchestrator::new(ctx);

        assert!(!orchestrator.cancel("never-started"));
    }
}
