//! Context Compactor — turns a session's full history plus a new user
//! message into the exact request handed to the Provider Adapter, subject
//! to a token budget.
//!
//! Tool exchanges are reconstructed as Anthropic-shaped content blocks (the
//! same shape the tool loop itself builds) rather than plain role/content
//! pairs, since a tool-call round trip can't be represented as one message
//! per the provider's own `ChatMessage` type.

use hearth_core::Role as PersistedRole;
use hearth_sessions::Message;
use tracing::debug;

use crate::provider::ToolDefinition;
use crate::token::{estimate, estimate_tools};

pub const DEFAULT_CONTEXT_WINDOW: usize = 128_000;
pub const DEFAULT_RESERVE_TOKENS: usize = 2048;

#[derive(Debug, Clone, Copy)]
pub struct CompactorConfig {
    pub context_window: usize,
    pub reserve_tokens: usize,
}

impl Default for CompactorConfig {
    fn default() -> Self {
        Self {
            context_window: DEFAULT_CONTEXT_WINDOW,
            reserve_tokens: DEFAULT_RESERVE_TOKENS,
        }
    }
}

/// One unit of history that is included or dropped as a whole. A tool
/// message can never be separated from the assistant message that
/// requested it (§4.6).
enum Group<'a> {
    Single(&'a Message),
    ToolRound {
        assistant: &'a Message,
        tool_results: Vec<&'a Message>,
    },
}

impl Group<'_> {
    fn original_message_count(&self) -> usize {
        match self {
            Group::Single(_) => 1,
            Group::ToolRound { tool_results, .. } => 1 + tool_results.len(),
        }
    }

    fn estimated_tokens(&self, model: &str) -> usize {
        match self {
            Group::Single(m) => estimate(&m.content, model) + 4,
            Group::ToolRound { assistant, tool_results } => {
                let mut total = estimate(&assistant.content, model) + 4;
                for t in tool_results {
                    total += estimate(&t.content, model) + 4;
                }
                total
            }
        }
    }

    fn to_raw_messages(&self) -> Vec<serde_json::Value> {
        match self {
            Group::Single(m) => vec![serde_json::json!({
                "role": m.role.to_string(),
                "content": m.content,
            })],
            Group::ToolRound { assistant, tool_results } => {
                let mut assistant_content: Vec<serde_json::Value> = Vec::new();
                if !assistant.content.is_empty() {
                    assistant_content.push(serde_json::json!({
                        "type": "text",
                        "text": assistant.content,
                    }));
                }
                if let Some(calls) = &assistant.metadata.tool_calls {
                    for call in calls {
                        assistant_content.push(serde_json::json!({
                            "type": "tool_use",
                            "id": call.tool_call_id,
                            "name": call.name,
                            "input": call.args_json,
                        }));
                    }
                }

                let tool_result_content: Vec<serde_json::Value> = tool_results
                    .iter()
                    .map(|t| {
                        serde_json::json!({
                            "type": "tool_result",
                            "tool_use_id": t.metadata.tool_call_id.clone().unwrap_or_default(),
                            "content": t.content,
                            "is_error": t.status == hearth_core::MessageStatus::Error,
                        })
                    })
                    .collect();

                vec![
                    serde_json::json!({ "role": "assistant", "content": assistant_content }),
                    serde_json::json!({ "role": "user", "content": tool_result_content }),
                ]
            }
        }
    }
}

/// Group messages oldest-to-newest, folding each assistant+following-tool-run
/// into one `ToolRound`.
fn group_history(history: &[Message]) -> Vec<Group<'_>> {
    let mut groups = Vec::new();
    let mut i = 0;
    while i < history.len() {
        let msg = &history[i];
        if msg.role == PersistedRole::Assistant && msg.metadata.tool_calls.is_some() {
            let mut j = i + 1;
            let mut tool_results = Vec::new();
            while j < history.len() && history[j].role == PersistedRole::Tool {
                tool_results.push(&history[j]);
                j += 1;
            }
            groups.push(Group::ToolRound { assistant: msg, tool_results });
            i = j;
        } else {
            groups.push(Group::Single(msg));
            i += 1;
        }
    }
    groups
}

/// Build the exact list of raw provider messages for one turn.
///
/// `history` is the session's persisted messages in chronological order, not
/// yet including `new_user_text`. Returns `(system, raw_messages)` ready to
/// drop into `ChatRequest::system` / `ChatRequest::raw_messages`.
pub fn build_messages(
    system_prompt: &str,
    history: &[Message],
    context_block: Option<&str>,
    new_user_text: &str,
    tool_schemas: &[ToolDefinition],
    model: &str,
    config: CompactorConfig,
) -> (String, Vec<serde_json::Value>) {
    let system = match context_block {
        Some(block) if !block.is_empty() => format!("{system_prompt}\n\n{block}"),
        _ => system_prompt.to_string(),
    };

    let reserve = config.reserve_tokens
        + estimate(new_user_text, model)
        + estimate_tools(tool_schemas, model);
    let system_tokens = estimate(&system, model);
    let budget = config
        .context_window
        .saturating_sub(system_tokens)
        .saturating_sub(reserve);

    let groups = group_history(history);

    // Walk from the most recent group backward, keeping the suffix that fits
    // — the tie-break toward the most recent slice the spec calls for.
    let mut included_from = groups.len();
    let mut used = 0usize;
    for (idx, group) in groups.iter().enumerate().rev() {
        let cost = group.estimated_tokens(model);
        if used + cost > budget {
            break;
        }
        used += cost;
        included_from = idx;
    }

    let omitted_message_count: usize = groups[..included_from]
        .iter()
        .map(Group::original_message_count)
        .sum();

    let mut raw_messages: Vec<serde_json::Value> = Vec::new();
    if omitted_message_count > 0 {
        debug!(omitted_message_count, "compactor omitted earlier messages");
        raw_messages.push(serde_json::json!({
            "role": "system",
            "content": format!("[{omitted_message_count} earlier messages omitted]"),
        }));
    }
    for group in &groups[included_from..] {
        raw_messages.extend(group.to_raw_messages());
    }
    raw_messages.push(serde_json::json!({
        "role": "user",
        "content": new_user_text,
    }));

    (system, raw_messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_core::{new_id, MessageStatus};
    use hearth_sessions::{MessageMetadata, ToolCallRecord};

    fn msg(role: PersistedRole, content: &str) -> Message {
        Message {
            message_id: new_id(),
            session_id: "s1".to_string(),
            role,
            content: content.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            status: MessageStatus::Completed,
            error_message: None,
            metadata: MessageMetadata::default(),
            attachments: Vec::new(),
        }
    }

    #[test]
    fn short_history_fits_whole_with_tail_appended() {
        let history = vec![
            msg(PersistedRole::User, "turn on the lights"),
            msg(PersistedRole::Assistant, "done"),
        ];
        let (system, raw) = build_messages(
            "you are Hearth",
            &history,
            None,
            "thanks",
            &[],
            "any",
            CompactorConfig::default(),
        );
        assert_eq!(system, "you are Hearth");
        assert_eq!(raw.len(), 3);
        assert_eq!(raw.last().unwrap()["content"], "thanks");
    }

    #[test]
    fn context_block_is_appended_to_system() {
        let (system, _) = build_messages(
            "you are Hearth",
            &[],
            Some("## Relevant context\n- kitchen light is on"),
            "hi",
            &[],
            "any",
            CompactorConfig::default(),
        );
        assert!(system.contains("Relevant context"));
    }

    #[test]
    fn overflowing_history_is_replaced_by_an_ellipsis_prefix() {
        let mut history = Vec::new();
        for i in 0..50 {
            history.push(msg(PersistedRole::User, &format!("filler message number {i} padded out with extra words to cost tokens")));
            history.push(msg(PersistedRole::Assistant, "ok"));
        }
        let tiny_budget = CompactorConfig {
            context_window: 200,
            reserve_tokens: 20,
        };
        let (_, raw) = build_messages("sys", &history, None, "latest question", &[], "any", tiny_budget);
        assert_eq!(raw[0]["role"], "system");
        assert!(raw[0]["content"].as_str().unwrap().contains("omitted"));
        assert_eq!(raw.last().unwrap()["content"], "latest question");
    }

    #[test]
    fn budget_exactly_equal_to_history_cost_omits_nothing() {
        let history = vec![msg(PersistedRole::User, "hi"), msg(PersistedRole::Assistant, "hello")];
        let system_tokens = estimate("sys", "any");
        let tail_tokens = estimate("thanks", "any");
        let exact_cost: usize = group_history(&history).iter().map(|g| g.estimated_tokens("any")).sum();
        let tight = CompactorConfig {
            context_window: system_tokens + exact_cost + tail_tokens,
            reserve_tokens: 0,
        };
        let (_, raw) = build_messages("sys", &history, None, "thanks", &[], "any", tight);
        assert_eq!(raw.len(), history.len() + 1);
        assert_ne!(raw[0]["role"], "system");
    }

    #[test]
    fn tool_round_is_kept_or_dropped_as_one_unit() {
        let mut assistant = msg(PersistedRole::Assistant, "checking");
        assistant.metadata = MessageMetadata {
            tool_calls: Some(vec![ToolCallRecord {
                tool_call_id: "call_1".to_string(),
                name: "get_state".to_string(),
                args_json: serde_json::json!({"entity_id": "light.kitchen"}),
            }]),
            ..Default::default()
        };
        let mut tool_msg = msg(PersistedRole::Tool, "{\"state\":\"on\"}");
        tool_msg.metadata.tool_call_id = Some("call_1".to_string());

        let history = vec![
            msg(PersistedRole::User, "is the kitchen light on"),
            assistant,
            tool_msg,
            msg(PersistedRole::Assistant, "yes, it's on"),
        ];
        let (_, raw) = build_messages("sys", &history, None, "turn it off", &[], "any", CompactorConfig::default());
        // user + (assistant,tool_result) pair + final assistant + tail = 5
        assert_eq!(raw.len(), 5);
        assert_eq!(raw[2]["role"], "user");
        assert_eq!(raw[2]["content"][0]["tool_use_id"], "call_1");
    }
}
