//! System prompt assembly — the Compactor's pinned head (§4.6 item 1):
//! identity, rules, language, and tool-use guidance.
//!
//! Split into a static tier (identical for every turn in an installation)
//! and a volatile tier (current session facts: turn count, timestamp) so a
//! caching-aware provider could in principle keep the static tier's prefix
//! stable; this implementation doesn't wire up provider-side caching, it
//! just keeps the separation so that's a later addition, not a rewrite.

use hearth_sessions::Preferences;

use crate::tools::tool_catalog;

#[derive(Debug, Clone)]
pub struct SystemPrompt {
    pub static_tier: String,
    pub volatile_tier: String,
}

impl SystemPrompt {
    pub fn to_plain_text(&self) -> String {
        if self.volatile_tier.is_empty() {
            self.static_tier.clone()
        } else {
            format!("{}\n\n{}", self.static_tier, self.volatile_tier)
        }
    }
}

/// Session facts injected into the volatile tier.
pub struct SessionInfo {
    pub session_id: String,
    pub turn_count: u32,
    pub timestamp: String,
}

/// Build the static identity/rules/tool-use tier from configured
/// preferences. Stable across turns for a given preference snapshot.
fn build_static_tier(prefs: &Preferences) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "You are {}, a conversational agent that controls a smart home.\n",
        prefs.agent_name
    ));
    if let Some(personality) = &prefs.agent_personality {
        out.push_str(personality);
        out.push('\n');
    }
    out.push_str(&format!("Respond in {}.\n\n", prefs.language));
    out.push_str(
        "Rules:\n\
         - Use tools to read or change real device state; never claim an action succeeded without calling the matching tool.\n\
         - Prefer the narrowest tool that answers the question (get_state before list_entities).\n\
         - When a request implies a recurring or future action, use schedule_job instead of promising to remember it yourself.\n\
         - If a tool call fails, explain the failure to the user in plain language; do not retry blindly.\n\n",
    );
    out.push_str("Available tools:\n");
    for (name, description) in tool_catalog() {
        out.push_str(&format!("- {name}: {description}\n"));
    }
    out
}

fn build_volatile_tier(info: &SessionInfo) -> String {
    format!(
        "Session {} — turn {} — current time {}.",
        info.session_id, info.turn_count, info.timestamp
    )
}

pub fn build_system_prompt(prefs: &Preferences, info: Option<&SessionInfo>) -> SystemPrompt {
    SystemPrompt {
        static_tier: build_static_tier(prefs),
        volatile_tier: info.map(build_volatile_tier).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_tier_lists_every_catalog_tool() {
        let prefs = Preferences::default();
        let prompt = build_system_prompt(&prefs, None);
        assert!(prompt.static_tier.contains("schedule_job"));
        assert!(prompt.static_tier.contains("get_state"));
        assert!(prompt.volatile_tier.is_empty());
    }

    #[test]
    fn volatile_tier_carries_session_info() {
        let prefs = Preferences::default();
        let info = SessionInfo {
            session_id: "abc".to_string(),
            turn_count: 3,
            timestamp: "2026-01-01 00:00 UTC".to_string(),
        };
        let prompt = build_system_prompt(&prefs, Some(&info));
        assert!(prompt.to_plain_text().contains("turn 3"));
    }
}
