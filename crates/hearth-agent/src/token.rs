//! Advisory token counting used only by the Compactor — the authoritative
//! count is whatever the provider reports back on `Usage`.

use crate::provider::{ChatMessage, ToolDefinition};

const PER_MESSAGE_OVERHEAD: usize = 4;

/// `ceil(len(text)/4)` — the same cheap heuristic every provider's own
/// estimator starts from before a model-specific tokenizer is registered.
pub fn estimate(text: &str, _model: &str) -> usize {
    (text.chars().count() + 3) / 4
}

pub fn estimate_messages(messages: &[ChatMessage], model: &str) -> usize {
    messages
        .iter()
        .map(|m| estimate(&m.content, model) + PER_MESSAGE_OVERHEAD)
        .sum()
}

pub fn estimate_tools(tools: &[ToolDefinition], model: &str) -> usize {
    tools
        .iter()
        .map(|t| {
            let schema_str = t.input_schema.to_string();
            estimate(&schema_str, model) + estimate(&t.description, model)
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Role;

    #[test]
    fn estimate_scales_with_length() {
        assert_eq!(estimate("", "any"), 0);
        assert_eq!(estimate("abcd", "any"), 1);
        assert_eq!(estimate("abcdefgh", "any"), 2);
    }

    #[test]
    fn estimate_messages_includes_overhead_per_message() {
        let messages = vec![
            ChatMessage { role: Role::User, content: "hi".to_string() },
            ChatMessage { role: Role::Assistant, content: "hello".to_string() },
        ];
        let total = estimate_messages(&messages, "any");
        assert!(total > estimate("hi", "any") + estimate("hello", "any"));
    }
}
