use serde::{Deserialize, Serialize};

/// Generate a fresh time-sortable id. UUIDv7 keeps ids correlatable in logs
/// and naturally ordered without a separate `created_at` lookup.
pub fn new_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

/// Role of a message within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Tool,
    System,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
            Role::System => "system",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "tool" => Ok(Role::Tool),
            "system" => Ok(Role::System),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// A message's lifecycle state. Transitions only move forward:
/// `pending -> streaming -> {completed | error}`. Never reverses (I-invariant
/// enforced by the Session Store on `update_message`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Pending,
    Streaming,
    Completed,
    Error,
}

impl MessageStatus {
    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: MessageStatus) -> bool {
        use MessageStatus::*;
        if self == next {
            return true;
        }
        matches!(
            (self, next),
            (Pending, Streaming)
                | (Pending, Completed)
                | (Pending, Error)
                | (Streaming, Completed)
                | (Streaming, Error)
        )
    }
}

impl std::fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MessageStatus::Pending => "pending",
            MessageStatus::Streaming => "streaming",
            MessageStatus::Completed => "completed",
            MessageStatus::Error => "error",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for MessageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(MessageStatus::Pending),
            "streaming" => Ok(MessageStatus::Streaming),
            "completed" => Ok(MessageStatus::Completed),
            "error" => Ok(MessageStatus::Error),
            other => Err(format!("unknown message status: {other}")),
        }
    }
}

/// Why a provider stopped generating. Mirrors `End.finish_reason` on the
/// streaming contract (Provider Adapter, spec 4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    ToolCalls,
    Length,
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_transitions_never_reverse() {
        assert!(MessageStatus::Pending.can_transition_to(MessageStatus::Streaming));
        assert!(MessageStatus::Streaming.can_transition_to(MessageStatus::Completed));
        assert!(!MessageStatus::Completed.can_transition_to(MessageStatus::Streaming));
        assert!(!MessageStatus::Error.can_transition_to(MessageStatus::Pending));
    }

    #[test]
    fn role_round_trips_through_display_and_parse() {
        for role in [Role::User, Role::Assistant, Role::Tool, Role::System] {
            let parsed: Role = role.to_string().parse().unwrap();
            assert_eq!(parsed, role);
        }
    }
}
