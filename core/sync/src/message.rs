use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    System,
    User,
    Assistant,
    /// Result of an oracle function / tool call
    FunctionResult,
    /// Role string the client does not know; kept so indices stay aligned
    Other(String),
}

impl Role {
    pub fn parse(role: &str) -> Self {
        match role {
            "system" => Role::System,
            "user" => Role::User,
            "assistant" => Role::Assistant,
            "function" => Role::FunctionResult,
            other => Role::Other(other.to_string()),
        }
    }

    /// Only user and assistant turns are shown in the conversation
    pub fn is_visible(&self) -> bool {
        matches!(self, Role::User | Role::Assistant)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::FunctionResult => "function",
            Role::Other(other) => other,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Result of one incremental fetch.
///
/// `consumed` counts raw on-chain entries read from `since_index`, including
/// the filtered-out ones, so the cursor can advance by it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageBatch {
    pub since_index: usize,
    pub consumed: usize,
    pub messages: Vec<Message>,
}

impl MessageBatch {
    pub fn next_cursor(&self) -> usize {
        self.since_index + self.consumed
    }

    pub fn is_empty(&self) -> bool {
        self.consumed == 0
    }
}
