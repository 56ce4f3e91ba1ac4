use serde::{Deserialize, Serialize};

/// Who authored a message. The system prompt travels as a separate
/// parameter on provider calls, and tool results ride in user messages, so
/// only these two roles exist internally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}
