use serde::{Deserialize, Serialize};

/// Body of `POST /conversations/{id}/messages`.
///
/// `None` serializes as JSON `null`, meaning "not attached". The fields are
/// never skipped: the backend must see the difference between an absent
/// attachment and an empty one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub text: String,
    pub code: Option<String>,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
}

impl SendMessageRequest {
    /// A text-only message with nothing attached.
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            code: None,
            stdout: None,
            stderr: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One persisted conversation message as returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: MessageRole,
    #[serde(alias = "content")]
    pub text: String,
    #[serde(default, alias = "attachedCode")]
    pub attached_code: Option<String>,
}

/// Ordered conversation history; the backend is its source of truth.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    #[serde(default)]
    pub messages: Vec<ConversationMessage>,
}
