use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl MessageRole {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::System => "system",
        }
    }

    pub fn is_user(self) -> bool {
        self == MessageRole::User
    }

    pub fn is_assistant(self) -> bool {
        self == MessageRole::Assistant
    }
}

impl AsRef<str> for MessageRole {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl TryFrom<&str> for MessageRole {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            "system" => Ok(MessageRole::System),
            _ => Err(format!("invalid message role: {value}")),
        }
    }
}

impl TryFrom<String> for MessageRole {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

impl From<MessageRole> for String {
    fn from(value: MessageRole) -> Self {
        value.as_str().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(id: impl Into<String>, role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role,
            content: content.into(),
        }
    }

    pub fn user(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(id, MessageRole::User, content)
    }

    pub fn assistant(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(id, MessageRole::Assistant, content)
    }
}

/// Messages of one chat view plus the bookkeeping for the stream feeding it.
///
/// Messages sit behind `Arc` so that cloning the state is cheap and a fold
/// only reallocates the message it actually touches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageListState {
    pub messages: Vec<Arc<ChatMessage>>,
    /// Message currently receiving deltas. At most one at a time.
    pub streaming_message_id: Option<String>,
    /// Tool or task the assistant is running right now.
    pub active_assistant_task: Option<String>,
}

impl MessageListState {
    pub fn with_messages(messages: impl IntoIterator<Item = ChatMessage>) -> Self {
        Self {
            messages: messages.into_iter().map(Arc::new).collect(),
            ..Default::default()
        }
    }

    pub fn find(&self, id: &str) -> Option<&ChatMessage> {
        self.messages
            .iter()
            .find(|message| message.id == id)
            .map(Arc::as_ref)
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(Arc::new(message));
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming_message_id.is_some()
    }

    /// Drop a trailing assistant placeholder that never received content.
    pub fn remove_trailing_empty_assistant(&mut self) {
        while self
            .messages
            .last()
            .is_some_and(|m| m.role.is_assistant() && m.content.is_empty())
        {
            self.messages.pop();
        }
    }
}
