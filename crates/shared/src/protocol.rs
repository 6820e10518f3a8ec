use serde::{Deserialize, Serialize};

use crate::{
    domain::SERVER_IDENTITY,
    error::{ChatError, ProtocolError},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum MessageContent {
    Close,
    Prompt(String),
    GetUsersList,
    ListUsers(Vec<String>),
    Error(ChatError),
}

/// A single frame on the relay websocket. `from`/`to` are usernames; both are
/// empty for requests addressed to the relay itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub from: String,
    pub to: String,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn new(from: impl Into<String>, to: impl Into<String>, content: MessageContent) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            content,
        }
    }

    pub fn prompt(from: impl Into<String>, to: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(from, to, MessageContent::Prompt(text.into()))
    }

    pub fn get_users_list() -> Self {
        Self::new("", "", MessageContent::GetUsersList)
    }

    pub fn close() -> Self {
        Self::new("", "", MessageContent::Close)
    }

    pub fn from_server(to: impl Into<String>, content: MessageContent) -> Self {
        Self::new(SERVER_IDENTITY, to, content)
    }

    pub fn is_close(&self) -> bool {
        matches!(self.content, MessageContent::Close)
    }
}

pub fn encode(message: &ChatMessage) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(message)?)
}

pub fn decode(raw: &str) -> Result<ChatMessage, ProtocolError> {
    serde_json::from_str(raw).map_err(|source| ProtocolError::Decode {
        raw: raw.to_string(),
        source,
    })
}
