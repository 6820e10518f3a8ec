use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Validation,
    Conflict,
    Internal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Errors the relay reports back to a client inside a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(rename_all = "snake_case")]
pub enum ChatError {
    #[error("recipient is not online")]
    UserNotOnline,
    #[error("recipient is not keeping up; message dropped")]
    RecipientBusy,
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("failed to decode chat message '{raw}': {source}")]
    Decode {
        raw: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode chat message: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("invalid username '{name}': {reason}")]
    InvalidUsername { name: String, reason: &'static str },
}

impl From<ProtocolError> for ApiError {
    fn from(value: ProtocolError) -> Self {
        let code = match value {
            ProtocolError::InvalidUsername { .. } | ProtocolError::Decode { .. } => {
                ErrorCode::Validation
            }
            ProtocolError::Encode(_) => ErrorCode::Internal,
        };
        Self {
            code,
            message: value.to_string(),
        }
    }
}
