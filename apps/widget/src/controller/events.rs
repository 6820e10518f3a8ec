//! Host/backend events delivered to the widget and error modeling for them.

/// Events the host raises for the view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    ChatMessage { from: Option<String>, text: String },
    Send,
    OnlineUsers(Vec<String>),
}

#[derive(Debug, Clone)]
pub enum UiEvent {
    Host(HostEvent),
    Connected { identity: String },
    Info(String),
    Error(UiError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorCategory {
    Transport,
    Validation,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorContext {
    BackendStartup,
    Connect,
    SendMessage,
    Settings,
}

#[derive(Debug, Clone)]
pub struct UiError {
    category: UiErrorCategory,
    context: UiErrorContext,
    message: String,
}

impl UiError {
    pub fn from_message(context: UiErrorContext, message: impl Into<String>) -> Self {
        let message = message.into();
        let message_lower = message.to_ascii_lowercase();
        let category = if message_lower.contains("invalid")
            || message_lower.contains("missing")
            || message_lower.contains("malformed")
            || message_lower.contains("unsupported")
            || message_lower.contains("empty")
        {
            UiErrorCategory::Validation
        } else if message_lower.contains("timeout")
            || message_lower.contains("timed out")
            || message_lower.contains("connect")
            || message_lower.contains("connection")
            || message_lower.contains("refused")
            || message_lower.contains("not online")
            || message_lower.contains("disconnect")
            || message_lower.contains("websocket")
        {
            UiErrorCategory::Transport
        } else {
            UiErrorCategory::Unknown
        };

        Self {
            category,
            context,
            message,
        }
    }

    pub fn category(&self) -> UiErrorCategory {
        self.category
    }

    pub fn context(&self) -> UiErrorContext {
        self.context
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// One-line text for the widget's status line.
    pub fn status_line(&self) -> String {
        let label = match self.category {
            UiErrorCategory::Transport => "Connection",
            UiErrorCategory::Validation => "Invalid input",
            UiErrorCategory::Unknown => "Error",
        };
        format!("{label}: {}", self.message)
    }
}
