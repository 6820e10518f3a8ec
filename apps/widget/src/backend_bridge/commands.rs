//! Backend commands queued from UI to backend worker.

use client_core::Settings;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCommand {
    Connect(Settings),
    SendMessage { receiver: String, text: String },
    RefreshUsers,
    Shutdown,
}

impl BackendCommand {
    pub fn name(&self) -> &'static str {
        match self {
            BackendCommand::Connect(_) => "connect",
            BackendCommand::SendMessage { .. } => "send_message",
            BackendCommand::RefreshUsers => "refresh_users",
            BackendCommand::Shutdown => "shutdown",
        }
    }
}
