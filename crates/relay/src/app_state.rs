use std::collections::HashMap;

use shared::{
    error::ChatError,
    protocol::{ChatMessage, MessageContent},
};
use thiserror::Error;
use tokio::sync::{
    mpsc::{self, error::TrySendError},
    RwLock,
};
use tracing::{debug, warn};

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum RegistryError {
    #[error("username '{0}' is already connected")]
    AlreadyConnected(String),
}

/// What the connection task should do after an inbound frame was handled.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Inbound {
    Reply(ChatMessage),
    Delivered,
    Ignored,
    Close,
}

/// Connected users and their outbound queues.
pub(crate) struct AppState {
    user_sinks: RwLock<HashMap<String, mpsc::Sender<ChatMessage>>>,
    outbound_queue: usize,
}

impl AppState {
    pub(crate) fn new(outbound_queue: usize) -> Self {
        Self {
            user_sinks: RwLock::new(HashMap::new()),
            outbound_queue: outbound_queue.max(1),
        }
    }

    /// Reserves `user_name` and returns the receiving end of its outbound queue.
    pub(crate) async fn register(
        &self,
        user_name: &str,
    ) -> Result<mpsc::Receiver<ChatMessage>, RegistryError> {
        let mut sinks = self.user_sinks.write().await;
        if sinks.contains_key(user_name) {
            return Err(RegistryError::AlreadyConnected(user_name.to_string()));
        }
        let (tx, rx) = mpsc::channel(self.outbound_queue);
        sinks.insert(user_name.to_string(), tx);
        Ok(rx)
    }

    pub(crate) async fn release(&self, user_name: &str) {
        self.user_sinks.write().await.remove(user_name);
    }

    pub(crate) async fn online_users(&self) -> Vec<String> {
        let mut users: Vec<String> = self.user_sinks.read().await.keys().cloned().collect();
        users.sort();
        users
    }

    pub(crate) async fn handle_inbound(&self, user_name: &str, message: ChatMessage) -> Inbound {
        match message.content {
            MessageContent::Prompt(text) => {
                let to = message.to;
                let error = self.deliver(ChatMessage::prompt(user_name, &to, text)).await;
                match error {
                    None => Inbound::Delivered,
                    Some(error) => {
                        debug!(from = user_name, %to, %error, "prompt not delivered");
                        Inbound::Reply(ChatMessage::from_server(
                            user_name,
                            MessageContent::Error(error),
                        ))
                    }
                }
            }
            MessageContent::GetUsersList => Inbound::Reply(ChatMessage::from_server(
                user_name,
                MessageContent::ListUsers(self.online_users().await),
            )),
            MessageContent::Close => Inbound::Close,
            MessageContent::ListUsers(_) | MessageContent::Error(_) => {
                debug!(from = user_name, "ignoring server-only message kind from client");
                Inbound::Ignored
            }
        }
    }

    async fn deliver(&self, message: ChatMessage) -> Option<ChatError> {
        let sink = self.user_sinks.read().await.get(&message.to).cloned();
        let Some(sink) = sink else {
            return Some(ChatError::UserNotOnline);
        };
        match sink.try_send(message) {
            Ok(()) => None,
            Err(TrySendError::Full(message)) => {
                warn!(to = %message.to, "outbound queue full; dropping prompt");
                Some(ChatError::RecipientBusy)
            }
            Err(TrySendError::Closed(_)) => Some(ChatError::UserNotOnline),
        }
    }
}

#[cfg(test)]
#[path = "tests/app_state_tests.rs"]
mod tests;
