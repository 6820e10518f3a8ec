//! Long-running relay session: reconnects, refreshes the online-user list and
//! turns relay traffic into [`SessionEvent`]s.

use std::time::Duration;

use shared::{
    error::ChatError,
    protocol::{ChatMessage, MessageContent},
};
use tokio::{
    sync::mpsc,
    time::{self, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::connection::ChatHandle;

pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub identity: String,
    pub server: String,
    pub retry_interval: Duration,
    pub refresh_interval: Duration,
}

impl SessionConfig {
    pub fn new(identity: impl Into<String>, server: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            server: server.into(),
            retry_interval: DEFAULT_RETRY_INTERVAL,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    ListUsers,
    SendPrompt { receiver: String, text: String },
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Connected { identity: String },
    Disconnected { reason: String },
    OnlineUsers(Vec<String>),
    PromptReceived { from: String, text: String },
    DeliveryFailed { error: ChatError },
}

enum Flow {
    Reconnect,
    Stop,
}

/// Runs until a `Shutdown` command arrives or the command channel closes.
pub async fn run_session(
    config: SessionConfig,
    mut commands: mpsc::UnboundedReceiver<SessionCommand>,
    events: mpsc::UnboundedSender<SessionEvent>,
) {
    let mut retry_wait = time::interval(config.retry_interval);
    retry_wait.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        if let Flow::Stop = wait_for_retry(&mut retry_wait, &mut commands).await {
            return;
        }

        let (mut handle, mut inbound) =
            match ChatHandle::connect(&config.identity, &config.server).await {
                Ok(connection) => connection,
                Err(err) => {
                    warn!(server = %config.server, "failed to connect to relay: {err:#}");
                    let _ = events.send(SessionEvent::Disconnected {
                        reason: format!("{err:#}"),
                    });
                    continue;
                }
            };
        info!(identity = %config.identity, server = %config.server, "connected to relay");
        let _ = events.send(SessionEvent::Connected {
            identity: config.identity.clone(),
        });

        let mut refresh = time::interval(config.refresh_interval);
        refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let flow = loop {
            tokio::select! {
                _ = refresh.tick() => {
                    if let Err(err) = handle.list_users().await {
                        warn!("failed to request online users: {err:#}");
                        break Flow::Reconnect;
                    }
                }
                command = commands.recv() => {
                    let Some(command) = command else {
                        break Flow::Stop;
                    };
                    debug!(?command, "received session command");
                    match command {
                        SessionCommand::ListUsers => {
                            if let Err(err) = handle.list_users().await {
                                warn!("failed to request online users: {err:#}");
                                break Flow::Reconnect;
                            }
                        }
                        SessionCommand::SendPrompt { receiver, text } => {
                            if let Err(err) = handle.send_text(&receiver, &text).await {
                                warn!(to = %receiver, "failed to send prompt: {err:#}");
                                break Flow::Reconnect;
                            }
                        }
                        SessionCommand::Shutdown => break Flow::Stop,
                    }
                }
                message = inbound.recv() => {
                    let Some(message) = message else {
                        break Flow::Reconnect;
                    };
                    if let Some(event) = event_for(message) {
                        let _ = events.send(event);
                    }
                }
            }
        };

        match flow {
            Flow::Stop => {
                if let Err(err) = handle.close().await {
                    debug!("close on shutdown failed: {err:#}");
                }
                info!("relay session stopped");
                return;
            }
            Flow::Reconnect => {
                let _ = events.send(SessionEvent::Disconnected {
                    reason: "connection to relay lost".to_string(),
                });
            }
        }
    }
}

/// Waits for the next retry tick while still honouring shutdown. Other
/// commands cannot be served without a connection and are dropped.
async fn wait_for_retry(
    retry_wait: &mut time::Interval,
    commands: &mut mpsc::UnboundedReceiver<SessionCommand>,
) -> Flow {
    loop {
        tokio::select! {
            _ = retry_wait.tick() => return Flow::Reconnect,
            command = commands.recv() => match command {
                None | Some(SessionCommand::Shutdown) => return Flow::Stop,
                Some(command) => warn!(?command, "not connected to relay; dropping command"),
            },
        }
    }
}

fn event_for(message: ChatMessage) -> Option<SessionEvent> {
    match message.content {
        MessageContent::ListUsers(users) => Some(SessionEvent::OnlineUsers(users)),
        MessageContent::Prompt(text) => Some(SessionEvent::PromptReceived {
            from: message.from,
            text,
        }),
        MessageContent::Error(error) => Some(SessionEvent::DeliveryFailed { error }),
        MessageContent::Close | MessageContent::GetUsersList => None,
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
