//! Runtime bridge between UI command queue and backend event intake.

use std::{sync::Arc, thread, time::Duration};

use client_core::{run_session, SessionCommand, SessionConfig, SessionEvent, Settings};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use shared::domain::validate_username;
use tokio::{sync::mpsc, task::JoinHandle, time};

use crate::backend_bridge::commands::BackendCommand;
use crate::controller::events::{HostEvent, UiError, UiErrorContext, UiEvent};
use crate::ui::window::WindowControl;

const STOP_GRACE: Duration = Duration::from_secs(2);

struct ActiveSession {
    commands: mpsc::UnboundedSender<SessionCommand>,
    session: JoinHandle<()>,
    pump: JoinHandle<()>,
}

impl ActiveSession {
    /// Asks the session to close its relay connection, aborting it only if
    /// that does not finish within [`STOP_GRACE`].
    async fn stop(mut self) {
        let _ = self.commands.send(SessionCommand::Shutdown);
        if time::timeout(STOP_GRACE, &mut self.session).await.is_err() {
            tracing::warn!("relay session did not stop in time; aborting");
            self.session.abort();
        }
        self.pump.abort();
    }
}

/// Feeds the bounded UI queue. Online-user lists are coalesced (latest wins)
/// while the queue is full, and chat messages wait for room instead of being
/// dropped.
pub(crate) struct EventPump {
    ui_tx: Sender<UiEvent>,
    last_users: Option<Vec<String>>,
    pending_users: Option<Vec<String>>,
}

impl EventPump {
    pub(crate) fn new(ui_tx: Sender<UiEvent>) -> Self {
        Self {
            ui_tx,
            last_users: None,
            pending_users: None,
        }
    }

    /// Returns false once the UI side is gone. May block on chat messages.
    pub(crate) fn deliver(&mut self, event: UiEvent) -> bool {
        match event {
            UiEvent::Host(HostEvent::OnlineUsers(users)) => {
                if self.pending_users.is_none() && self.last_users.as_ref() == Some(&users) {
                    return true;
                }
                self.last_users = Some(users.clone());
                self.pending_users = Some(users);
                self.flush_users()
            }
            event @ UiEvent::Host(HostEvent::ChatMessage { .. }) => {
                self.flush_users() && self.ui_tx.send(event).is_ok()
            }
            event => {
                if !self.flush_users() {
                    return false;
                }
                match self.ui_tx.try_send(event) {
                    Ok(()) => true,
                    Err(TrySendError::Full(event)) => {
                        tracing::warn!(?event, "ui event queue full; dropping status event");
                        true
                    }
                    Err(TrySendError::Disconnected(_)) => false,
                }
            }
        }
    }

    fn flush_users(&mut self) -> bool {
        let Some(users) = self.pending_users.take() else {
            return true;
        };
        match self.ui_tx.try_send(UiEvent::Host(HostEvent::OnlineUsers(users))) {
            Ok(()) => true,
            Err(TrySendError::Full(UiEvent::Host(HostEvent::OnlineUsers(users)))) => {
                self.pending_users = Some(users);
                true
            }
            Err(TrySendError::Full(_)) => true,
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Starts the backend worker thread. It exits on `Shutdown` or when every
/// command sender is dropped.
pub fn launch<W>(
    cmd_rx: Receiver<BackendCommand>,
    ui_tx: Sender<UiEvent>,
    window: Arc<W>,
) -> thread::JoinHandle<()>
where
    W: WindowControl + ?Sized + 'static,
{
    thread::spawn(move || {
        let _ = ui_tx.try_send(UiEvent::Info("Backend worker starting...".to_string()));
        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => {
                let _ = ui_tx.try_send(UiEvent::Error(UiError::from_message(
                    UiErrorContext::BackendStartup,
                    format!("backend worker startup failure: failed to build runtime: {err}"),
                )));
                tracing::error!("failed to build backend runtime: {err}");
                return;
            }
        };

        runtime.block_on(async move {
            let mut active: Option<ActiveSession> = None;
            while let Ok(cmd) = cmd_rx.recv() {
                match cmd {
                    BackendCommand::Connect(settings) => {
                        if let Some(previous) = active.take() {
                            previous.stop().await;
                        }
                        match start_session(settings, ui_tx.clone(), Arc::clone(&window)) {
                            Ok(session) => active = Some(session),
                            Err(err) => {
                                let _ = ui_tx.try_send(UiEvent::Error(err));
                            }
                        }
                    }
                    BackendCommand::SendMessage { receiver, text } => {
                        forward(
                            &active,
                            SessionCommand::SendPrompt { receiver, text },
                            UiErrorContext::SendMessage,
                            &ui_tx,
                        );
                    }
                    BackendCommand::RefreshUsers => {
                        forward(
                            &active,
                            SessionCommand::ListUsers,
                            UiErrorContext::Connect,
                            &ui_tx,
                        );
                    }
                    BackendCommand::Shutdown => break,
                }
                window.request_repaint();
            }

            if let Some(session) = active.take() {
                session.stop().await;
            }
            tracing::info!("backend worker stopped");
        });
    })
}

fn start_session<W>(
    settings: Settings,
    ui_tx: Sender<UiEvent>,
    window: Arc<W>,
) -> Result<ActiveSession, UiError>
where
    W: WindowControl + ?Sized + 'static,
{
    if !settings.is_complete() {
        return Err(UiError::from_message(
            UiErrorContext::Settings,
            "missing username or server address",
        ));
    }
    validate_username(&settings.username)
        .map_err(|err| UiError::from_message(UiErrorContext::Settings, err.to_string()))?;

    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (event_tx, mut events) = mpsc::unbounded_channel();
    tracing::info!(user = %settings.username, server = %settings.server, "starting relay session");
    let session = tokio::spawn(run_session(
        SessionConfig::new(settings.username, settings.server),
        cmd_rx,
        event_tx,
    ));
    let pump = tokio::spawn(async move {
        let mut pump = EventPump::new(ui_tx);
        while let Some(event) = events.recv().await {
            if matches!(event, SessionEvent::PromptReceived { .. }) {
                window.set_visible(true);
            }
            let event = ui_event_for(event);
            let open = tokio::task::block_in_place(|| pump.deliver(event));
            window.request_repaint();
            if !open {
                tracing::debug!("ui event queue closed; stopping event pump");
                break;
            }
        }
    });

    Ok(ActiveSession {
        commands: cmd_tx,
        session,
        pump,
    })
}

fn forward(
    active: &Option<ActiveSession>,
    command: SessionCommand,
    context: UiErrorContext,
    ui_tx: &Sender<UiEvent>,
) {
    let sent = active
        .as_ref()
        .is_some_and(|session| session.commands.send(command).is_ok());
    if !sent {
        let _ = ui_tx.try_send(UiEvent::Error(UiError::from_message(
            context,
            "not connected to the relay",
        )));
    }
}

pub(crate) fn ui_event_for(event: SessionEvent) -> UiEvent {
    match event {
        SessionEvent::Connected { identity } => UiEvent::Connected { identity },
        SessionEvent::Disconnected { reason } => UiEvent::Error(UiError::from_message(
            UiErrorContext::Connect,
            format!("disconnected from relay: {reason}"),
        )),
        SessionEvent::OnlineUsers(users) => UiEvent::Host(HostEvent::OnlineUsers(users)),
        SessionEvent::PromptReceived { from, text } => UiEvent::Host(HostEvent::ChatMessage {
            from: Some(from),
            text,
        }),
        SessionEvent::DeliveryFailed { error } => UiEvent::Error(UiError::from_message(
            UiErrorContext::SendMessage,
            error.to_string(),
        )),
    }
}

#[cfg(test)]
#[path = "tests/runtime_tests.rs"]
mod tests;
