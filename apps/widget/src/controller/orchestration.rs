//! Command orchestration helpers from view effects to the window and backend queue.

use crossbeam_channel::{Sender, TrySendError};

use crate::backend_bridge::commands::BackendCommand;
use crate::controller::view::ViewEffect;
use crate::ui::window::WindowControl;

pub fn dispatch_backend_command(
    cmd_tx: &Sender<BackendCommand>,
    cmd: BackendCommand,
    status: &mut String,
) {
    let cmd_name = cmd.name();
    match cmd_tx.try_send(cmd) {
        Ok(()) => tracing::debug!(command = cmd_name, "queued ui->backend command"),
        Err(TrySendError::Full(_)) => {
            *status = "UI command queue is full; please retry".to_string();
        }
        Err(TrySendError::Disconnected(_)) => {
            *status = "Backend worker disconnected; restart the widget".to_string();
        }
    }
}

/// Carries out view effects in order.
pub fn apply_effects<W: WindowControl + ?Sized>(
    effects: impl IntoIterator<Item = ViewEffect>,
    window: &W,
    cmd_tx: &Sender<BackendCommand>,
    status: &mut String,
) {
    for effect in effects {
        match effect {
            ViewEffect::ShowWindow => window.set_visible(true),
            ViewEffect::HideWindow => window.set_visible(false),
            ViewEffect::SendMessage { receiver, text } => {
                dispatch_backend_command(
                    cmd_tx,
                    BackendCommand::SendMessage { receiver, text },
                    status,
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use crossbeam_channel::bounded;

    use super::*;

    #[derive(Default)]
    struct RecordingWindow {
        visibility: Mutex<Vec<bool>>,
    }

    impl WindowControl for RecordingWindow {
        fn set_visible(&self, visible: bool) {
            self.visibility.lock().expect("lock").push(visible);
        }

        fn request_repaint(&self) {}
    }

    #[test]
    fn effects_reach_window_and_backend_in_order() {
        let (cmd_tx, cmd_rx) = bounded(4);
        let window = RecordingWindow::default();
        let mut status = String::new();

        apply_effects(
            vec![
                ViewEffect::ShowWindow,
                ViewEffect::SendMessage {
                    receiver: "bob".to_string(),
                    text: "ping".to_string(),
                },
                ViewEffect::HideWindow,
            ],
            &window,
            &cmd_tx,
            &mut status,
        );

        assert_eq!(*window.visibility.lock().expect("lock"), vec![true, false]);
        assert_eq!(
            cmd_rx.try_recv().expect("queued"),
            BackendCommand::SendMessage {
                receiver: "bob".to_string(),
                text: "ping".to_string(),
            }
        );
        assert!(status.is_empty());
    }

    #[test]
    fn full_queue_is_reported_in_status() {
        let (cmd_tx, _cmd_rx) = bounded(1);
        let mut status = String::new();
        dispatch_backend_command(&cmd_tx, BackendCommand::RefreshUsers, &mut status);
        dispatch_backend_command(&cmd_tx, BackendCommand::RefreshUsers, &mut status);
        assert!(status.contains("queue is full"));
    }

    #[test]
    fn disconnected_backend_is_reported_in_status() {
        let (cmd_tx, cmd_rx) = bounded(1);
        drop(cmd_rx);
        let mut status = String::new();
        dispatch_backend_command(&cmd_tx, BackendCommand::Shutdown, &mut status);
        assert!(status.contains("disconnected"));
    }
}
