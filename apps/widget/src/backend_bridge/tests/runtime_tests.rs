use std::sync::Mutex;

use crossbeam_channel::bounded;
use shared::error::ChatError;

use super::*;
use crate::controller::events::UiErrorCategory;

const WAIT: Duration = Duration::from_secs(5);

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

fn next_error(ui_rx: &Receiver<UiEvent>) -> UiError {
    loop {
        match ui_rx.recv_timeout(WAIT).expect("ui event") {
            UiEvent::Error(err) => return err,
            UiEvent::Info(_) => continue,
            other => panic!("unexpected event: {other:?}"),
        }
    }
}

#[test]
fn commands_without_session_report_not_connected() {
    let (cmd_tx, cmd_rx) = bounded(8);
    let (ui_tx, ui_rx) = bounded(8);
    let worker = launch(cmd_rx, ui_tx, Arc::new(RecordingWindow::default()));

    cmd_tx
        .send(BackendCommand::SendMessage {
            receiver: "bob".to_string(),
            text: "hi".to_string(),
        })
        .expect("queue");
    let err = next_error(&ui_rx);
    assert_eq!(err.context(), UiErrorContext::SendMessage);
    assert_eq!(err.category(), UiErrorCategory::Transport);

    cmd_tx.send(BackendCommand::Shutdown).expect("queue");
    worker.join().expect("worker thread");
}

#[test]
fn incomplete_settings_are_rejected_before_connecting() {
    let (cmd_tx, cmd_rx) = bounded(8);
    let (ui_tx, ui_rx) = bounded(8);
    let worker = launch(cmd_rx, ui_tx, Arc::new(RecordingWindow::default()));

    cmd_tx
        .send(BackendCommand::Connect(Settings::new("", "127.0.0.1:8443")))
        .expect("queue");
    let err = next_error(&ui_rx);
    assert_eq!(err.context(), UiErrorContext::Settings);
    assert_eq!(err.category(), UiErrorCategory::Validation);

    cmd_tx
        .send(BackendCommand::Connect(Settings::new("bad name", "127.0.0.1:8443")))
        .expect("queue");
    assert_eq!(next_error(&ui_rx).category(), UiErrorCategory::Validation);

    drop(cmd_tx);
    worker.join().expect("worker thread");
}

#[test]
fn unreachable_relay_surfaces_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr").to_string();
    drop(listener);

    let (cmd_tx, cmd_rx) = bounded(8);
    let (ui_tx, ui_rx) = bounded(8);
    let worker = launch(cmd_rx, ui_tx, Arc::new(RecordingWindow::default()));

    cmd_tx
        .send(BackendCommand::Connect(Settings::new("alice", addr)))
        .expect("queue");
    let err = next_error(&ui_rx);
    assert_eq!(err.context(), UiErrorContext::Connect);
    assert_eq!(err.category(), UiErrorCategory::Transport);

    cmd_tx.send(BackendCommand::Shutdown).expect("queue");
    worker.join().expect("worker thread");
}

#[test]
fn session_events_map_to_host_events() {
    match ui_event_for(SessionEvent::PromptReceived {
        from: "bob".to_string(),
        text: "coffee?".to_string(),
    }) {
        UiEvent::Host(HostEvent::ChatMessage { from, text }) => {
            assert_eq!(from.as_deref(), Some("bob"));
            assert_eq!(text, "coffee?");
        }
        other => panic!("unexpected event: {other:?}"),
    }

    match ui_event_for(SessionEvent::OnlineUsers(vec!["alice".to_string()])) {
        UiEvent::Host(HostEvent::OnlineUsers(users)) => assert_eq!(users, vec!["alice"]),
        other => panic!("unexpected event: {other:?}"),
    }

    match ui_event_for(SessionEvent::DeliveryFailed {
        error: ChatError::UserNotOnline,
    }) {
        UiEvent::Error(err) => {
            assert_eq!(err.context(), UiErrorContext::SendMessage);
            assert_eq!(err.category(), UiErrorCategory::Transport);
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

fn users(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

fn expect_users(ui_rx: &Receiver<UiEvent>) -> Vec<String> {
    match ui_rx.recv_timeout(WAIT).expect("ui event") {
        UiEvent::Host(HostEvent::OnlineUsers(users)) => users,
        other => panic!("unexpected event: {other:?}"),
    }
}

#[test]
fn full_queue_keeps_only_latest_user_list() {
    let (ui_tx, ui_rx) = bounded(1);
    let mut pump = EventPump::new(ui_tx);

    assert!(pump.deliver(UiEvent::Host(HostEvent::OnlineUsers(users(&["a"])))));
    assert!(pump.deliver(UiEvent::Host(HostEvent::OnlineUsers(users(&["b"])))));
    assert!(pump.deliver(UiEvent::Host(HostEvent::OnlineUsers(users(&["c"])))));
    assert_eq!(expect_users(&ui_rx), users(&["a"]));

    assert!(pump.deliver(UiEvent::Connected {
        identity: "alice".to_string()
    }));
    assert_eq!(expect_users(&ui_rx), users(&["c"]));
    assert!(ui_rx.try_recv().is_err());
}

#[test]
fn unchanged_user_list_is_not_requeued() {
    let (ui_tx, ui_rx) = bounded(4);
    let mut pump = EventPump::new(ui_tx);

    pump.deliver(UiEvent::Host(HostEvent::OnlineUsers(users(&["a", "b"]))));
    pump.deliver(UiEvent::Host(HostEvent::OnlineUsers(users(&["a", "b"]))));
    assert_eq!(expect_users(&ui_rx), users(&["a", "b"]));
    assert!(ui_rx.try_recv().is_err());
}

#[test]
fn chat_message_waits_for_room_instead_of_dropping() {
    let (ui_tx, ui_rx) = bounded(1);
    let mut pump = EventPump::new(ui_tx);
    pump.deliver(UiEvent::Host(HostEvent::OnlineUsers(users(&["bob"]))));

    let sender = thread::spawn(move || {
        pump.deliver(UiEvent::Host(HostEvent::ChatMessage {
            from: Some("bob".to_string()),
            text: "still there?".to_string(),
        }))
    });

    assert_eq!(expect_users(&ui_rx), users(&["bob"]));
    match ui_rx.recv_timeout(WAIT).expect("chat message") {
        UiEvent::Host(HostEvent::ChatMessage { text, .. }) => assert_eq!(text, "still there?"),
        other => panic!("unexpected event: {other:?}"),
    }
    assert!(sender.join().expect("sender thread"));
}

#[test]
fn pump_reports_closed_ui() {
    let (ui_tx, ui_rx) = bounded(1);
    drop(ui_rx);
    let mut pump = EventPump::new(ui_tx);
    assert!(!pump.deliver(UiEvent::Info("hello".to_string())));
}

#[tokio::test(flavor = "multi_thread")]
async fn stopping_a_session_lets_it_close_cleanly() {
    let (commands, mut command_rx) = mpsc::unbounded_channel();
    let (closed_tx, closed_rx) = tokio::sync::oneshot::channel();
    let session = tokio::spawn(async move {
        if command_rx.recv().await == Some(SessionCommand::Shutdown) {
            time::sleep(Duration::from_millis(50)).await;
            let _ = closed_tx.send(());
        }
    });
    let active = ActiveSession {
        commands,
        session,
        pump: tokio::spawn(std::future::pending()),
    };

    active.stop().await;
    assert!(closed_rx.await.is_ok());
}
