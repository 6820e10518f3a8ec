use super::*;
use axum::{body, body::Body, http::Request};
use shared::{error::ChatError, protocol::MessageContent};
use tokio::net::TcpListener;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{self, Message as WsMessage},
    MaybeTlsStream, WebSocketStream,
};
use tower::ServiceExt;

type ClientStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

async fn spawn_relay() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let app = build_router(Arc::new(AppState::new(8)));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr.to_string()
}

async fn connect(addr: &str, user: &str) -> ClientStream {
    let (stream, _) = connect_async(format!("ws://{addr}/ws/{user}"))
        .await
        .expect("connect");
    stream
}

async fn send(stream: &mut ClientStream, message: &ChatMessage) {
    let text = protocol::encode(message).expect("encode");
    stream.send(WsMessage::Text(text)).await.expect("send");
}

async fn next_chat(stream: &mut ClientStream) -> ChatMessage {
    loop {
        let frame = tokio::time::timeout(std::time::Duration::from_secs(5), stream.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .expect("frame");
        if let WsMessage::Text(text) = frame {
            return protocol::decode(&text).expect("decode");
        }
    }
}

async fn users_seen_by(stream: &mut ClientStream) -> Vec<String> {
    send(stream, &ChatMessage::get_users_list()).await;
    match next_chat(stream).await.content {
        MessageContent::ListUsers(users) => users,
        other => panic!("unexpected reply: {other:?}"),
    }
}

#[tokio::test]
async fn healthz_reports_ok() {
    let app = build_router(Arc::new(AppState::new(8)));
    let request = Request::get("/healthz")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    assert_eq!(body.as_ref(), b"ok");
}

#[tokio::test]
async fn listener_binds_host_names() {
    let listener = bind_listener("localhost:0").await.expect("bind localhost");
    assert!(listener.local_addr().expect("addr").ip().is_loopback());
    assert!(bind_listener("not an address").await.is_err());
}

#[tokio::test]
async fn prompt_is_relayed_between_connected_users() {
    let addr = spawn_relay().await;
    let mut alice = connect(&addr, "alice").await;
    let mut bob = connect(&addr, "bob").await;
    assert_eq!(users_seen_by(&mut bob).await, vec!["alice", "bob"]);

    send(&mut alice, &ChatMessage::prompt("alice", "bob", "coffee?")).await;

    let received = next_chat(&mut bob).await;
    assert_eq!(received, ChatMessage::prompt("alice", "bob", "coffee?"));
}

#[tokio::test]
async fn prompt_to_offline_user_returns_error_to_sender() {
    let addr = spawn_relay().await;
    let mut alice = connect(&addr, "alice").await;

    send(&mut alice, &ChatMessage::prompt("alice", "nobody", "hello?")).await;

    let reply = next_chat(&mut alice).await;
    assert_eq!(
        reply,
        ChatMessage::from_server("alice", MessageContent::Error(ChatError::UserNotOnline))
    );
}

#[tokio::test]
async fn duplicate_username_is_rejected_with_conflict() {
    let addr = spawn_relay().await;
    let _alice = connect(&addr, "alice").await;

    let err = connect_async(format!("ws://{addr}/ws/alice"))
        .await
        .expect_err("second connect must fail");
    match err {
        tungstenite::Error::Http(response) => {
            assert_eq!(response.status(), StatusCode::CONFLICT);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn invalid_username_is_rejected() {
    let addr = spawn_relay().await;
    let err = connect_async(format!("ws://{addr}/ws/__server__"))
        .await
        .expect_err("reserved name must fail");
    match err {
        tungstenite::Error::Http(response) => {
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn disconnect_releases_username() {
    let addr = spawn_relay().await;
    let mut watcher = connect(&addr, "watcher").await;
    let mut alice = connect(&addr, "alice").await;
    assert_eq!(users_seen_by(&mut watcher).await, vec!["alice", "watcher"]);

    send(&mut alice, &ChatMessage::close()).await;
    drop(alice);

    let mut users = users_seen_by(&mut watcher).await;
    for _ in 0..50 {
        if users == vec!["watcher"] {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        users = users_seen_by(&mut watcher).await;
    }
    assert_eq!(users, vec!["watcher"]);

    let _alice_again = connect(&addr, "alice").await;
}

#[tokio::test]
async fn undecodable_frames_are_skipped() {
    let addr = spawn_relay().await;
    let mut alice = connect(&addr, "alice").await;

    alice
        .send(WsMessage::Text("garbage".to_string()))
        .await
        .expect("send garbage");

    assert_eq!(users_seen_by(&mut alice).await, vec!["alice"]);
}
