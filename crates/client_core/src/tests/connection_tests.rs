use super::*;
use crate::test_relay::{spawn_fake_relay, ECHO_USER};
use shared::protocol::MessageContent;
use std::time::Duration;

#[test]
fn websocket_url_accepts_bare_and_http_addresses() {
    assert_eq!(
        websocket_url("127.0.0.1:8443", "alice").expect("bare").as_str(),
        "ws://127.0.0.1:8443/ws/alice"
    );
    assert_eq!(
        websocket_url("http://relay.local:8443/", "alice")
            .expect("http")
            .as_str(),
        "ws://relay.local:8443/ws/alice"
    );
    assert_eq!(
        websocket_url("https://relay.example.com", "bob")
            .expect("https")
            .as_str(),
        "wss://relay.example.com/ws/bob"
    );
    assert_eq!(
        websocket_url("wss://relay.example.com", "bob")
            .expect("wss")
            .as_str(),
        "wss://relay.example.com/ws/bob"
    );
}

#[test]
fn websocket_url_rejects_bad_input() {
    assert!(websocket_url("", "alice").is_err());
    assert!(websocket_url("ftp://relay", "alice").is_err());
    assert!(websocket_url("relay:8443", "no spaces").is_err());
}

#[tokio::test]
async fn list_users_and_prompt_round_trip_through_relay() {
    let (addr, mut seen) = spawn_fake_relay().await;
    let (mut handle, mut inbound) = ChatHandle::connect("alice", &addr).await.expect("connect");

    handle.list_users().await.expect("list users");
    let users = tokio::time::timeout(Duration::from_secs(5), inbound.recv())
        .await
        .expect("timeout")
        .expect("message");
    assert_eq!(
        users.content,
        MessageContent::ListUsers(vec![ECHO_USER.to_string(), "alice".to_string()])
    );

    handle.send_text(ECHO_USER, "ping").await.expect("send");
    let sent = seen.recv().await.expect("list request");
    assert_eq!(sent.content, MessageContent::GetUsersList);
    let sent = seen.recv().await.expect("prompt");
    assert_eq!(sent, ChatMessage::prompt("alice", ECHO_USER, "ping"));

    let echoed = tokio::time::timeout(Duration::from_secs(5), inbound.recv())
        .await
        .expect("timeout")
        .expect("message");
    assert_eq!(echoed, ChatMessage::prompt(ECHO_USER, "alice", "ping"));
}

#[tokio::test]
async fn inbound_ends_when_handle_is_dropped() {
    let (addr, _seen) = spawn_fake_relay().await;
    let (handle, mut inbound) = ChatHandle::connect("alice", &addr).await.expect("connect");
    drop(handle);

    let next = tokio::time::timeout(Duration::from_secs(5), inbound.recv())
        .await
        .expect("timeout");
    assert!(next.is_none());
}

#[tokio::test]
async fn connect_to_closed_port_fails() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let err = ChatHandle::connect("alice", &addr.to_string())
        .await
        .err()
        .expect("must fail");
    assert!(format!("{err:#}").contains("failed to connect websocket"));
}
