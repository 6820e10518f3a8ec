use std::{path::PathBuf, sync::Arc};

use anyhow::Context;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use clap::Parser;
use futures::{stream::SplitSink, SinkExt, StreamExt};
use shared::{
    domain::validate_username,
    error::{ApiError, ErrorCode},
    protocol::{self, ChatMessage},
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

mod app_state;
mod config;

use app_state::{AppState, Inbound};
use config::{apply_cli_overrides, load_settings};

#[derive(Parser, Debug)]
#[command(version, about = "Relay for desktop nudges")]
struct Args {
    /// Path of the optional TOML config file.
    #[arg(long, default_value = "server.toml")]
    config: PathBuf,
    /// Full listen address, e.g. 0.0.0.0:8443.
    #[arg(long)]
    bind: Option<String>,
    /// Listen port; keeps the configured host.
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let mut settings = load_settings(&args.config)?;
    apply_cli_overrides(&mut settings, args.bind, args.port);

    let state = AppState::new(settings.outbound_queue);
    let app = build_router(Arc::new(state));

    let listener = bind_listener(&settings.server_bind).await?;
    info!(addr = %listener.local_addr()?, "relay listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!(%err, "failed to listen for ctrl-c");
            }
            info!("shutting down relay");
        })
        .await?;
    Ok(())
}

/// Binds `host:port`; host names such as `localhost` are resolved.
async fn bind_listener(bind: &str) -> anyhow::Result<tokio::net::TcpListener> {
    tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind relay listener on '{bind}'"))
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/ws/:user_name", get(ws_handler))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(user_name): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Response {
    if let Err(err) = validate_username(&user_name) {
        return (StatusCode::BAD_REQUEST, Json(ApiError::from(err))).into_response();
    }

    let outbound_rx = match state.register(&user_name).await {
        Ok(rx) => rx,
        Err(err) => {
            return (
                StatusCode::CONFLICT,
                Json(ApiError::new(ErrorCode::Conflict, err.to_string())),
            )
                .into_response();
        }
    };

    info!(user = %user_name, "user connected");
    let failed_state = Arc::clone(&state);
    let failed_user = user_name.clone();
    ws.on_failed_upgrade(move |err| {
        warn!(user = %failed_user, %err, "websocket upgrade failed");
        tokio::spawn(async move { failed_state.release(&failed_user).await });
    })
    .on_upgrade(move |socket| ws_connection(state, socket, user_name, outbound_rx))
}

async fn ws_connection(
    state: Arc<AppState>,
    socket: WebSocket,
    user_name: String,
    mut outbound_rx: mpsc::Receiver<ChatMessage>,
) {
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            frame = receiver.next() => {
                let message = match frame {
                    Some(Ok(Message::Text(text))) => match protocol::decode(&text) {
                        Ok(message) => message,
                        Err(err) => {
                            warn!(user = %user_name, %err, "dropping undecodable frame");
                            continue;
                        }
                    },
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(err)) => {
                        debug!(user = %user_name, %err, "websocket receive failed");
                        break;
                    }
                };

                match state.handle_inbound(&user_name, message).await {
                    Inbound::Reply(reply) => {
                        if send_chat(&mut sender, &reply).await.is_err() {
                            break;
                        }
                    }
                    Inbound::Close => break,
                    Inbound::Delivered | Inbound::Ignored => {}
                }
            }
            outbound = outbound_rx.recv() => {
                let Some(message) = outbound else { break };
                if send_chat(&mut sender, &message).await.is_err() {
                    break;
                }
            }
        }
    }

    state.release(&user_name).await;
    info!(user = %user_name, "user disconnected");
}

async fn send_chat(
    sender: &mut SplitSink<WebSocket, Message>,
    message: &ChatMessage,
) -> Result<(), axum::Error> {
    let text = match protocol::encode(message) {
        Ok(text) => text,
        Err(err) => {
            error!(%err, "failed to encode outbound message");
            return Ok(());
        }
    };
    sender.send(Message::Text(text)).await
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
