use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use client_core::Settings;
use crossbeam_channel::bounded;
use eframe::egui;
use tracing_subscriber::EnvFilter;

mod backend_bridge;
mod controller;
mod ui;

use backend_bridge::commands::BackendCommand;
use controller::events::UiEvent;
use ui::{StartupConfig, WidgetApp};

const WINDOW_SIZE: [f32; 2] = [300.0, 260.0];

#[derive(Parser, Debug)]
#[command(version, about = "Always-on-top desktop nudge widget")]
struct Args {
    /// Relay address, e.g. 127.0.0.1:8443 or wss://relay.example.com.
    #[arg(long)]
    server: Option<String>,
    #[arg(long)]
    username: Option<String>,
    /// Settings file to use instead of the per-user one.
    #[arg(long)]
    settings: Option<PathBuf>,
    /// Local image (path or file:// URL) shown on the prompt panel.
    #[arg(long)]
    image: Option<String>,
    /// Open straight into the compose panel.
    #[arg(long)]
    compose: bool,
}

fn load_settings(args: &Args) -> Settings {
    let loaded = match &args.settings {
        Some(path) => Settings::from_file(path),
        None => Settings::from_system_path(),
    };
    let mut settings = loaded.unwrap_or_else(|err| {
        tracing::warn!("failed to load settings, starting from defaults: {err}");
        Settings::default()
    });
    if let Some(server) = &args.server {
        settings.server = server.clone();
    }
    if let Some(username) = &args.username {
        settings.username = username.clone();
    }
    settings
}

fn main() -> eframe::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let startup = StartupConfig {
        settings: load_settings(&args),
        settings_path: args.settings,
        image: args.image,
        compose: args.compose,
    };

    let (cmd_tx, cmd_rx) = bounded::<BackendCommand>(64);
    let (ui_tx, ui_rx) = bounded::<UiEvent>(256);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Nudge")
            .with_inner_size(WINDOW_SIZE)
            .with_resizable(false)
            .with_decorations(false)
            .with_transparent(true)
            .with_always_on_top()
            .with_taskbar(false),
        ..Default::default()
    };
    eframe::run_native(
        "Nudge",
        options,
        Box::new(move |cc| {
            let worker =
                backend_bridge::runtime::launch(cmd_rx, ui_tx, Arc::new(cc.egui_ctx.clone()));
            Ok(Box::new(
                WidgetApp::new(cmd_tx, ui_rx, startup).with_worker(worker),
            ))
        }),
    )
}
