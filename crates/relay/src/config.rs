use std::{fs, path::Path};

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_bind: String,
    /// Capacity of each connected user's outbound queue.
    pub outbound_queue: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:8443".into(),
            outbound_queue: 32,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    bind_addr: Option<String>,
    outbound_queue: Option<usize>,
}

pub fn load_settings(config_path: &Path) -> anyhow::Result<Settings> {
    load_settings_with_env(config_path, |name| std::env::var(name).ok())
}

fn load_settings_with_env(
    config_path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    if config_path.exists() {
        let raw = fs::read_to_string(config_path)
            .with_context(|| format!("failed to read '{}'", config_path.display()))?;
        let file_cfg: FileConfig = toml::from_str(&raw)
            .with_context(|| format!("failed to parse '{}'", config_path.display()))?;
        if let Some(v) = file_cfg.bind_addr {
            settings.server_bind = v;
        }
        if let Some(v) = file_cfg.outbound_queue {
            settings.outbound_queue = v;
        }
    }

    if let Some(v) = env("SERVER_BIND") {
        settings.server_bind = v;
    }
    if let Some(v) = env("APP__BIND_ADDR") {
        settings.server_bind = v;
    }
    if let Some(v) = env("APP__OUTBOUND_QUEUE") {
        if let Ok(parsed) = v.parse::<usize>() {
            settings.outbound_queue = parsed;
        }
    }

    settings.outbound_queue = settings.outbound_queue.max(1);
    Ok(settings)
}

/// Applies command line overrides. `--bind` replaces the whole address,
/// `--port` only the port of whatever address is in effect.
pub fn apply_cli_overrides(settings: &mut Settings, bind: Option<String>, port: Option<u16>) {
    if let Some(bind) = bind {
        settings.server_bind = bind;
    }
    if let Some(port) = port {
        let host = settings
            .server_bind
            .rsplit_once(':')
            .map_or(settings.server_bind.as_str(), |(host, _)| host);
        settings.server_bind = format!("{host}:{port}");
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
