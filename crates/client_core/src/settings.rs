use std::{
    fs,
    path::{Path, PathBuf},
};

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const APP_DIR_NAME: &str = "nudge";
pub const SETTINGS_FILE_NAME: &str = "settings.json";
pub const ENV_PREFIX: &str = "NUDGE";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("unable to resolve a per-user config directory")]
    NoConfigDir,
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),
    #[error("failed to write settings to '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode settings: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub server: String,
}

impl Settings {
    pub fn new(username: impl Into<String>, server: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            server: server.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.username.trim().is_empty() && !self.server.trim().is_empty()
    }

    /// Loads `path` (JSON) and applies `NUDGE_USERNAME` / `NUDGE_SERVER`
    /// overrides. A missing file is not an error.
    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let config = Config::builder()
            .add_source(File::from(path).format(FileFormat::Json).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()?;
        Ok(config.try_deserialize::<Settings>()?)
    }

    pub fn from_system_path() -> Result<Self, SettingsError> {
        Self::from_file(&system_settings_path()?)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), SettingsError> {
        let json = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| SettingsError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, json).map_err(|source| SettingsError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Saves to the per-user location and returns the path written.
    pub fn save_to_system_path(&self) -> Result<PathBuf, SettingsError> {
        let path = system_settings_path()?;
        self.save_to_file(&path)?;
        Ok(path)
    }
}

pub fn system_settings_path() -> Result<PathBuf, SettingsError> {
    let base = dirs::config_dir().ok_or(SettingsError::NoConfigDir)?;
    Ok(base.join(APP_DIR_NAME).join(SETTINGS_FILE_NAME))
}

#[cfg(test)]
#[path = "tests/settings_tests.rs"]
mod tests;
