//! Runtime configuration, read from `config.json` in the platform config dir.

use crate::constants::{
    DEFAULT_COOLDOWN, DEFAULT_POLL_INTERVAL, DEFAULT_RENOTIFY_INTERVAL, SELF_PACKAGE_ID,
    SYSTEM_SHELL_IDS,
};
use crate::engine::EngineConfig;
use crate::error::AppError;
use crate::watcher::WatcherConfig;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cooldown_ms: u64,
    pub self_package_id: String,
    pub system_shell_ids: Vec<String>,
    pub poll_interval_ms: u64,
    /// `0` disables re-notification of an unchanged foreground app.
    pub renotify_ms: u64,
    /// Program and arguments run on block; the package id is appended.
    pub redirect_command: Option<Vec<String>>,
    pub database_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cooldown_ms: millis(DEFAULT_COOLDOWN),
            self_package_id: SELF_PACKAGE_ID.to_string(),
            system_shell_ids: SYSTEM_SHELL_IDS.iter().map(|s| (*s).to_string()).collect(),
            poll_interval_ms: millis(DEFAULT_POLL_INTERVAL),
            renotify_ms: millis(DEFAULT_RENOTIFY_INTERVAL),
            redirect_command: None,
            database_path: None,
        }
    }
}

impl Config {
    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| AppError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.cooldown_ms == 0 {
            return Err(AppError::Config("cooldown_ms must be positive".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(AppError::Config("poll_interval_ms must be positive".into()));
        }
        if self.self_package_id.trim().is_empty() {
            return Err(AppError::Config("self_package_id cannot be empty".into()));
        }
        if matches!(&self.redirect_command, Some(argv) if argv.is_empty()) {
            return Err(AppError::Config("redirect_command cannot be empty".into()));
        }
        Ok(())
    }

    /// Engine settings. Configured shells replace the built-in list.
    pub fn engine_config(&self) -> EngineConfig {
        let mut exempt: HashSet<String> = self.system_shell_ids.iter().cloned().collect();
        exempt.insert(self.self_package_id.clone());
        EngineConfig {
            cooldown: Duration::from_millis(self.cooldown_ms),
            exempt,
        }
    }

    pub fn watcher_config(&self) -> WatcherConfig {
        WatcherConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            renotify_interval: (self.renotify_ms > 0)
                .then(|| Duration::from_millis(self.renotify_ms)),
        }
    }

    /// Configured database path, or the default under the data dir.
    pub fn database_path(&self) -> Result<PathBuf, AppError> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => {
                let data_dir = project_dirs()?.data_dir().to_path_buf();
                std::fs::create_dir_all(&data_dir)?;
                Ok(data_dir.join("ultrafocus.db"))
            }
        }
    }
}

fn project_dirs() -> Result<ProjectDirs, AppError> {
    ProjectDirs::from("org", "ultrafocus", "UltraFocus")
        .ok_or_else(|| AppError::Config("Could not determine project directories".into()))
}

/// Default location of `config.json`.
pub fn default_config_path() -> Result<PathBuf, AppError> {
    Ok(project_dirs()?.config_dir().join("config.json"))
}
