use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Environment variable that overrides `storage.data_dir`.
pub const ENV_DATA_DIR: &str = "CALLISTO_DATA_DIR";
/// Environment variable that overrides `daemon.socket_path`.
pub const ENV_SOCKET: &str = "CALLISTO_SOCKET";

// ── Storage ──────────────────────────────────────────────────────────────────

/// Where profile documents and conversation logs live on disk.
///
/// The tree below `data_dir` is owned exclusively by Callisto:
///
/// ```text
/// <data_dir>/users/<uuid>.json
/// <data_dir>/logs/<uuid>/<log_name>.txt
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
        }
    }
}

// ── Daemon ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub socket_path: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            socket_path: "/tmp/callisto.sock".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Fallback filter directive used when `RUST_LOG` is not set.
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub daemon: DaemonConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        Self::load_from_with(path, |key| env::var(key).ok())
    }

    /// `load_from` with the environment read through `lookup`. A missing file
    /// yields defaults; any other read failure is an error.
    pub fn load_from_with<F>(path: impl AsRef<Path>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match fs::read_to_string(path) {
            Ok(raw) => toml::from_str(&raw)?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => Self::default(),
            Err(err) => return Err(err.into()),
        };

        config.apply_env_overrides(lookup);
        Ok(config)
    }

    /// Apply `CALLISTO_*` overrides using `lookup` to read variables.
    /// Empty values are ignored so an exported-but-blank variable does not
    /// wipe a configured path.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_DATA_DIR).filter(|value| !value.is_empty()) {
            self.storage.data_dir = dir;
        }
        if let Some(socket) = lookup(ENV_SOCKET).filter(|value| !value.is_empty()) {
            self.daemon.socket_path = socket;
        }
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        let rendered = toml::to_string_pretty(self)?;
        fs::write(path, rendered)?;
        Ok(())
    }

    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.storage.data_dir)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
