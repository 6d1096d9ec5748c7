//! Host configuration.
//!
//! Stored as JSON at `~/.config/companion/config.json`, or wherever
//! `COMPANION_CONFIG` points. Every field has a default so a partial file
//! (or no file at all) is valid.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use companion_connection::credentials;
use companion_connection::{ConnectionConfig, ReconnectConfig};

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "COMPANION_CONFIG";

const MIN_KEEPALIVE_MS: u64 = 1_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// Backend WebSocket URL, without credential.
    pub endpoint: String,
    /// Account whose token is looked up in the credential store.
    pub account: String,
    /// Credential store location. Defaults next to the config file.
    pub credentials_path: Option<PathBuf>,
    pub reconnect_base_delay_ms: u64,
    pub reconnect_max_delay_ms: u64,
    pub reconnect_max_jitter_ms: u64,
    pub reconnect_max_attempts: u32,
    pub keepalive_interval_ms: u64,
    pub connect_timeout_ms: u64,
    pub max_message_size: usize,
}

impl Default for Settings {
    fn default() -> Self {
        let connection = ConnectionConfig::default();
        let reconnect = &connection.reconnect;
        Self {
            endpoint: "ws://127.0.0.1:8080/ws".into(),
            account: "default".into(),
            credentials_path: None,
            reconnect_base_delay_ms: millis(reconnect.base_delay),
            reconnect_max_delay_ms: millis(reconnect.max_delay),
            reconnect_max_jitter_ms: millis(reconnect.max_jitter),
            reconnect_max_attempts: reconnect.max_attempts,
            keepalive_interval_ms: millis(connection.keepalive_interval),
            connect_timeout_ms: millis(connection.connect_timeout),
            max_message_size: connection.max_message_size,
        }
    }
}

fn millis(d: Duration) -> u64 {
    d.as_millis() as u64
}

impl Settings {
    /// Loads from the configured path, falling back to defaults when the
    /// file does not exist or cannot be parsed.
    pub fn load() -> anyhow::Result<Self> {
        let path = config_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        match serde_json::from_str(&content) {
            Ok(settings) => {
                tracing::debug!(path = %path.display(), "loaded configuration");
                Ok(settings)
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    "failed to parse config, using defaults: {e}"
                );
                Ok(Self::default())
            }
        }
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        set_permissions_0600(path);
        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// Credential store path, explicit or the platform default.
    pub fn credentials_path(&self) -> anyhow::Result<PathBuf> {
        self.credentials_path
            .clone()
            .or_else(credentials::default_path)
            .ok_or_else(|| anyhow::anyhow!("cannot determine credential store location"))
    }

    /// Builds the client configuration. A zero keepalive interval is raised
    /// to the minimum.
    pub fn connection_config(&self) -> ConnectionConfig {
        let keepalive_ms = if self.keepalive_interval_ms == 0 {
            tracing::warn!(
                min_ms = MIN_KEEPALIVE_MS,
                "keepaliveIntervalMs is 0, using minimum"
            );
            MIN_KEEPALIVE_MS
        } else {
            self.keepalive_interval_ms
        };
        ConnectionConfig {
            reconnect: ReconnectConfig {
                base_delay: Duration::from_millis(self.reconnect_base_delay_ms),
                max_delay: Duration::from_millis(self.reconnect_max_delay_ms),
                max_jitter: Duration::from_millis(self.reconnect_max_jitter_ms),
                max_attempts: self.reconnect_max_attempts,
            },
            keepalive_interval: Duration::from_millis(keepalive_ms),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            max_message_size: self.max_message_size,
            ..ConnectionConfig::default()
        }
    }
}

fn set_permissions_0600(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600));
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
}

fn config_path() -> anyhow::Result<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|p| !p.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    credentials::config_dir()
        .map(|d| d.join("companion").join("config.json"))
        .ok_or_else(|| anyhow::anyhow!("cannot determine config directory"))
}
