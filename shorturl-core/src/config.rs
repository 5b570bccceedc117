// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! YAML configuration parser with strict validation.
//!
//! Validates the node configuration at boot-up time.
//! Any invalid field results in a ConfigError that prevents startup.
//!
//! ```yaml
//! server:
//!   host: 127.0.0.1
//!   port: 8080
//!   rpc: true
//! store:
//!   file: store.json
//!   master: ""            # non-empty => cache proxy for this master
//!   queue_capacity: 1000
//!   remote_timeout_ms: 5000
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ConfigError, StoreError, StoreResult};

/// Upper bound for the record queue.
const MAX_QUEUE_CAPACITY: usize = 1_000_000;
/// Upper bound for a single remote call.
const MAX_REMOTE_TIMEOUT_MS: u64 = 10 * 60 * 1000;

/// Raw server section as parsed from YAML (before validation).
#[derive(Debug, Deserialize)]
struct RawServerConfig {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default)]
    rpc: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for RawServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            rpc: false,
        }
    }
}

/// Raw store section.
#[derive(Debug, Deserialize)]
struct RawStoreConfig {
    #[serde(default = "default_file")]
    file: String,
    #[serde(default)]
    master: Option<String>,
    #[serde(default = "default_queue_capacity")]
    queue_capacity: usize,
    #[serde(default = "default_remote_timeout_ms")]
    remote_timeout_ms: u64,
}

fn default_file() -> String {
    "store.json".to_string()
}

fn default_queue_capacity() -> usize {
    1000
}

fn default_remote_timeout_ms() -> u64 {
    5000
}

impl Default for RawStoreConfig {
    fn default() -> Self {
        Self {
            file: default_file(),
            master: None,
            queue_capacity: default_queue_capacity(),
            remote_timeout_ms: default_remote_timeout_ms(),
        }
    }
}

/// Raw root configuration file.
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    server: RawServerConfig,
    #[serde(default)]
    store: RawStoreConfig,
}

/// Validated HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Serve the `/rpc/*` endpoints proxies call.
    pub rpc: bool,
}

/// Validated store configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Record log path. Unused in proxy mode.
    pub file: PathBuf,
    /// Master address. `None` means this node is the authority.
    pub master: Option<String>,
    pub queue_capacity: usize,
    pub remote_timeout: Duration,
}

/// Complete validated configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub server: ServerConfig,
    pub store: StoreConfig,
}

impl Default for Config {
    fn default() -> Self {
        ConfigLoader::convert(RawConfig::default())
    }
}

impl Config {
    /// Re-check invariants after fields were changed in place (e.g. CLI
    /// overrides). Also folds an empty master address into `None`.
    pub fn validate(mut self) -> StoreResult<Self> {
        self.store.master = self
            .store
            .master
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty());

        if self.server.port == 0 {
            return Err(invalid("port", "0", "Port 0 is reserved and cannot be used"));
        }

        if self.server.host.trim().is_empty() {
            return Err(invalid("host", "", "Host cannot be empty"));
        }

        if self.store.file.as_os_str().is_empty() && self.store.master.is_none() {
            return Err(invalid(
                "file",
                "",
                "A record log path is required unless a master is configured",
            ));
        }

        if let Some(master) = &self.store.master {
            if master.chars().any(char::is_whitespace) {
                return Err(invalid(
                    "master",
                    master,
                    "Master address cannot contain whitespace",
                ));
            }
        }

        if self.store.queue_capacity == 0 || self.store.queue_capacity > MAX_QUEUE_CAPACITY {
            return Err(invalid(
                "queue_capacity",
                &self.store.queue_capacity.to_string(),
                &format!("Must be between 1 and {}", MAX_QUEUE_CAPACITY),
            ));
        }

        let timeout_ms = self.store.remote_timeout.as_millis();
        if timeout_ms == 0 || timeout_ms > u128::from(MAX_REMOTE_TIMEOUT_MS) {
            return Err(invalid(
                "remote_timeout_ms",
                &timeout_ms.to_string(),
                &format!("Must be between 1 and {} ms", MAX_REMOTE_TIMEOUT_MS),
            ));
        }

        Ok(self)
    }
}

fn invalid(field: &'static str, value: &str, reason: &str) -> StoreError {
    ConfigError::InvalidFieldValue {
        field,
        value: value.to_string(),
        reason: reason.to_string(),
    }
    .into()
}

/// Configuration loader with strict validation.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate configuration from a YAML file.
    pub fn load_file(path: impl AsRef<Path>) -> StoreResult<Config> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            }
            .into());
        }

        let content = std::fs::read_to_string(path).map_err(|e| StoreError::Io {
            context: "reading config file",
            source: e,
        })?;

        Self::load_string(&content)
    }

    /// Like `load_file`, but a missing file yields the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> StoreResult<Config> {
        let path = path.as_ref();
        if path.exists() {
            Self::load_file(path)
        } else {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            Config::default().validate()
        }
    }

    /// Load and validate configuration from a YAML string.
    pub fn load_string(content: &str) -> StoreResult<Config> {
        let raw: RawConfig = if content.trim().is_empty() {
            RawConfig::default()
        } else {
            serde_yaml::from_str(content).map_err(|e| ConfigError::Parse {
                message: format!("YAML parse error: {}", e),
            })?
        };

        Self::convert(raw).validate()
    }

    fn convert(raw: RawConfig) -> Config {
        Config {
            server: ServerConfig {
                host: raw.server.host,
                port: raw.server.port,
                rpc: raw.server.rpc,
            },
            store: StoreConfig {
                file: PathBuf::from(raw.store.file),
                master: raw.store.master,
                queue_capacity: raw.store.queue_capacity,
                remote_timeout: Duration::from_millis(raw.store.remote_timeout_ms),
            },
        }
    }
}
