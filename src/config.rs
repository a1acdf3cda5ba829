// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Configuration module.
//!
//! Handles loading application settings.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::bluetooth::RfcommTransport;
use crate::state::DEFAULT_LOG_ENTRIES;

const APP_DIR: &str = "alarm-remote";

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Bluetooth settings.
    pub bluetooth: BluetoothConfig,

    /// Session settings.
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BluetoothConfig {
    /// Name or address of the controller to connect to at startup.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,

    /// RFCOMM channel of the serial-port service.
    pub rfcomm_channel: u8,

    /// Seconds allowed for a connection to open.
    pub connect_timeout_secs: u64,
}

impl Default for BluetoothConfig {
    fn default() -> Self {
        Self {
            device: None,
            rfcomm_channel: crate::bluetooth::rfcomm::DEFAULT_CHANNEL,
            connect_timeout_secs: crate::bluetooth::rfcomm::DEFAULT_CONNECT_TIMEOUT.as_secs(),
        }
    }
}

impl BluetoothConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Bytes requested by the single read that collects a reply.
    pub read_buffer_size: usize,

    /// Activity log lines kept in memory.
    pub activity_log_entries: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: crate::bluetooth::rfcomm::DEFAULT_READ_BUFFER,
            activity_log_entries: DEFAULT_LOG_ENTRIES,
        }
    }
}

impl Config {
    /// Default configuration file location.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }

    /// Load configuration from the default location or create it.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Load configuration from `path`, writing defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config = toml::from_str(&content)?;
            info!("Configuration loaded from {:?}", path);
            return Ok(config);
        }

        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let config = Self::default();
        std::fs::write(path, toml::to_string_pretty(&config)?)?;
        info!("Default configuration written to {:?}", path);
        Ok(config)
    }

    /// Build the RFCOMM transport described by this configuration.
    pub fn transport(&self) -> RfcommTransport {
        RfcommTransport::new(
            self.bluetooth.rfcomm_channel,
            self.bluetooth.connect_timeout(),
            self.session.read_buffer_size,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_writes_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.bluetooth.rfcomm_channel, 1);
        assert_eq!(config.bluetooth.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.session.read_buffer_size, 1024);
        assert_eq!(config.bluetooth.device, None);

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.session.activity_log_entries, DEFAULT_LOG_ENTRIES);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[bluetooth]\ndevice = \"HC-06\"\nconnect_timeout_secs = 3\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.bluetooth.device.as_deref(), Some("HC-06"));
        assert_eq!(config.bluetooth.connect_timeout_secs, 3);
        assert_eq!(config.bluetooth.rfcomm_channel, 1);
        assert_eq!(config.session.read_buffer_size, 1024);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[bluetooth\n").unwrap();

        assert!(Config::load_from(&path).is_err());
    }
}
