// Configuration management for the blebridge CLI
//
// Cross-platform config stored in:
// - macOS: ~/Library/Application Support/blebridge/config.json
// - Linux: ~/.config/blebridge/config.json
// - Windows: %APPDATA%\blebridge\config.json

use anyhow::{Context, Result};
use blebridge_core::BridgeConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Bridge settings shared with the core
    pub bridge: BridgeConfig,

    /// Notifications the simulator sends per monitored characteristic
    pub notifications: usize,

    /// How long to wait for scan results before stopping the scan
    pub scan_window_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bridge: BridgeConfig::default(),
            notifications: 3,
            scan_window_ms: 2_000,
        }
    }
}

impl Config {
    /// Get the config directory path (cross-platform)
    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to determine config directory")?
            .join("blebridge");

        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;

        Ok(config_dir)
    }

    /// Get the config file path
    pub fn config_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Resolve an explicit path or fall back to the platform default
    pub fn resolve(path: Option<&Path>) -> Result<PathBuf> {
        match path {
            Some(path) => Ok(path.to_path_buf()),
            None => Self::config_file(),
        }
    }

    /// Load config from file, or create default if not exists
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path).context("Failed to read config file")?;
            let config: Config =
                serde_json::from_str(&contents).context("Failed to parse config file")?;
            config
                .bridge
                .validate()
                .context("Invalid bridge configuration")?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Save config to file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, contents).context("Failed to write config file")?;
        Ok(())
    }

    /// Set a config value. Does not persist; call `save_to` afterwards.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "method_call_event" => {
                self.bridge.method_call_event = value.to_string();
            }
            "request_timeout_ms" => {
                self.bridge.request_timeout_ms = value.parse().context("Invalid number")?;
            }
            "log_payloads" => {
                self.bridge.log_payloads = value.parse().context("Invalid boolean value")?;
            }
            "notifications" => {
                self.notifications = value.parse().context("Invalid number")?;
            }
            "scan_window_ms" => {
                self.scan_window_ms = value.parse().context("Invalid number")?;
            }
            _ => anyhow::bail!("Unknown config key: {}", key),
        }
        self.bridge
            .validate()
            .with_context(|| format!("Rejected value for {}", key))?;
        Ok(())
    }

    /// Get a config value
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "method_call_event" => Some(self.bridge.method_call_event.clone()),
            "request_timeout_ms" => Some(self.bridge.request_timeout_ms.to_string()),
            "log_payloads" => Some(self.bridge.log_payloads.to_string()),
            "notifications" => Some(self.notifications.to_string()),
            "scan_window_ms" => Some(self.scan_window_ms.to_string()),
            _ => None,
        }
    }

    /// List all config values
    pub fn list(&self) -> Vec<(String, String)> {
        vec![
            ("method_call_event".to_string(), self.bridge.method_call_event.clone()),
            ("request_timeout_ms".to_string(), format!("{}ms", self.bridge.request_timeout_ms)),
            ("log_payloads".to_string(), self.bridge.log_payloads.to_string()),
            ("notifications".to_string(), self.notifications.to_string()),
            ("scan_window_ms".to_string(), format!("{}ms", self.scan_window_ms)),
        ]
    }
}
