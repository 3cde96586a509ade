// Configuration management for the rollcall CLI
//
// Cross-platform config stored in:
// - macOS: ~/Library/Application Support/rollcall/config.json
// - Linux: ~/.config/rollcall/config.json
// - Windows: %APPDATA%\rollcall\config.json

use anyhow::{Context, Result};
use rollcall_core::{ReconcilerConfig, StudentId};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 9876;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the attendance server used by client commands
    pub api_url: String,

    /// Port `rollcall serve` listens on
    pub listen_port: u16,

    /// Ledger database path (defaults to the data directory)
    pub storage_path: Option<String>,

    /// Student identity used by `watch` and `attend` when none is given
    pub student_id: Option<StudentId>,

    /// How often `advertise` re-emits the beacon line
    pub advertise_interval_ms: u64,

    /// Beacon reconciliation timings
    pub reconciler: ReconcilerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: format!("http://127.0.0.1:{}", DEFAULT_PORT),
            listen_port: DEFAULT_PORT,
            storage_path: None,
            student_id: None,
            advertise_interval_ms: 1_000,
            reconciler: ReconcilerConfig::default(),
        }
    }
}

impl Config {
    /// Get the config directory path (cross-platform)
    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to determine config directory")?
            .join("rollcall");

        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;

        Ok(config_dir)
    }

    /// Get the data directory path (cross-platform)
    pub fn data_dir() -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir()
            .context("Failed to determine data directory")?
            .join("rollcall");

        std::fs::create_dir_all(&data_dir).context("Failed to create data directory")?;

        Ok(data_dir)
    }

    pub fn config_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Load config from file, or create default if not exists
    pub fn load() -> Result<Self> {
        let config_file = Self::config_file()?;

        if config_file.exists() {
            let contents =
                std::fs::read_to_string(&config_file).context("Failed to read config file")?;
            Self::from_json(&contents)
        } else {
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(contents).context("Failed to parse config file")?;
        config
            .reconciler
            .validate()
            .context("Invalid reconciler settings")?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_file = Self::config_file()?;
        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_file, contents).context("Failed to write config file")?;
        Ok(())
    }

    /// Ledger database location
    pub fn ledger_path(&self) -> Result<PathBuf> {
        match &self.storage_path {
            Some(path) => Ok(PathBuf::from(path)),
            None => Ok(Self::data_dir()?.join("ledger")),
        }
    }

    /// Set a config value (in memory; call `save` to persist)
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "api_url" => {
                self.api_url = value.trim_end_matches('/').to_string();
            }
            "listen_port" => {
                self.listen_port = value.parse().context("Invalid port number")?;
            }
            "storage_path" => {
                self.storage_path = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                };
            }
            "student_id" => {
                self.student_id = if value.is_empty() {
                    None
                } else {
                    Some(value.parse().context("Invalid student id")?)
                };
            }
            "advertise_interval_ms" => {
                self.advertise_interval_ms = value.parse().context("Invalid number")?;
            }
            "sweep_interval_ms" => {
                self.reconciler.sweep_interval_ms = value.parse().context("Invalid number")?;
            }
            "ttl_ms" => {
                self.reconciler.ttl_ms = value.parse().context("Invalid number")?;
            }
            "spoof_cooldown_ms" => {
                self.reconciler.spoof_cooldown_ms = value.parse().context("Invalid number")?;
            }
            "expiry_cooldown_ms" => {
                self.reconciler.expiry_cooldown_ms = value.parse().context("Invalid number")?;
            }
            _ => anyhow::bail!("Unknown config key: {}", key),
        }
        self.reconciler
            .validate()
            .context("Invalid reconciler settings")?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "api_url" => Some(self.api_url.clone()),
            "listen_port" => Some(self.listen_port.to_string()),
            "storage_path" => self.storage_path.clone(),
            "student_id" => self.student_id.map(|id| id.to_string()),
            "advertise_interval_ms" => Some(self.advertise_interval_ms.to_string()),
            "sweep_interval_ms" => Some(self.reconciler.sweep_interval_ms.to_string()),
            "ttl_ms" => Some(self.reconciler.ttl_ms.to_string()),
            "spoof_cooldown_ms" => Some(self.reconciler.spoof_cooldown_ms.to_string()),
            "expiry_cooldown_ms" => Some(self.reconciler.expiry_cooldown_ms.to_string()),
            _ => None,
        }
    }

    pub fn list(&self) -> Vec<(String, String)> {
        vec![
            ("api_url".to_string(), self.api_url.clone()),
            ("listen_port".to_string(), self.listen_port.to_string()),
            (
                "storage_path".to_string(),
                self.storage_path
                    .clone()
                    .unwrap_or_else(|| "(auto)".to_string()),
            ),
            (
                "student_id".to_string(),
                self.student_id
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "(unset)".to_string()),
            ),
            (
                "advertise_interval_ms".to_string(),
                self.advertise_interval_ms.to_string(),
            ),
            (
                "sweep_interval_ms".to_string(),
                self.reconciler.sweep_interval_ms.to_string(),
            ),
            ("ttl_ms".to_string(), self.reconciler.ttl_ms.to_string()),
            (
                "spoof_cooldown_ms".to_string(),
                self.reconciler.spoof_cooldown_ms.to_string(),
            ),
            (
                "expiry_cooldown_ms".to_string(),
                self.reconciler.expiry_cooldown_ms.to_string(),
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.listen_port, DEFAULT_PORT);
        assert_eq!(config.api_url, "http://127.0.0.1:9876");
        assert!(config.student_id.is_none());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let deserialized = Config::from_json(&json).unwrap();
        assert_eq!(config.listen_port, deserialized.listen_port);
        assert_eq!(config.reconciler, deserialized.reconciler);
    }

    #[test]
    fn test_set_and_get_roundtrip() {
        let mut config = Config::default();
        config.set("ttl_ms", "12000").unwrap();
        config.set("api_url", "http://school.example:8080/").unwrap();

        assert_eq!(config.get("ttl_ms").as_deref(), Some("12000"));
        assert_eq!(config.api_url, "http://school.example:8080");
    }

    #[test]
    fn test_set_rejects_invalid_timing() {
        let mut config = Config::default();
        assert!(config.set("ttl_ms", "500").is_err());
    }

    #[test]
    fn test_set_unknown_key() {
        let mut config = Config::default();
        assert!(config.set("enable_mdns", "true").is_err());
        assert!(config.get("enable_mdns").is_none());
    }

    #[test]
    fn test_student_id_parsing() {
        let mut config = Config::default();
        assert!(config.set("student_id", "nope").is_err());
        let id = StudentId::new_v4();
        config.set("student_id", &id.to_string()).unwrap();
        assert_eq!(config.student_id, Some(id));
    }
}
