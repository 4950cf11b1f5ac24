use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::actions::DEFAULT_COUNTERPARTY;
use crate::error::{DuesError, Result};

pub const DB_FILE: &str = "dues.db";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: String,
    #[serde(default = "default_base_currency")]
    pub base_currency: String,
    /// Counterparty that quick-created dues are filed under.
    #[serde(default = "default_reconciliation_counterparty")]
    pub reconciliation_counterparty: String,
}

fn default_base_currency() -> String {
    "USD".to_string()
}

fn default_reconciliation_counterparty() -> String {
    DEFAULT_COUNTERPARTY.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            base_currency: default_base_currency(),
            reconciliation_counterparty: default_reconciliation_counterparty(),
        }
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("dues")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("dues")
}

pub fn load_settings() -> Settings {
    let path = settings_path();
    if path.exists() {
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        serde_json::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable settings");
            Settings::default()
        })
    } else {
        Settings::default()
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| DuesError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

pub fn settings_file_exists() -> bool {
    settings_path().exists()
}

pub fn get_data_dir() -> PathBuf {
    PathBuf::from(&load_settings().data_dir)
}

pub fn db_path() -> PathBuf {
    get_data_dir().join(DB_FILE)
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Settings {
            data_dir: "/tmp/test".to_string(),
            base_currency: "EUR".to_string(),
            reconciliation_counterparty: "Bank".to_string(),
        };
        let json = serde_json::to_string_pretty(&settings).unwrap();
        std::fs::write(&path, &json).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let loaded: Settings = serde_json::from_str(&content).unwrap();
        assert_eq!(loaded.base_currency, "EUR");
        assert_eq!(loaded.data_dir, "/tmp/test");
        assert_eq!(loaded.reconciliation_counterparty, "Bank");
    }

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(s.base_currency, "USD");
        assert_eq!(s.reconciliation_counterparty, "Bank/Reconciliation");
        assert!(s.data_dir.ends_with("dues"));
    }

    #[test]
    fn test_load_merges_with_defaults() {
        let json = r#"{"data_dir": "/tmp/test"}"#;
        let s: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(s.base_currency, "USD");
        assert_eq!(s.reconciliation_counterparty, "Bank/Reconciliation");
    }

    #[test]
    fn test_shellexpand_tilde() {
        let home = dirs::home_dir().unwrap();
        let expanded = shellexpand_path("~/dues-data");
        assert_eq!(PathBuf::from(expanded), home.join("dues-data"));
    }
}
