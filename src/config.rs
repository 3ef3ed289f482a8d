//! Configuration: where the catalogue snapshot lives and display settings.
//!
//! The data directory is `$PTASK_HOME` if set, otherwise `~/.ptask`. A global
//! `--db` flag overrides the snapshot path and places the data directory next
//! to it. An optional `config.json` in the data directory overrides settings.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::branch::UNCATEGORIZED_LABEL;
use crate::error::StoreError;
use crate::render::DEFAULT_TASK_LABEL;

/// Snapshot file name inside the data directory.
pub const SNAPSHOT_FILE: &str = "catalog.json";
/// Settings file name inside the data directory.
pub const SETTINGS_FILE: &str = "config.json";

/// Display settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Group label for tasks without any resolved parameter.
    pub uncategorized_label: String,
    /// Base word of the `"{label} {short_id}."` fallback description.
    pub fallback_task_label: String,
    /// Currency shown when priced lines do not name one.
    pub default_currency: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            uncategorized_label: UNCATEGORIZED_LABEL.to_string(),
            fallback_task_label: DEFAULT_TASK_LABEL.to_string(),
            default_currency: None,
        }
    }
}

/// Resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub settings: Settings,
}

impl Config {
    /// Resolve paths from `--db` / environment and load settings.
    pub fn resolve(db_override: Option<&Path>) -> Result<Self, StoreError> {
        let (data_dir, db_path) = match db_override {
            Some(db) => {
                let dir = db.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
                (dir.to_path_buf(), db.to_path_buf())
            }
            None => {
                let dir = default_data_dir();
                fs::create_dir_all(&dir).map_err(|source| StoreError::Io { path: dir.clone(), source })?;
                let db = dir.join(SNAPSHOT_FILE);
                (dir, db)
            }
        };
        let settings = Settings::load(&data_dir.join(SETTINGS_FILE))?;
        tracing::debug!(data_dir = %data_dir.display(), db = %db_path.display(), "configuration resolved");
        Ok(Config { data_dir, db_path, settings })
    }
}

impl Settings {
    /// Load settings, using defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            return Ok(Settings::default());
        }
        let raw = fs::read_to_string(path).map_err(|source| StoreError::Io { path: path.to_path_buf(), source })?;
        serde_json::from_str(&raw).map_err(|source| StoreError::Parse { path: path.to_path_buf(), source })
    }
}

fn default_data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("PTASK_HOME") {
        return PathBuf::from(dir);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".ptask")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_default_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&dir.path().join(SETTINGS_FILE)).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.uncategorized_label, "Sin categoría");
    }

    #[test]
    fn test_settings_partial_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, r#"{"uncategorized_label":"Otros","default_currency":"ARS"}"#).unwrap();
        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.uncategorized_label, "Otros");
        assert_eq!(settings.fallback_task_label, "Tarea");
        assert_eq!(settings.default_currency.as_deref(), Some("ARS"));
    }

    #[test]
    fn test_db_override_sets_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("obra.json");
        let config = Config::resolve(Some(&db)).unwrap();
        assert_eq!(config.db_path, db);
        assert_eq!(config.data_dir, dir.path());
    }

    #[test]
    fn test_malformed_settings_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(Settings::load(&path), Err(StoreError::Parse { .. })));
    }
}
