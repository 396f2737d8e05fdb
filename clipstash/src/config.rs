//! Process-level configuration and data directory resolution
//!
//! Behaviour settings (limits, retention, capture scope) live in the database.
//! This module covers what has to be known before the database is open.

use crate::interface::ClipStashError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const APP_DIR_NAME: &str = "clipstash";
pub const DATABASE_FILE_NAME: &str = "clipboard_history.db";
pub const FILES_DIR_NAME: &str = "clipboard_files";
pub const CONFIG_FILE_NAME: &str = "config.toml";

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_PURGE_INTERVAL_SECS: u64 = 3600;

const MIN_POLL_INTERVAL_MS: u64 = 50;

/// Optional TOML config file
///
/// ```toml
/// data_dir = "/home/me/.local/share/clipstash"
/// poll_interval_ms = 500
/// purge_interval_secs = 3600
/// log_filter = "clipstash=debug"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub data_dir: Option<PathBuf>,
    pub poll_interval_ms: u64,
    pub purge_interval_secs: u64,
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            purge_interval_secs: DEFAULT_PURGE_INTERVAL_SECS,
            log_filter: "info".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ClipStashError> {
        let raw = fs::read_to_string(path)
            .map_err(|e| ClipStashError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml(&raw)
            .map_err(|e| ClipStashError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml(raw: &str) -> Result<Self, ClipStashError> {
        toml::from_str(raw).map_err(|e| ClipStashError::Config(e.to_string()))
    }

    /// Load `explicit` if given, else the default config file when it exists, else defaults
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self, ClipStashError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match default_config_path() {
            Some(path) if path.is_file() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(MIN_POLL_INTERVAL_MS))
    }

    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.purge_interval_secs.max(1))
    }

    /// Data roots to try, in order. An explicit directory is the only candidate,
    /// made absolute so stored copy paths do not depend on the working directory.
    pub fn candidate_roots(&self, override_dir: Option<&Path>) -> Vec<PathBuf> {
        match override_dir.or(self.data_dir.as_deref()) {
            Some(dir) => vec![std::path::absolute(dir).unwrap_or_else(|_| dir.to_path_buf())],
            None => fallback_roots(),
        }
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Program directory, then user data directory, then temp directory
pub fn fallback_roots() -> Vec<PathBuf> {
    let mut roots = Vec::new();
    if let Some(dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        roots.push(dir);
    }
    if let Some(dir) = dirs::data_dir() {
        roots.push(dir.join(APP_DIR_NAME));
    }
    roots.push(std::env::temp_dir().join(APP_DIR_NAME));
    roots
}

/// Where the database and saved file copies live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLocation {
    pub root: PathBuf,
    pub database_path: PathBuf,
    pub files_dir: PathBuf,
}

impl DataLocation {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            database_path: root.join(DATABASE_FILE_NAME),
            files_dir: root.join(FILES_DIR_NAME),
            root,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.purge_interval(), Duration::from_secs(3600));
        assert!(config.data_dir.is_none());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml("poll_interval_ms = 250\n").unwrap();
        assert_eq!(config.poll_interval_ms, 250);
        assert_eq!(config.purge_interval_secs, DEFAULT_PURGE_INTERVAL_SECS);
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn test_poll_interval_has_floor() {
        let config = AppConfig::from_toml("poll_interval_ms = 0").unwrap();
        assert_eq!(config.poll_interval(), Duration::from_millis(MIN_POLL_INTERVAL_MS));
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let err = AppConfig::from_toml("poll_interval_ms = \"soon\"").unwrap_err();
        assert!(matches!(err, ClipStashError::Config(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "data_dir = \"/srv/clips\"\nlog_filter = \"debug\"\n").unwrap();

        let config = AppConfig::load_or_default(Some(path.as_path())).unwrap();
        assert_eq!(config.data_dir, Some(PathBuf::from("/srv/clips")));
        assert_eq!(config.candidate_roots(None), vec![PathBuf::from("/srv/clips")]);
        assert_eq!(
            config.candidate_roots(Some(Path::new("/override"))),
            vec![PathBuf::from("/override")]
        );

        assert!(AppConfig::load(&dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn test_relative_data_dir_is_made_absolute() {
        let config = AppConfig::from_toml("data_dir = \"history/data\"").unwrap();
        let roots = config.candidate_roots(None);
        assert_eq!(roots.len(), 1);
        assert!(roots[0].is_absolute());
        assert_eq!(roots[0], std::env::current_dir().unwrap().join("history/data"));

        let roots = AppConfig::default().candidate_roots(Some(Path::new("./elsewhere")));
        assert!(roots[0].is_absolute());
        assert!(roots[0].ends_with("elsewhere"));
    }

    #[test]
    fn test_fallback_roots_end_in_temp_dir() {
        let roots = AppConfig::default().candidate_roots(None);
        assert!(!roots.is_empty());
        assert_eq!(roots.last(), Some(&std::env::temp_dir().join(APP_DIR_NAME)));
    }

    #[test]
    fn test_data_location_layout() {
        let location = DataLocation::new("/data");
        assert_eq!(location.database_path, PathBuf::from("/data/clipboard_history.db"));
        assert_eq!(location.files_dir, PathBuf::from("/data/clipboard_files"));
    }
}
