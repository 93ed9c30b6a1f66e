//! Configuration and session storage

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::sync::DirectoryOrdering;

/// Application configuration
#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Signed-in user id (from last login)
    pub uid: Option<String>,
    /// Signed-in email, for display
    pub email: Option<String>,
    /// How the conversation list keeps its order
    pub ordering: DirectoryOrdering,
    /// Run the echo bot while the TUI is open
    pub echo_bot: bool,
    /// Backend snapshot location (defaults to the data directory)
    pub data_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            uid: None,
            email: None,
            ordering: DirectoryOrdering::default(),
            echo_bot: true,
            data_file: None,
        }
    }
}

impl Config {
    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("com", "messenger-cli", "messenger-cli")
            .context("Could not determine config directory")
    }

    /// Get config file path
    fn config_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    /// Directory for the backend snapshot and the TUI log.
    pub fn data_dir() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.data_dir().to_path_buf())
    }

    /// Where the backend snapshot lives.
    pub fn snapshot_path(&self) -> Result<PathBuf> {
        match self.data_file {
            Some(ref path) => Ok(path.clone()),
            None => Ok(Self::data_dir()?.join("backend.json")),
        }
    }

    /// Load configuration from disk
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).context("Failed to read config file")?;
        toml::from_str(&content).context("Failed to parse config file")
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content).context("Failed to write config file")?;

        // Session ids are private to the user
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(path, perms).context("Failed to set config permissions")?;
        }

        Ok(())
    }

    pub fn set_session(&mut self, uid: &str, email: &str) {
        self.uid = Some(uid.to_string());
        self.email = Some(email.to_string());
    }

    pub fn clear_session(&mut self) {
        self.uid = None;
        self.email = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.toml")).unwrap();
        assert!(config.uid.is_none());
        assert!(config.echo_bot);
        assert_eq!(config.ordering, DirectoryOrdering::Timestamp);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.set_session("u1", "ana@example.com");
        config.ordering = DirectoryOrdering::Arrival;
        config.echo_bot = false;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.uid.as_deref(), Some("u1"));
        assert_eq!(loaded.email.as_deref(), Some("ana@example.com"));
        assert_eq!(loaded.ordering, DirectoryOrdering::Arrival);
        assert!(!loaded.echo_bot);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "ordering = \"arrival\"\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.ordering, DirectoryOrdering::Arrival);
        assert!(config.echo_bot);
        assert!(config.data_file.is_none());
    }

    #[test]
    fn test_clear_session() {
        let mut config = Config::default();
        config.set_session("u1", "ana@example.com");
        config.clear_session();
        assert!(config.uid.is_none());
        assert!(config.email.is_none());
    }
}
