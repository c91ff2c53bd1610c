//! Configuration file for gator, stored as JSON at `~/.gatorconfig.json`.
//!
//! The file holds the database location and the name of the current user.
//! A missing file yields `Config::default()`; the file is rewritten in full
//! every time the current user changes.
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name of the config file inside the home directory
const CONFIG_FILE_NAME: &str = ".gatorconfig.json";

/// Environment variable that overrides the config file location
pub const CONFIG_PATH_ENV: &str = "GATOR_CONFIG";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to access config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON in config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("HOME environment variable not set")]
    NoHome,

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// What the aggregation loop does when a single feed cannot be fetched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchErrorPolicy {
    /// Stop the loop and surface the error.
    #[default]
    Abort,
    /// Log the failure and wait for the next tick.
    Skip,
}

/// Persisted application configuration.
///
/// `path` is not serialized; it remembers where the config was loaded from
/// so that [`Config::set_user`] rewrites the same file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite URL (`sqlite:...`) or filesystem path. Empty means `~/.gator.db`.
    pub db_url: String,

    pub current_user_name: Option<String>,

    pub fetch_error_policy: FetchErrorPolicy,

    #[serde(skip)]
    path: PathBuf,
}

fn home_dir() -> Result<PathBuf, ConfigError> {
    std::env::var_os("HOME")
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
        .ok_or(ConfigError::NoHome)
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 3] = ["db_url", "current_user_name", "fetch_error_policy"];

    /// Location of the config file: `$GATOR_CONFIG`, else `$HOME/.gatorconfig.json`.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        if let Some(path) = std::env::var_os(CONFIG_PATH_ENV).filter(|p| !p.is_empty()) {
            return Ok(PathBuf::from(path));
        }
        Ok(home_dir()?.join(CONFIG_FILE_NAME))
    }

    /// Load configuration from a JSON file.
    ///
    /// - Missing file → defaults
    /// - Empty file → defaults
    /// - Invalid JSON → `Err(ConfigError::Parse)`
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let defaults = Self {
            path: path.to_path_buf(),
            ..Self::default()
        };

        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(defaults);
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(defaults);
        }

        if let Ok(serde_json::Value::Object(raw)) =
            serde_json::from_str::<serde_json::Value>(&content)
        {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let mut config: Config = serde_json::from_str(&content)?;
        config.path = path.to_path_buf();
        tracing::debug!(
            path = %path.display(),
            user = ?config.current_user_name,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Path this config is persisted to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Database location with the `~/.gator.db` fallback applied.
    pub fn resolved_db_url(&self) -> Result<String, ConfigError> {
        if !self.db_url.trim().is_empty() {
            return Ok(self.db_url.clone());
        }
        let db_path = home_dir()?.join(".gator.db");
        Ok(db_path.to_string_lossy().into_owned())
    }

    /// Set the current user and rewrite the config file.
    ///
    /// The in-memory value is only updated once the file has been written.
    pub fn set_user(&mut self, name: &str) -> Result<(), ConfigError> {
        let mut updated = self.clone();
        updated.current_user_name = Some(name.to_string());
        updated.write()?;
        *self = updated;
        Ok(())
    }

    fn write(&self) -> Result<(), ConfigError> {
        let data = serde_json::to_vec_pretty(self)?;

        #[cfg(unix)]
        {
            use std::io::Write;
            use std::os::unix::fs::OpenOptionsExt;
            let mut file = std::fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(&self.path)?;
            file.write_all(&data)?;
        }

        #[cfg(not(unix))]
        std::fs::write(&self.path, &data)?;

        tracing::debug!(path = %self.path.display(), "Wrote configuration");
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
