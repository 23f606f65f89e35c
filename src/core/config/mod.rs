//! core::config
//!
//! Configuration schema and loading.
//!
//! # Overview
//!
//! Two configuration scopes:
//! - **Global**: user-level settings (backend, event buffer, log level, roots)
//! - **Repo**: per-repository overrides stored under the shared metadata dir
//!
//! # Precedence
//!
//! Later overrides earlier:
//! 1. Default values
//! 2. Global config file
//! 3. Repo config file
//! 4. CLI flags (not handled here)
//!
//! Missing files are not an error; unparsable or invalid files are.
//!
//! # Example
//!
//! ```no_run
//! use worktrack::core::config::Config;
//!
//! let config = Config::load().unwrap();
//! println!("backend: {}", config.backend());
//! println!("event buffer: {}", config.event_capacity());
//! ```

pub mod schema;

pub use schema::{GlobalConfig, RepoConfig};

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::store::StoreKind;

/// Default buffer size of the change-notification channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Loaded global configuration with accessor defaults applied.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Global configuration
    pub global: GlobalConfig,
    /// Path to the global config file (if loaded)
    global_path: Option<PathBuf>,
}

impl Config {
    /// Load the global configuration from the standard locations.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be read, parsed
    /// or validated.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::find_global() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load the global configuration from an explicit file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let global: GlobalConfig = read_toml(path)?;
        global.validate()?;
        Ok(Self {
            global,
            global_path: Some(path.to_path_buf()),
        })
    }

    /// Search the global config locations in precedence order.
    fn find_global() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("WORKTRACK_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("worktrack/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        dirs::home_dir()
            .map(|home| home.join(".worktrack/config.toml"))
            .filter(|path| path.exists())
    }

    /// Load a repository config file, if present.
    ///
    /// `path` is normally [`RepoPaths::tracker_config_path`](crate::core::paths::RepoPaths::tracker_config_path).
    pub fn load_repo(path: &Path) -> Result<Option<RepoConfig>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }
        let repo: RepoConfig = read_toml(path)?;
        repo.validate()?;
        Ok(Some(repo))
    }

    // =========================================================================
    // Accessor methods with defaults
    // =========================================================================

    /// Metadata store backend. Defaults to libgit.
    pub fn backend(&self) -> StoreKind {
        self.global
            .backend
            .as_deref()
            .and_then(StoreKind::parse)
            .unwrap_or(StoreKind::LibGit)
    }

    /// Change-notification buffer size.
    pub fn event_capacity(&self) -> usize {
        self.global.event_capacity.unwrap_or(DEFAULT_EVENT_CAPACITY)
    }

    /// Default log level.
    pub fn log_level(&self) -> &str {
        self.global.log_level.as_deref().unwrap_or("warn")
    }

    /// Roots to track when none are given explicitly.
    pub fn roots(&self) -> &[PathBuf] {
        self.global.roots.as_deref().unwrap_or(&[])
    }

    /// Get the path to the loaded global config file.
    pub fn loaded_from(&self) -> Option<&Path> {
        self.global_path.as_deref()
    }
}

/// Read and parse a TOML config file.
fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
