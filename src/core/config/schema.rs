//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Global Config
//!
//! Located at (in order of precedence):
//! 1. `$WORKTRACK_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/worktrack/config.toml`
//! 3. `~/.worktrack/config.toml`
//!
//! # Repo Config
//!
//! Located at `<common_dir>/worktrack/config.toml`, so every worktree of a
//! repository sees the same settings.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::types::BranchName;
use crate::store::StoreKind;

/// Log levels accepted by `log_level`.
pub const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Global configuration (user scope).
///
/// # Example
///
/// ```toml
/// backend = "files"
/// event_capacity = 128
/// log_level = "info"
/// roots = ["/home/me/src/project", "/home/me/src/project-wt"]
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    /// Metadata store backend ("libgit" or "files")
    pub backend: Option<String>,

    /// Buffer size of the change-notification channel
    pub event_capacity: Option<usize>,

    /// Default log level when `RUST_LOG` is unset
    pub log_level: Option<String>,

    /// Roots the CLI tracks when none are given on the command line
    pub roots: Option<Vec<PathBuf>>,
}

impl GlobalConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(backend) = &self.backend {
            validate_backend(backend)?;
        }

        if self.event_capacity == Some(0) {
            return Err(ConfigError::InvalidValue(
                "event_capacity must be greater than zero".to_string(),
            ));
        }

        if let Some(level) = &self.log_level {
            if !VALID_LOG_LEVELS.contains(&level.as_str()) {
                return Err(ConfigError::InvalidValue(format!(
                    "invalid log_level '{}', must be one of: {}",
                    level,
                    VALID_LOG_LEVELS.join(", ")
                )));
            }
        }

        Ok(())
    }
}

/// Repository configuration.
///
/// # Example
///
/// ```toml
/// backend = "libgit"
/// remotes = ["origin"]
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RepoConfig {
    /// Backend override for this repository
    pub backend: Option<String>,

    /// Restrict remote-tracking enumeration to these remotes
    pub remotes: Option<Vec<String>>,
}

impl RepoConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(backend) = &self.backend {
            validate_backend(backend)?;
        }

        // Remote names follow branch-name rules (no spaces, no "..", ...)
        for remote in self.remotes.iter().flatten() {
            BranchName::new(remote.as_str()).map_err(|e| {
                ConfigError::InvalidValue(format!("invalid remote name '{}': {}", remote, e))
            })?;
        }

        Ok(())
    }
}

fn validate_backend(backend: &str) -> Result<(), ConfigError> {
    match StoreKind::parse(backend) {
        Some(kind) if kind.is_configurable() => Ok(()),
        _ => Err(ConfigError::InvalidValue(format!(
            "invalid backend '{}', must be one of: {}",
            backend,
            StoreKind::configurable_names().join(", ")
        ))),
    }
}
