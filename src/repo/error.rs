//! repo::error
//!
//! Errors surfaced by the tracker API.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::config::ConfigError;
use crate::store::StoreError;

/// Errors from tracker operations.
#[derive(Debug, Error)]
pub enum RepoError {
    /// No git marker at the root. Fatal to registration.
    #[error("not a git repository: {}", root.display())]
    NotARepository { root: PathBuf },

    /// Metadata present but unreadable or unparsable.
    ///
    /// A refresh failing this way leaves the previous snapshot in place.
    #[error("failed to read repository at {}: {message}", root.display())]
    RepositoryReadError { root: PathBuf, message: String },

    /// HEAD is detached, missing or unparsable where a branch was required.
    #[error("no current branch in {}: {message}", root.display())]
    DetachedOrMissingHead { root: PathBuf, message: String },

    /// The root was never registered (or was unregistered).
    #[error("repository not registered: {}", root.display())]
    NotRegistered { root: PathBuf },

    /// No store is registered under the requested backend name.
    #[error("unknown backend '{name}'")]
    UnknownBackend { name: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl RepoError {
    /// Attach a root to a store failure.
    pub fn from_store(err: StoreError, root: &Path) -> Self {
        match err {
            StoreError::NotARepository { .. } => RepoError::NotARepository {
                root: root.to_path_buf(),
            },
            StoreError::Unreadable { message } => RepoError::RepositoryReadError {
                root: root.to_path_buf(),
                message,
            },
            StoreError::MissingHead { message } => RepoError::DetachedOrMissingHead {
                root: root.to_path_buf(),
                message,
            },
        }
    }

    /// The root the error concerns, if any.
    pub fn root(&self) -> Option<&Path> {
        match self {
            RepoError::NotARepository { root }
            | RepoError::RepositoryReadError { root, .. }
            | RepoError::DetachedOrMissingHead { root, .. }
            | RepoError::NotRegistered { root } => Some(root),
            RepoError::UnknownBackend { .. } | RepoError::Config(_) => None,
        }
    }
}
