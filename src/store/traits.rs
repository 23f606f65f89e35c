//! store::traits
//!
//! The read contract every metadata store implements.

use std::path::{Path, PathBuf};

use thiserror::Error;

use super::registry::StoreKind;
use crate::core::paths::RepoPaths;
use crate::git::{GitError, GitState, HeadTarget, RefListing};

/// Errors from metadata store reads.
///
/// Cloneable so test fakes can replay a configured failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// No git marker at the root.
    #[error("not a git repository: {path}")]
    NotARepository { path: PathBuf },

    /// Metadata exists but could not be read or parsed.
    #[error("cannot read repository metadata: {message}")]
    Unreadable { message: String },

    /// HEAD is missing or does not parse.
    #[error("HEAD is missing or unreadable: {message}")]
    MissingHead { message: String },
}

impl StoreError {
    /// Map a HEAD read failure.
    ///
    /// A HEAD that is absent or unparsable is reported as [`StoreError::MissingHead`];
    /// anything else stays a read failure.
    pub fn from_head_read(err: GitError) -> Self {
        match err {
            GitError::RefNotFound { .. }
            | GitError::Corrupt { .. }
            | GitError::InvalidOid { .. }
            | GitError::InvalidRefName { .. } => StoreError::MissingHead {
                message: err.to_string(),
            },
            other => other.into(),
        }
    }
}

impl From<GitError> for StoreError {
    fn from(err: GitError) -> Self {
        match err {
            GitError::NotARepo { path } => StoreError::NotARepository { path },
            other => StoreError::Unreadable {
                message: other.to_string(),
            },
        }
    }
}

/// Read access to repository metadata.
///
/// Implementations are stateless with respect to a root: every call reads
/// the current on-disk (or in-memory) state. All methods are blocking and are
/// called from a blocking worker thread.
pub trait MetadataStore: Send + Sync + std::fmt::Debug {
    /// The registry key of this store.
    fn kind(&self) -> StoreKind;

    /// Resolve the metadata directories of the working directory `root`.
    fn locate(&self, root: &Path) -> Result<RepoPaths, StoreError>;

    /// List local branches, remote-tracking branches and remotes from the
    /// shared ref store.
    fn read_refs(&self, paths: &RepoPaths) -> Result<RefListing, StoreError>;

    /// Read the worktree-specific HEAD.
    fn read_head(&self, paths: &RepoPaths) -> Result<HeadTarget, StoreError>;

    /// Read the in-progress operation state of the worktree.
    fn read_state(&self, paths: &RepoPaths) -> Result<GitState, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_a_repo_maps_through() {
        let err: StoreError = GitError::NotARepo {
            path: PathBuf::from("/tmp/x"),
        }
        .into();
        assert_eq!(
            err,
            StoreError::NotARepository {
                path: PathBuf::from("/tmp/x")
            }
        );
    }

    #[test]
    fn head_failures_are_missing_head() {
        let err = StoreError::from_head_read(GitError::RefNotFound {
            refname: "HEAD".to_string(),
        });
        assert!(matches!(err, StoreError::MissingHead { .. }));

        let err = StoreError::from_head_read(GitError::AccessError {
            message: "permission denied".to_string(),
        });
        assert!(matches!(err, StoreError::Unreadable { .. }));
    }
}
