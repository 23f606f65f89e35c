//! repo::head
//!
//! Resolves the worktree-specific HEAD.

use std::path::Path;

use serde::Serialize;

use super::error::RepoError;
use crate::core::paths::RepoPaths;
use crate::core::types::{BranchName, Oid};
use crate::git::HeadTarget;
use crate::store::MetadataStore;

/// Current branch and revision of one worktree.
///
/// | HEAD                   | `branch`   | `revision` |
/// |------------------------|------------|------------|
/// | attached, has commits  | `Some`     | `Some`     |
/// | attached, unborn       | `Some`     | `None`     |
/// | detached               | `None`     | `Some`     |
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HeadInfo {
    pub branch: Option<BranchName>,
    pub revision: Option<Oid>,
}

impl HeadInfo {
    pub fn is_detached(&self) -> bool {
        self.branch.is_none() && self.revision.is_some()
    }

    /// The checked-out branch, or [`RepoError::DetachedOrMissingHead`].
    ///
    /// Never falls back to some other branch name.
    pub fn require_branch(&self, root: &Path) -> Result<&BranchName, RepoError> {
        self.branch
            .as_ref()
            .ok_or_else(|| RepoError::DetachedOrMissingHead {
                root: root.to_path_buf(),
                message: match &self.revision {
                    Some(oid) => format!("HEAD is detached at {}", oid.short(7)),
                    None => "HEAD is missing".to_string(),
                },
            })
    }
}

impl From<HeadTarget> for HeadInfo {
    fn from(target: HeadTarget) -> Self {
        match target {
            HeadTarget::Branch { name, oid } => HeadInfo {
                branch: Some(name),
                revision: oid,
            },
            HeadTarget::Detached { oid } => HeadInfo {
                branch: None,
                revision: Some(oid),
            },
        }
    }
}

/// Read HEAD from `git_dir` of `paths`.
///
/// # Errors
///
/// - [`RepoError::DetachedOrMissingHead`] if HEAD is absent or unparsable
/// - [`RepoError::RepositoryReadError`] if the metadata cannot be read
pub fn resolve_head(store: &dyn MetadataStore, paths: &RepoPaths) -> Result<HeadInfo, RepoError> {
    let target = store
        .read_head(paths)
        .map_err(|e| RepoError::from_store(e, paths.work_dir()))?;
    Ok(target.into())
}
