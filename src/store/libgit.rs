//! store::libgit
//!
//! Metadata store backed by libgit2.

use std::path::Path;

use super::registry::StoreKind;
use super::traits::{MetadataStore, StoreError};
use crate::core::paths::RepoPaths;
use crate::git::{locate, Git, GitState, HeadTarget, RefListing};

/// Reads refs, HEAD and operation state through [`Git`].
///
/// The repository is reopened on every read so each refresh sees the
/// current on-disk state.
#[derive(Debug, Default)]
pub struct LibGitStore;

impl LibGitStore {
    pub fn new() -> Self {
        Self
    }

    /// Open the repository, reporting a missing HEAD before libgit2 sees it.
    ///
    /// libgit2 treats a git dir without HEAD as no repository at all.
    fn open(paths: &RepoPaths) -> Result<Git, StoreError> {
        if !paths.head_path().exists() {
            return Err(StoreError::MissingHead {
                message: format!("{} does not exist", paths.head_path().display()),
            });
        }
        Ok(Git::open(paths.work_dir())?)
    }
}

impl MetadataStore for LibGitStore {
    fn kind(&self) -> StoreKind {
        StoreKind::LibGit
    }

    fn locate(&self, root: &Path) -> Result<RepoPaths, StoreError> {
        Ok(locate(root)?)
    }

    fn read_refs(&self, paths: &RepoPaths) -> Result<RefListing, StoreError> {
        tracing::debug!(root = %paths.work_dir().display(), "reading refs via libgit2");
        Ok(Self::open(paths)?.ref_listing()?)
    }

    fn read_head(&self, paths: &RepoPaths) -> Result<HeadTarget, StoreError> {
        let git = Self::open(paths)?;
        git.head_target().map_err(StoreError::from_head_read)
    }

    fn read_state(&self, paths: &RepoPaths) -> Result<GitState, StoreError> {
        Ok(Self::open(paths)?.state())
    }
}
