//! store::files
//!
//! Metadata store reading the on-disk layout directly.

use std::path::Path;

use super::registry::StoreKind;
use super::traits::{MetadataStore, StoreError};
use crate::core::paths::RepoPaths;
use crate::git::{locate, GitFiles, GitState, HeadTarget, RefListing};

/// Reads HEAD, loose and packed refs, and config through [`GitFiles`].
#[derive(Debug, Default)]
pub struct FileStore;

impl FileStore {
    pub fn new() -> Self {
        Self
    }
}

impl MetadataStore for FileStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Files
    }

    fn locate(&self, root: &Path) -> Result<RepoPaths, StoreError> {
        Ok(locate(root)?)
    }

    fn read_refs(&self, paths: &RepoPaths) -> Result<RefListing, StoreError> {
        tracing::debug!(common_dir = %paths.common_dir().display(), "reading refs from files");
        Ok(GitFiles::new(paths.clone()).ref_listing()?)
    }

    fn read_head(&self, paths: &RepoPaths) -> Result<HeadTarget, StoreError> {
        GitFiles::new(paths.clone())
            .head_target()
            .map_err(StoreError::from_head_read)
    }

    fn read_state(&self, paths: &RepoPaths) -> Result<GitState, StoreError> {
        Ok(GitFiles::new(paths.clone()).state())
    }
}
