//! git
//!
//! Read-only access to git metadata.
//!
//! # Architecture
//!
//! This module is the only place that understands the git on-disk layout or
//! imports `git2`. It offers two readers producing the same result types:
//!
//! - [`Git`]: libgit2-backed reader
//! - [`GitFiles`]: plain-file reader (HEAD, loose and packed refs, config)
//!
//! plus [`locate`], which resolves a working directory to its per-worktree
//! and shared metadata directories.
//!
//! # Invariants
//!
//! - Nothing here writes to a repository
//! - HEAD and operation markers come from `git_dir`; refs and config come
//!   from `common_dir`
//! - All results use strong types (Oid, BranchName, RefName)
//!
//! # Example
//!
//! ```ignore
//! use worktrack::git::{locate, GitFiles};
//! use std::path::Path;
//!
//! let paths = locate(Path::new("."))?;
//! let head = GitFiles::new(paths).head_target()?;
//! ```

mod files;
mod interface;
mod locator;

pub use files::GitFiles;
pub use interface::{
    Git, GitError, GitState, HeadTarget, LocalRef, RefListing, RemoteInfo, RemoteRef, Upstream,
};
pub use locator::locate;
