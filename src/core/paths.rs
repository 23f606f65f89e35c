//! core::paths
//!
//! Path routing for a tracked root.
//!
//! # Layout
//!
//! A tracked root has three directories:
//! - `work_dir`: the working directory the caller registered
//! - `git_dir`: per-worktree metadata (`HEAD`, operation markers)
//! - `common_dir`: metadata shared by every worktree (`refs/`, `packed-refs`,
//!   `config`, objects)
//!
//! For a primary clone `git_dir == common_dir`. For a linked worktree
//! `git_dir` is `<common_dir>/worktrees/<name>/`.
//!
//! **Hard rule:** HEAD is always read from `git_dir`; refs and config are
//! always read from `common_dir`. Nothing may assume `.git/` is a directory.
//!
//! # Example
//!
//! ```
//! use worktrack::core::paths::RepoPaths;
//! use std::path::PathBuf;
//!
//! let paths = RepoPaths::new(
//!     PathBuf::from("/work/feature"),
//!     PathBuf::from("/repo/.git/worktrees/feature"),
//!     PathBuf::from("/repo/.git"),
//! );
//!
//! assert!(paths.is_worktree());
//! assert_eq!(paths.head_path(), PathBuf::from("/repo/.git/worktrees/feature/HEAD"));
//! assert_eq!(paths.packed_refs_path(), PathBuf::from("/repo/.git/packed-refs"));
//! ```

use std::path::{Path, PathBuf};

use serde::Serialize;

/// Whether a root is a primary clone or a linked worktree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoContext {
    /// Primary clone: `.git` is a directory.
    Normal,
    /// Linked worktree: `.git` is a file pointing into the primary's metadata.
    Worktree,
}

impl std::fmt::Display for RepoContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RepoContext::Normal => write!(f, "primary"),
            RepoContext::Worktree => write!(f, "worktree"),
        }
    }
}

/// Resolved metadata locations for one tracked root.
///
/// # Invariants
///
/// - Exactly one `git_dir` per `work_dir`
/// - Several roots may share one `common_dir`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoPaths {
    /// The working directory (the registered root).
    pub work_dir: PathBuf,

    /// Per-worktree metadata directory.
    pub git_dir: PathBuf,

    /// Shared metadata directory (refs, config, objects).
    pub common_dir: PathBuf,
}

impl RepoPaths {
    /// Create a new RepoPaths.
    pub fn new(work_dir: PathBuf, git_dir: PathBuf, common_dir: PathBuf) -> Self {
        Self {
            work_dir,
            git_dir,
            common_dir,
        }
    }

    /// Check if this is a linked worktree (common_dir != git_dir).
    pub fn is_worktree(&self) -> bool {
        self.git_dir != self.common_dir
    }

    /// Context derived from the directory layout.
    pub fn context(&self) -> RepoContext {
        if self.is_worktree() {
            RepoContext::Worktree
        } else {
            RepoContext::Normal
        }
    }

    // =========================================================================
    // Worktree-scoped paths (git_dir)
    // =========================================================================

    /// `<git_dir>/HEAD`
    pub fn head_path(&self) -> PathBuf {
        self.git_dir.join("HEAD")
    }

    /// Path of an operation marker file or directory inside `git_dir`
    /// (`MERGE_HEAD`, `rebase-merge`, ...).
    pub fn marker_path(&self, name: &str) -> PathBuf {
        self.git_dir.join(name)
    }

    // =========================================================================
    // Repo-scoped paths (common_dir)
    // =========================================================================

    /// `<common_dir>/refs`
    pub fn refs_dir(&self) -> PathBuf {
        self.common_dir.join("refs")
    }

    /// Loose ref file for a full ref name (`refs/heads/main`).
    pub fn loose_ref_path(&self, refname: &str) -> PathBuf {
        self.common_dir.join(refname)
    }

    /// `<common_dir>/packed-refs`
    pub fn packed_refs_path(&self) -> PathBuf {
        self.common_dir.join("packed-refs")
    }

    /// `<common_dir>/config`
    pub fn config_path(&self) -> PathBuf {
        self.common_dir.join("config")
    }

    /// `<common_dir>/worktrack/config.toml`, the per-repository tracker config.
    ///
    /// Shared by every worktree of the repository.
    pub fn tracker_config_path(&self) -> PathBuf {
        self.common_dir.join("worktrack").join("config.toml")
    }

    /// Get the common_dir as a Path reference.
    pub fn common_dir(&self) -> &Path {
        &self.common_dir
    }

    /// Get the git_dir as a Path reference.
    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    /// Get the work_dir as a Path reference.
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }
}
