//! git::interface
//!
//! Read-only git interface implemented with git2.
//!
//! All libgit2 access in the crate flows through the [`Git`] struct, which
//! returns structured results and normalizes errors into typed categories.
//! The plain-file reader in [`super::files`] produces the same result types,
//! so the two can back the same store seam interchangeably.
//!
//! # Error Handling
//!
//! - [`GitError::NotARepo`]: no git marker at the given root
//! - [`GitError::Corrupt`]: marker or metadata present but malformed
//! - [`GitError::RefNotFound`]: requested ref does not exist
//!
//! # Example
//!
//! ```ignore
//! use worktrack::git::Git;
//! use std::path::Path;
//!
//! let git = Git::open(Path::new("."))?;
//! for branch in git.list_local_branches()? {
//!     println!("{} -> {}", branch.name, branch.oid.short(7));
//! }
//! ```

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::paths::RepoPaths;
use crate::core::types::{BranchName, Oid, RefName, TypeError};

/// Errors from git reads.
#[derive(Debug, Error)]
pub enum GitError {
    /// No git marker at the given root.
    #[error("not a git repository: {path}")]
    NotARepo {
        /// The path that was checked
        path: PathBuf,
    },

    /// Metadata exists but cannot be interpreted.
    #[error("corrupt repository metadata at {path}: {message}")]
    Corrupt {
        /// The file or directory that failed to parse
        path: PathBuf,
        /// Description of the problem
        message: String,
    },

    /// Requested ref does not exist.
    #[error("ref not found: {refname}")]
    RefNotFound {
        /// The ref that was not found
        refname: String,
    },

    /// Invalid object id format.
    #[error("invalid object id: {oid}")]
    InvalidOid {
        /// The invalid OID string
        oid: String,
    },

    /// Invalid ref name format.
    #[error("invalid ref name: {message}")]
    InvalidRefName {
        /// Description of the problem
        message: String,
    },

    /// Permission or filesystem error.
    #[error("repository access error: {message}")]
    AccessError {
        /// Description of the error
        message: String,
    },

    /// Internal git2 error.
    #[error("git error: {message}")]
    Internal {
        /// The error message
        message: String,
    },
}

impl GitError {
    /// Create a GitError from a git2::Error with richer context.
    fn from_git2(err: git2::Error, context: &str) -> Self {
        match err.code() {
            git2::ErrorCode::NotFound => GitError::RefNotFound {
                refname: context.to_string(),
            },
            git2::ErrorCode::InvalidSpec => GitError::InvalidOid {
                oid: context.to_string(),
            },
            git2::ErrorCode::Locked => GitError::AccessError {
                message: format!("repository is locked: {}", err.message()),
            },
            _ => GitError::Internal {
                message: format!("{}: {}", context, err.message()),
            },
        }
    }

    /// Wrap an IO error for a path.
    pub(crate) fn io(path: &Path, err: std::io::Error) -> Self {
        GitError::AccessError {
            message: format!("{}: {}", path.display(), err),
        }
    }
}

impl From<git2::Error> for GitError {
    fn from(err: git2::Error) -> Self {
        GitError::Internal {
            message: err.message().to_string(),
        }
    }
}

impl From<TypeError> for GitError {
    fn from(err: TypeError) -> Self {
        match err {
            TypeError::InvalidOid(msg) => GitError::InvalidOid { oid: msg },
            TypeError::InvalidRefName(msg) => GitError::InvalidRefName { message: msg },
            TypeError::InvalidBranchName(msg) => GitError::InvalidRefName { message: msg },
        }
    }
}

/// State of in-progress git operations in one worktree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitState {
    /// No operation in progress.
    Clean,

    /// Rebase in progress.
    Rebase {
        /// Current step in the rebase (1-indexed), if available.
        current: Option<usize>,
        /// Total steps in the rebase, if available.
        total: Option<usize>,
    },

    /// Merge in progress.
    Merge,

    /// Cherry-pick in progress.
    CherryPick,

    /// Revert in progress.
    Revert,

    /// Bisect in progress.
    Bisect,

    /// Apply mailbox in progress.
    ApplyMailbox,
}

impl GitState {
    /// Check if any operation is in progress.
    ///
    /// # Example
    ///
    /// ```
    /// use worktrack::git::GitState;
    ///
    /// assert!(!GitState::Clean.is_in_progress());
    /// assert!(GitState::Merge.is_in_progress());
    /// ```
    pub fn is_in_progress(&self) -> bool {
        !matches!(self, GitState::Clean)
    }

    /// Get a human-readable description of the state.
    pub fn description(&self) -> &'static str {
        match self {
            GitState::Clean => "clean",
            GitState::Rebase { .. } => "rebase",
            GitState::Merge => "merge",
            GitState::CherryPick => "cherry-pick",
            GitState::Revert => "revert",
            GitState::Bisect => "bisect",
            GitState::ApplyMailbox => "apply-mailbox",
        }
    }
}

impl std::fmt::Display for GitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GitState::Rebase {
                current: Some(c),
                total: Some(t),
            } => write!(f, "rebase ({}/{})", c, t),
            _ => write!(f, "{}", self.description()),
        }
    }
}

/// What a worktree's HEAD points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeadTarget {
    /// HEAD is a symbolic ref to a local branch.
    ///
    /// `oid` is `None` when the branch is unborn (no commits yet).
    Branch { name: BranchName, oid: Option<Oid> },

    /// HEAD holds a commit id directly.
    Detached { oid: Oid },
}

impl HeadTarget {
    /// The commit HEAD resolves to, if any.
    pub fn oid(&self) -> Option<&Oid> {
        match self {
            HeadTarget::Branch { oid, .. } => oid.as_ref(),
            HeadTarget::Detached { oid } => Some(oid),
        }
    }
}

/// Configured upstream of a local branch (`branch.<name>.remote` / `.merge`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upstream {
    /// Remote name
    pub remote: String,
    /// Branch name on the remote
    pub branch: BranchName,
}

/// A local branch ref with its target commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalRef {
    /// Short branch name
    pub name: BranchName,
    /// Target commit
    pub oid: Oid,
    /// Configured upstream, if any
    pub upstream: Option<Upstream>,
}

/// A remote-tracking branch ref with its target commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRef {
    /// Remote name
    pub remote: String,
    /// Branch name without the remote prefix
    pub name: BranchName,
    /// Target commit
    pub oid: Oid,
}

/// A configured remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteInfo {
    /// Remote name
    pub name: String,
    /// Fetch URLs
    pub urls: Vec<String>,
}

/// Everything the branch catalog needs from the shared ref store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefListing {
    /// Local branches
    pub local: Vec<LocalRef>,
    /// Remote-tracking branches (symbolic refs excluded)
    pub remote: Vec<RemoteRef>,
    /// Configured remotes
    pub remotes: Vec<RemoteInfo>,
}

/// Split the shorthand of a merge ref (`refs/heads/main`) into a branch name.
pub(crate) fn merge_ref_branch(merge: &str) -> Option<BranchName> {
    BranchName::from_ref(merge.strip_prefix(RefName::HEADS).unwrap_or(merge)).ok()
}

/// The libgit2-backed git interface.
///
/// Read-only: the tracker never mutates a repository.
pub struct Git {
    /// The underlying git2 repository
    repo: git2::Repository,
}

impl std::fmt::Debug for Git {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Git")
            .field("path", &self.repo.path())
            .finish()
    }
}

impl Git {
    // =========================================================================
    // Repository Opening and Info
    // =========================================================================

    /// Open the repository whose working directory is exactly `root`.
    ///
    /// Parent directories are not searched.
    ///
    /// # Errors
    ///
    /// - [`GitError::NotARepo`] if `root` is not a working directory of a repository
    /// - [`GitError::Corrupt`] if a repository is there but libgit2 cannot load it
    pub fn open(root: &Path) -> Result<Self, GitError> {
        let flags = git2::RepositoryOpenFlags::NO_SEARCH;
        let repo = git2::Repository::open_ext(root, flags, std::iter::empty::<&std::ffi::OsStr>())
            .map_err(|e| match e.code() {
                git2::ErrorCode::NotFound => GitError::NotARepo {
                    path: root.to_path_buf(),
                },
                _ => GitError::Corrupt {
                    path: root.to_path_buf(),
                    message: e.message().to_string(),
                },
            })?;

        if repo.is_bare() {
            return Err(GitError::NotARepo {
                path: root.to_path_buf(),
            });
        }

        Ok(Self { repo })
    }

    /// Metadata locations as libgit2 sees them.
    pub fn paths(&self) -> Result<RepoPaths, GitError> {
        let work_dir = self
            .repo
            .workdir()
            .ok_or_else(|| GitError::NotARepo {
                path: self.repo.path().to_path_buf(),
            })?
            .to_path_buf();

        Ok(RepoPaths::new(
            work_dir,
            self.repo.path().to_path_buf(),
            self.repo.commondir().to_path_buf(),
        ))
    }

    // =========================================================================
    // State Detection
    // =========================================================================

    /// Get the in-progress operation state of this worktree.
    pub fn state(&self) -> GitState {
        match self.repo.state() {
            git2::RepositoryState::Clean => GitState::Clean,
            git2::RepositoryState::Rebase
            | git2::RepositoryState::RebaseInteractive
            | git2::RepositoryState::RebaseMerge => {
                let (current, total) = self.read_rebase_progress();
                GitState::Rebase { current, total }
            }
            git2::RepositoryState::Merge => GitState::Merge,
            git2::RepositoryState::CherryPick | git2::RepositoryState::CherryPickSequence => {
                GitState::CherryPick
            }
            git2::RepositoryState::Revert | git2::RepositoryState::RevertSequence => {
                GitState::Revert
            }
            git2::RepositoryState::Bisect => GitState::Bisect,
            git2::RepositoryState::ApplyMailbox | git2::RepositoryState::ApplyMailboxOrRebase => {
                GitState::ApplyMailbox
            }
        }
    }

    /// Read rebase progress from the worktree's rebase-merge or rebase-apply dir.
    fn read_rebase_progress(&self) -> (Option<usize>, Option<usize>) {
        super::files::rebase_progress(self.repo.path())
    }

    // =========================================================================
    // HEAD and Ref Resolution
    // =========================================================================

    /// Read the worktree-specific HEAD.
    ///
    /// # Errors
    ///
    /// - [`GitError::RefNotFound`] if HEAD is missing
    /// - [`GitError::Corrupt`] if HEAD cannot be parsed
    /// - [`GitError::InvalidRefName`] if HEAD points outside `refs/heads/`
    pub fn head_target(&self) -> Result<HeadTarget, GitError> {
        let head = self.repo.find_reference("HEAD").map_err(|e| match e.code() {
            git2::ErrorCode::NotFound => GitError::RefNotFound {
                refname: "HEAD".to_string(),
            },
            _ => GitError::Corrupt {
                path: self.repo.path().join("HEAD"),
                message: e.message().to_string(),
            },
        })?;

        if let Some(target) = head.symbolic_target() {
            let short = target
                .strip_prefix(RefName::HEADS)
                .ok_or_else(|| GitError::InvalidRefName {
                    message: format!("HEAD points outside refs/heads/: {}", target),
                })?;
            let name = BranchName::from_ref(short)?;
            let oid = self.try_resolve_ref(target)?;
            return Ok(HeadTarget::Branch { name, oid });
        }

        let oid = head.target().ok_or_else(|| GitError::Internal {
            message: "HEAD has no target".to_string(),
        })?;
        Ok(HeadTarget::Detached {
            oid: Oid::new(oid.to_string())?,
        })
    }

    /// Resolve a ref to its commit, returning None if it doesn't exist.
    pub fn try_resolve_ref(&self, refname: &str) -> Result<Option<Oid>, GitError> {
        let reference = match self.repo.find_reference(refname) {
            Ok(r) => r,
            Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(GitError::from_git2(e, refname)),
        };

        let oid = reference
            .peel_to_commit()
            .map_err(|e| GitError::from_git2(e, refname))?
            .id();

        Ok(Some(Oid::new(oid.to_string())?))
    }

    // =========================================================================
    // Branch Enumeration
    // =========================================================================

    /// List all local branches with their target commits and upstreams.
    pub fn list_local_branches(&self) -> Result<Vec<LocalRef>, GitError> {
        let mut result = Vec::new();
        for entry in self.repo.branches(Some(git2::BranchType::Local))? {
            let (branch, _) = entry?;
            let Some(refname) = branch.get().name().map(str::to_string) else {
                tracing::warn!("skipping local branch with non-UTF-8 name");
                continue;
            };
            let Some(short) = refname.strip_prefix(RefName::HEADS) else {
                continue;
            };
            let name = match BranchName::from_ref(short) {
                Ok(n) => n,
                Err(e) => {
                    tracing::warn!(%refname, error = %e, "skipping branch with invalid name");
                    continue;
                }
            };
            let oid = branch
                .get()
                .peel_to_commit()
                .map_err(|e| GitError::from_git2(e, &refname))?
                .id();

            result.push(LocalRef {
                name,
                oid: Oid::new(oid.to_string())?,
                upstream: self.upstream_of(&refname)?,
            });
        }
        Ok(result)
    }

    /// Configured upstream of a local branch ref, if any.
    fn upstream_of(&self, refname: &str) -> Result<Option<Upstream>, GitError> {
        let remote = match self.repo.branch_upstream_remote(refname) {
            Ok(buf) => buf.as_str().map(str::to_string),
            Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(GitError::from_git2(e, refname)),
        };
        let merge = match self.repo.branch_upstream_merge(refname) {
            Ok(buf) => buf.as_str().map(str::to_string),
            Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(GitError::from_git2(e, refname)),
        };

        // remote "." tracks a local branch, which has no remote-tracking ref
        match (remote, merge) {
            (Some(remote), Some(merge)) if remote != "." => Ok(merge_ref_branch(&merge)
                .map(|branch| Upstream { remote, branch })),
            _ => Ok(None),
        }
    }

    /// List all remote-tracking branches, skipping symbolic refs like `origin/HEAD`.
    pub fn list_remote_branches(&self) -> Result<Vec<RemoteRef>, GitError> {
        let mut result = Vec::new();
        for entry in self.repo.branches(Some(git2::BranchType::Remote))? {
            let (branch, _) = entry?;
            let reference = branch.get();
            if reference.symbolic_target().is_some() {
                continue;
            }
            let Some(refname) = reference.name().map(str::to_string) else {
                tracing::warn!("skipping remote branch with non-UTF-8 name");
                continue;
            };

            let remote = match self.repo.branch_remote_name(&refname) {
                Ok(buf) => buf.as_str().map(str::to_string),
                Err(e) => {
                    tracing::debug!(%refname, error = %e.message(), "no remote owns ref");
                    None
                }
            };
            let Some(remote) = remote else {
                continue;
            };

            let prefix = format!("{}{}/", RefName::REMOTES, remote);
            let Some(short) = refname.strip_prefix(&prefix) else {
                continue;
            };
            let name = match BranchName::from_ref(short) {
                Ok(n) => n,
                Err(e) => {
                    tracing::warn!(%refname, error = %e, "skipping remote branch with invalid name");
                    continue;
                }
            };
            let oid = reference
                .peel_to_commit()
                .map_err(|e| GitError::from_git2(e, &refname))?
                .id();

            result.push(RemoteRef {
                remote,
                name,
                oid: Oid::new(oid.to_string())?,
            });
        }
        Ok(result)
    }

    /// List configured remotes with their URLs.
    pub fn remotes(&self) -> Result<Vec<RemoteInfo>, GitError> {
        let names = self.repo.remotes()?;
        let mut result = Vec::new();
        for name in names.iter().flatten() {
            let remote = self
                .repo
                .find_remote(name)
                .map_err(|e| GitError::from_git2(e, name))?;
            result.push(RemoteInfo {
                name: name.to_string(),
                urls: remote.url().map(str::to_string).into_iter().collect(),
            });
        }
        Ok(result)
    }

    /// Everything the branch catalog needs, in one call.
    pub fn ref_listing(&self) -> Result<RefListing, GitError> {
        Ok(RefListing {
            local: self.list_local_branches()?,
            remote: self.list_remote_branches()?,
            remotes: self.remotes()?,
        })
    }
}
