//! git::locator
//!
//! Resolves the metadata directories of a working directory by probing its
//! `.git` marker.
//!
//! - `.git` directory: primary clone, `git_dir == common_dir`
//! - `.git` file with `gitdir: <path>`: linked worktree; `common_dir` comes
//!   from `<git_dir>/commondir` when present
//!
//! Parent directories are never searched: the marker must sit directly in
//! the given root.

use std::fs;
use std::path::{Path, PathBuf};

use super::interface::GitError;
use crate::core::paths::RepoPaths;

const MARKER: &str = ".git";
const GITDIR_PREFIX: &str = "gitdir:";

/// Locate the metadata of the working directory at `root`.
///
/// # Errors
///
/// - [`GitError::NotARepo`] if `root` has no `.git` marker
/// - [`GitError::Corrupt`] if the marker is malformed or points nowhere
/// - [`GitError::AccessError`] if the marker cannot be read
///
/// # Example
///
/// ```no_run
/// use worktrack::git::locate;
/// use std::path::Path;
///
/// let paths = locate(Path::new("/src/project")).unwrap();
/// println!("{} ({})", paths.work_dir.display(), paths.context());
/// ```
pub fn locate(root: &Path) -> Result<RepoPaths, GitError> {
    let marker = root.join(MARKER);
    let metadata = match fs::metadata(&marker) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(GitError::NotARepo {
                path: root.to_path_buf(),
            })
        }
        Err(e) => return Err(GitError::io(&marker, e)),
    };

    if metadata.is_dir() {
        tracing::debug!(root = %root.display(), "found primary clone");
        return Ok(RepoPaths::new(root.to_path_buf(), marker.clone(), marker));
    }

    let git_dir = read_gitdir_file(root, &marker)?;
    let common_dir = read_commondir(&git_dir)?;
    tracing::debug!(
        root = %root.display(),
        git_dir = %git_dir.display(),
        common_dir = %common_dir.display(),
        "found linked worktree"
    );
    Ok(RepoPaths::new(root.to_path_buf(), git_dir, common_dir))
}

/// Parse a `.git` file and return the directory it points at.
fn read_gitdir_file(root: &Path, marker: &Path) -> Result<PathBuf, GitError> {
    let contents = fs::read_to_string(marker).map_err(|e| GitError::io(marker, e))?;
    let target = contents
        .lines()
        .find_map(|line| line.trim().strip_prefix(GITDIR_PREFIX))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| GitError::Corrupt {
            path: marker.to_path_buf(),
            message: "expected 'gitdir: <path>'".to_string(),
        })?;

    let git_dir = resolve(root, target);
    if !git_dir.is_dir() {
        return Err(GitError::Corrupt {
            path: marker.to_path_buf(),
            message: format!("gitdir does not exist: {}", git_dir.display()),
        });
    }
    Ok(git_dir)
}

/// `<git_dir>/commondir` holds the shared dir, relative to `git_dir`.
fn read_commondir(git_dir: &Path) -> Result<PathBuf, GitError> {
    let file = git_dir.join("commondir");
    let contents = match fs::read_to_string(&file) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(git_dir.to_path_buf()),
        Err(e) => return Err(GitError::io(&file, e)),
    };

    let target = contents.trim();
    if target.is_empty() {
        return Err(GitError::Corrupt {
            path: file,
            message: "empty commondir".to_string(),
        });
    }

    let common_dir = resolve(git_dir, target);
    if !common_dir.is_dir() {
        return Err(GitError::Corrupt {
            path: file,
            message: format!("commondir does not exist: {}", common_dir.display()),
        });
    }
    Ok(normalize(&common_dir))
}

fn resolve(base: &Path, target: &str) -> PathBuf {
    let target = Path::new(target);
    if target.is_absolute() {
        normalize(target)
    } else {
        normalize(&base.join(target))
    }
}

/// Collapse `.` and `..` components lexically.
///
/// `commondir` is usually `../..`, which would otherwise leave
/// `<common>/worktrees/x/../..` in every derived path.
fn normalize(path: &Path) -> PathBuf {
    use std::path::Component;

    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}
