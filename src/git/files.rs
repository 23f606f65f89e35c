//! git::files
//!
//! Plain-file reader for the on-disk git metadata layout.
//!
//! Reads the same information as [`super::Git`] without libgit2:
//! - `HEAD` from the worktree's `git_dir`
//! - loose refs under `<common_dir>/refs/` and `<common_dir>/packed-refs`
//!   (a loose ref wins over its packed entry)
//! - remotes and branch upstreams from `<common_dir>/config`
//! - operation markers (`MERGE_HEAD`, `rebase-merge/`, ...) from `git_dir`
//!
//! Only the small marker and ref files are read; objects are never opened,
//! so annotated tags are not peeled. Branch refs always point at commits.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::interface::{
    merge_ref_branch, GitError, GitState, HeadTarget, LocalRef, RefListing, RemoteInfo, RemoteRef,
    Upstream,
};
use crate::core::paths::RepoPaths;
use crate::core::types::{BranchName, Oid, RefName};

/// Symbolic refs are followed at most this many hops.
const MAX_SYMREF_DEPTH: usize = 5;

/// Contents of one ref file: a symbolic pointer or a direct object id.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RefValue {
    Symbolic(String),
    Direct(Oid),
}

/// Parse the contents of `HEAD` or a loose ref file.
fn parse_ref_value(path: &Path, contents: &str) -> Result<RefValue, GitError> {
    let line = contents.lines().next().unwrap_or("").trim();
    if let Some(target) = line.strip_prefix("ref:") {
        return Ok(RefValue::Symbolic(target.trim().to_string()));
    }
    Oid::new(line)
        .map(RefValue::Direct)
        .map_err(|e| GitError::Corrupt {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

/// Parse `packed-refs` into (refname, oid) pairs.
///
/// Comment lines (`#`) and peeled-tag lines (`^`) are skipped.
pub(crate) fn parse_packed_refs(
    path: &Path,
    contents: &str,
) -> Result<Vec<(String, Oid)>, GitError> {
    let mut refs = Vec::new();
    for (lineno, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('^') {
            continue;
        }
        let corrupt = |message: String| GitError::Corrupt {
            path: path.to_path_buf(),
            message: format!("line {}: {}", lineno + 1, message),
        };
        let (oid, refname) = line
            .split_once(' ')
            .ok_or_else(|| corrupt("expected '<oid> <refname>'".to_string()))?;
        let oid = Oid::new(oid).map_err(|e| corrupt(e.to_string()))?;
        refs.push((refname.trim().to_string(), oid));
    }
    Ok(refs)
}

/// Remotes and branch upstreams from a repository's `config` file.
///
/// Parsed by libgit2, so `include.path`, quoting and continuation lines
/// follow git's rules. A missing file reads as empty.
pub(crate) struct ConfigFile {
    path: PathBuf,
    config: Option<git2::Config>,
}

impl ConfigFile {
    pub(crate) fn open(path: &Path) -> Result<Self, GitError> {
        let config = if path.is_file() {
            Some(git2::Config::open(path).map_err(|e| config_error(path, e))?)
        } else {
            None
        };
        Ok(Self {
            path: path.to_path_buf(),
            config,
        })
    }

    /// Remotes with a `url` or `pushurl`, in declaration order.
    pub(crate) fn remotes(&self) -> Result<Vec<RemoteInfo>, GitError> {
        let Some(config) = &self.config else {
            return Ok(Vec::new());
        };
        let mut remotes: Vec<RemoteInfo> = Vec::new();
        let mut entries = config
            .entries(Some(r"^remote\..+\.(push)?url$"))
            .map_err(|e| config_error(&self.path, e))?;
        while let Some(entry) = entries.next() {
            let entry = entry.map_err(|e| config_error(&self.path, e))?;
            let Some(key) = entry.name().and_then(|n| n.strip_prefix("remote.")) else {
                continue;
            };
            let (name, url) = match key.strip_suffix(".url") {
                Some(name) => (name, entry.value()),
                None => match key.strip_suffix(".pushurl") {
                    Some(name) => (name, None),
                    None => continue,
                },
            };
            let url = url.map(str::to_string);
            match remotes.iter_mut().find(|r| r.name == name) {
                Some(remote) => remote.urls.extend(url),
                None => remotes.push(RemoteInfo {
                    name: name.to_string(),
                    urls: url.into_iter().collect(),
                }),
            }
        }
        Ok(remotes)
    }

    /// `(remote, merge)` of a branch when both keys are set.
    pub(crate) fn upstream(&self, branch: &str) -> Result<Option<(String, String)>, GitError> {
        let remote = self.get(&format!("branch.{branch}.remote"))?;
        let merge = self.get(&format!("branch.{branch}.merge"))?;
        Ok(remote.zip(merge))
    }

    fn get(&self, key: &str) -> Result<Option<String>, GitError> {
        let Some(config) = &self.config else {
            return Ok(None);
        };
        match config.get_string(key) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(config_error(&self.path, e)),
        }
    }
}

fn config_error(path: &Path, err: git2::Error) -> GitError {
    GitError::Corrupt {
        path: path.to_path_buf(),
        message: err.message().to_string(),
    }
}

/// Read rebase progress markers from a worktree's `git_dir`.
pub(crate) fn rebase_progress(git_dir: &Path) -> (Option<usize>, Option<usize>) {
    let read_number = |path: &Path| -> Option<usize> {
        fs::read_to_string(path)
            .ok()
            .and_then(|s| s.trim().parse().ok())
    };

    let rebase_merge = git_dir.join("rebase-merge");
    if rebase_merge.is_dir() {
        return (
            read_number(&rebase_merge.join("msgnum")),
            read_number(&rebase_merge.join("end")),
        );
    }

    let rebase_apply = git_dir.join("rebase-apply");
    if rebase_apply.is_dir() {
        return (
            read_number(&rebase_apply.join("next")),
            read_number(&rebase_apply.join("last")),
        );
    }

    (None, None)
}

/// Read a small file, mapping "not found" to `None`.
fn read_optional(path: &Path) -> Result<Option<String>, GitError> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(GitError::io(path, e)),
    }
}

/// Plain-file git reader for one tracked root.
#[derive(Debug, Clone)]
pub struct GitFiles {
    paths: RepoPaths,
}

impl GitFiles {
    /// Create a reader over resolved metadata locations.
    pub fn new(paths: RepoPaths) -> Self {
        Self { paths }
    }

    /// The metadata locations this reader uses.
    pub fn paths(&self) -> &RepoPaths {
        &self.paths
    }

    /// Get the in-progress operation state of this worktree.
    pub fn state(&self) -> GitState {
        let marker = |name: &str| self.paths.marker_path(name).exists();

        if self.paths.marker_path("rebase-merge").is_dir() {
            let (current, total) = rebase_progress(self.paths.git_dir());
            return GitState::Rebase { current, total };
        }
        if self.paths.marker_path("rebase-apply").is_dir() {
            if marker("rebase-apply/applying") {
                return GitState::ApplyMailbox;
            }
            let (current, total) = rebase_progress(self.paths.git_dir());
            return GitState::Rebase { current, total };
        }
        if marker("MERGE_HEAD") {
            return GitState::Merge;
        }
        if marker("CHERRY_PICK_HEAD") {
            return GitState::CherryPick;
        }
        if marker("REVERT_HEAD") {
            return GitState::Revert;
        }
        if marker("BISECT_LOG") {
            return GitState::Bisect;
        }
        GitState::Clean
    }

    /// Read the worktree-specific HEAD.
    ///
    /// # Errors
    ///
    /// - [`GitError::RefNotFound`] if the HEAD file is missing
    /// - [`GitError::Corrupt`] if it holds neither `ref:` nor an object id
    pub fn head_target(&self) -> Result<HeadTarget, GitError> {
        let path = self.paths.head_path();
        let contents = read_optional(&path)?.ok_or_else(|| GitError::RefNotFound {
            refname: "HEAD".to_string(),
        })?;

        match parse_ref_value(&path, &contents)? {
            RefValue::Direct(oid) => Ok(HeadTarget::Detached { oid }),
            RefValue::Symbolic(target) => {
                let short =
                    target
                        .strip_prefix(RefName::HEADS)
                        .ok_or_else(|| GitError::InvalidRefName {
                            message: format!("HEAD points outside refs/heads/: {}", target),
                        })?;
                let name = BranchName::from_ref(short)?;
                let oid = self.try_resolve_ref(&target)?;
                Ok(HeadTarget::Branch { name, oid })
            }
        }
    }

    /// Resolve a ref in the shared store, following symbolic loose refs.
    pub fn try_resolve_ref(&self, refname: &str) -> Result<Option<Oid>, GitError> {
        let mut current = refname.to_string();
        for _ in 0..MAX_SYMREF_DEPTH {
            let loose = self.paths.loose_ref_path(&current);
            match read_optional(&loose)? {
                Some(contents) => match parse_ref_value(&loose, &contents)? {
                    RefValue::Direct(oid) => return Ok(Some(oid)),
                    RefValue::Symbolic(next) => current = next,
                },
                None => return self.packed_lookup(&current),
            }
        }
        Err(GitError::Corrupt {
            path: self.paths.loose_ref_path(refname),
            message: "symbolic ref chain too deep".to_string(),
        })
    }

    fn packed_refs(&self) -> Result<Vec<(String, Oid)>, GitError> {
        let path = self.paths.packed_refs_path();
        match read_optional(&path)? {
            Some(contents) => parse_packed_refs(&path, &contents),
            None => Ok(Vec::new()),
        }
    }

    fn packed_lookup(&self, refname: &str) -> Result<Option<Oid>, GitError> {
        Ok(self
            .packed_refs()?
            .into_iter()
            .find(|(name, _)| name == refname)
            .map(|(_, oid)| oid))
    }

    /// List direct refs under a prefix (`refs/heads/`), loose over packed.
    ///
    /// Symbolic loose refs (such as `refs/remotes/origin/HEAD`) are skipped.
    pub fn list_refs(&self, prefix: &str) -> Result<Vec<(RefName, Oid)>, GitError> {
        let mut refs: BTreeMap<String, Option<Oid>> = self
            .packed_refs()?
            .into_iter()
            .filter(|(name, _)| name.starts_with(prefix))
            .map(|(name, oid)| (name, Some(oid)))
            .collect();

        let root = self.paths.common_dir().join(prefix.trim_end_matches('/'));
        if root.is_dir() {
            for entry in WalkDir::new(&root).follow_links(false) {
                let entry = entry.map_err(|e| GitError::AccessError {
                    message: format!("{}: {}", root.display(), e),
                })?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let path = entry.path();
                if path.extension().is_some_and(|ext| ext == "lock") {
                    continue;
                }
                let Ok(relative) = path.strip_prefix(self.paths.common_dir()) else {
                    continue;
                };
                let Some(refname) = relative.to_str().map(|s| s.replace('\\', "/")) else {
                    tracing::warn!(path = %path.display(), "skipping ref with non-UTF-8 name");
                    continue;
                };
                let contents = fs::read_to_string(path).map_err(|e| GitError::io(path, e))?;
                let value = match parse_ref_value(path, &contents)? {
                    RefValue::Direct(oid) => Some(oid),
                    RefValue::Symbolic(_) => None,
                };
                refs.insert(refname, value);
            }
        }

        let mut result = Vec::new();
        for (name, oid) in refs {
            let Some(oid) = oid else {
                continue;
            };
            match RefName::new(name.as_str()) {
                Ok(refname) => result.push((refname, oid)),
                Err(e) => tracing::warn!(%name, error = %e, "skipping invalid ref name"),
            }
        }
        Ok(result)
    }

    fn config(&self) -> Result<ConfigFile, GitError> {
        ConfigFile::open(&self.paths.config_path())
    }

    /// List configured remotes with their URLs.
    pub fn remotes(&self) -> Result<Vec<RemoteInfo>, GitError> {
        self.config()?.remotes()
    }

    /// List all local branches with their target commits and upstreams.
    pub fn list_local_branches(&self) -> Result<Vec<LocalRef>, GitError> {
        let config = self.config()?;
        let mut result = Vec::new();
        for (refname, oid) in self.list_refs(RefName::HEADS)? {
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
            let upstream = config
                .upstream(name.as_str())?
                .filter(|(remote, _)| remote != ".")
                .and_then(|(remote, merge)| {
                    merge_ref_branch(&merge).map(|branch| Upstream { remote, branch })
                });
            result.push(LocalRef {
                name,
                oid,
                upstream,
            });
        }
        Ok(result)
    }

    /// List remote-tracking branches of configured remotes.
    ///
    /// The remote owning a ref is the configured remote with the longest
    /// matching name, so remotes containing `/` resolve correctly.
    pub fn list_remote_branches(&self) -> Result<Vec<RemoteRef>, GitError> {
        let mut remotes: Vec<String> = self.remotes()?.into_iter().map(|r| r.name).collect();
        remotes.sort_by_key(|name| std::cmp::Reverse(name.len()));

        let mut result = Vec::new();
        for (refname, oid) in self.list_refs(RefName::REMOTES)? {
            let Some(rest) = refname.strip_prefix(RefName::REMOTES) else {
                continue;
            };
            let owner = remotes.iter().find_map(|remote| {
                rest.strip_prefix(remote.as_str())
                    .and_then(|r| r.strip_prefix('/'))
                    .map(|short| (remote.clone(), short))
            });
            let Some((remote, short)) = owner else {
                tracing::debug!(%refname, "no configured remote owns ref");
                continue;
            };
            let name = match BranchName::from_ref(short) {
                Ok(n) => n,
                Err(e) => {
                    tracing::warn!(%refname, error = %e, "skipping remote branch with invalid name");
                    continue;
                }
            };
            result.push(RemoteRef { remote, name, oid });
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
