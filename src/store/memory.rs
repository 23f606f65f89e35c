//! store::memory
//!
//! In-memory metadata store for deterministic testing.
//!
//! # Design
//!
//! Models the shape of a multi-worktree repository without touching disk:
//! refs, remotes and upstreams live in one shared ref store per
//! `common_dir`, while HEAD and operation state live per worktree. Helper
//! methods mirror the git commands a fixture would run (`commit`,
//! `checkout_new_branch`, `push`, ...).
//!
//! Failure injection and read instrumentation make it possible to test
//! refresh semantics (prior snapshot kept on failure, one refresh per root
//! at a time) without a git binary.
//!
//! # Example
//!
//! ```
//! use worktrack::store::{MemoryStore, MetadataStore};
//! use std::path::Path;
//!
//! let store = MemoryStore::new();
//! store.add_repository("/repo");
//! let first = store.commit("/repo");
//! store.add_worktree("/repo", "/work/project", "project");
//!
//! let paths = store.locate(Path::new("/work/project")).unwrap();
//! assert!(paths.is_worktree());
//! assert_eq!(store.read_refs(&paths).unwrap().local.len(), 2);
//! # let _ = first;
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::registry::StoreKind;
use super::traits::{MetadataStore, StoreError};
use crate::core::paths::RepoPaths;
use crate::core::types::{BranchName, Oid};
use crate::git::{
    GitState, HeadTarget, LocalRef, RefListing, RemoteInfo, RemoteRef, Upstream,
};

/// In-memory store for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping; clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    /// Shared ref stores by common_dir.
    repos: HashMap<PathBuf, SharedRefs>,
    /// Worktrees by work_dir.
    worktrees: HashMap<PathBuf, WorktreeEntry>,
    /// Counter for generated commit ids.
    next_commit: u64,
    fail_on: Option<FailOn>,
    operations: Vec<MemoryOperation>,
    read_delay: Option<Duration>,
    in_flight: HashMap<PathBuf, usize>,
    max_in_flight: HashMap<PathBuf, usize>,
}

#[derive(Debug, Default)]
struct SharedRefs {
    local: BTreeMap<BranchName, (Oid, Option<Upstream>)>,
    remote: BTreeMap<(String, BranchName), Oid>,
    remotes: Vec<RemoteInfo>,
    /// Raw listing entries appended verbatim (for duplicate handling tests).
    extra_local: Vec<LocalRef>,
}

#[derive(Debug)]
struct WorktreeEntry {
    paths: RepoPaths,
    head: Option<HeadValue>,
    state: GitState,
}

#[derive(Debug, Clone)]
enum HeadValue {
    Symbolic(BranchName),
    Detached(Oid),
}

/// Which read should fail.
#[derive(Debug, Clone)]
pub enum FailOn {
    Locate(StoreError),
    ReadRefs(StoreError),
    ReadHead(StoreError),
    ReadState(StoreError),
}

/// Recorded read for test verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryOperation {
    Locate { root: PathBuf },
    ReadRefs { root: PathBuf },
    ReadHead { root: PathBuf },
    ReadState { root: PathBuf },
}

fn branch(name: &str) -> BranchName {
    BranchName::new(name).unwrap_or_else(|e| panic!("invalid fixture branch name: {e}"))
}

fn fake_oid(n: u64) -> Oid {
    Oid::new(format!("{:040x}", n)).unwrap_or_else(|e| panic!("generated oid rejected: {e}"))
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every `read_refs` call, keeping it in flight for `delay`.
    pub fn with_read_delay(self, delay: Duration) -> Self {
        self.lock().read_delay = Some(delay);
        self
    }

    /// Make one kind of read fail until cleared.
    pub fn fail_on(self, fail_on: FailOn) -> Self {
        self.set_fail_on(fail_on);
        self
    }

    /// Make one kind of read fail until cleared, without consuming the store.
    pub fn set_fail_on(&self, fail_on: FailOn) {
        self.lock().fail_on = Some(fail_on);
    }

    /// Clear the failure configuration.
    pub fn clear_fail_on(&self) {
        self.lock().fail_on = None;
    }

    /// Reads performed so far.
    pub fn operations(&self) -> Vec<MemoryOperation> {
        self.lock().operations.clone()
    }

    /// Highest number of simultaneous `read_refs` calls observed for a root.
    pub fn max_concurrent_reads(&self, root: impl AsRef<Path>) -> usize {
        self.lock()
            .max_in_flight
            .get(root.as_ref())
            .copied()
            .unwrap_or(0)
    }

    // =========================================================================
    // Fixture helpers
    // =========================================================================
    //
    // These panic on unknown roots or invalid names: they build test fixtures
    // and a mistake there is a bug in the test.

    /// Add a primary clone at `root` with an unborn `master` checked out.
    pub fn add_repository(&self, root: impl AsRef<Path>) -> RepoPaths {
        let root = root.as_ref().to_path_buf();
        let git_dir = root.join(".git");
        let paths = RepoPaths::new(root.clone(), git_dir.clone(), git_dir.clone());

        let mut inner = self.lock();
        inner.repos.entry(git_dir).or_default();
        inner.worktrees.insert(
            root,
            WorktreeEntry {
                paths: paths.clone(),
                head: Some(HeadValue::Symbolic(branch("master"))),
                state: GitState::Clean,
            },
        );
        paths
    }

    /// Add a linked worktree of `primary` at `root` with `branch_name` checked
    /// out, creating the branch at the primary's HEAD commit if needed.
    pub fn add_worktree(
        &self,
        primary: impl AsRef<Path>,
        root: impl AsRef<Path>,
        branch_name: &str,
    ) -> RepoPaths {
        let root = root.as_ref().to_path_buf();
        let name = branch(branch_name);

        let mut inner = self.lock();
        let primary_entry = inner
            .worktrees
            .get(primary.as_ref())
            .unwrap_or_else(|| panic!("unknown root {}", primary.as_ref().display()));
        let common_dir = primary_entry.paths.common_dir.clone();
        let start = inner.head_revision(primary.as_ref());

        let worktree_name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| branch_name.to_string());
        let paths = RepoPaths::new(
            root.clone(),
            common_dir.join("worktrees").join(worktree_name),
            common_dir.clone(),
        );

        let refs = inner.repos.entry(common_dir).or_default();
        if let Some(oid) = start {
            refs.local.entry(name.clone()).or_insert((oid, None));
        }
        inner.worktrees.insert(
            root,
            WorktreeEntry {
                paths: paths.clone(),
                head: Some(HeadValue::Symbolic(name)),
                state: GitState::Clean,
            },
        );
        paths
    }

    /// Record a new commit on whatever HEAD of `root` points at.
    pub fn commit(&self, root: impl AsRef<Path>) -> Oid {
        let mut inner = self.lock();
        inner.next_commit += 1;
        let oid = fake_oid(inner.next_commit);

        let (common_dir, head) = inner.head_of(root.as_ref());
        match head {
            Some(HeadValue::Symbolic(name)) => {
                let refs = inner.repos.entry(common_dir).or_default();
                let upstream = refs.local.get(&name).and_then(|(_, u)| u.clone());
                refs.local.insert(name, (oid.clone(), upstream));
            }
            Some(HeadValue::Detached(_)) | None => {
                inner.worktree_mut(root.as_ref()).head = Some(HeadValue::Detached(oid.clone()));
            }
        }
        oid
    }

    /// Set a local branch to `oid` in the store shared by `root`.
    pub fn set_branch(&self, root: impl AsRef<Path>, name: &str, oid: &Oid) {
        let mut inner = self.lock();
        let (common_dir, _) = inner.head_of(root.as_ref());
        let refs = inner.repos.entry(common_dir).or_default();
        let upstream = refs.local.get(&branch(name)).and_then(|(_, u)| u.clone());
        refs.local.insert(branch(name), (oid.clone(), upstream));
    }

    /// Delete a local branch.
    pub fn delete_branch(&self, root: impl AsRef<Path>, name: &str) {
        let mut inner = self.lock();
        let (common_dir, _) = inner.head_of(root.as_ref());
        if let Some(refs) = inner.repos.get_mut(&common_dir) {
            refs.local.remove(&branch(name));
        }
    }

    /// Append a raw local ref to the listing, bypassing name deduplication.
    pub fn push_raw_local(&self, root: impl AsRef<Path>, name: &str, oid: &Oid) {
        let mut inner = self.lock();
        let (common_dir, _) = inner.head_of(root.as_ref());
        inner
            .repos
            .entry(common_dir)
            .or_default()
            .extra_local
            .push(LocalRef {
                name: branch(name),
                oid: oid.clone(),
                upstream: None,
            });
    }

    /// Create `name` at the current revision and check it out in `root`.
    pub fn checkout_new_branch(&self, root: impl AsRef<Path>, name: &str) {
        let mut inner = self.lock();
        let revision = inner.head_revision(root.as_ref());
        let (common_dir, _) = inner.head_of(root.as_ref());
        if let Some(oid) = revision {
            inner
                .repos
                .entry(common_dir)
                .or_default()
                .local
                .insert(branch(name), (oid, None));
        }
        inner.worktree_mut(root.as_ref()).head = Some(HeadValue::Symbolic(branch(name)));
    }

    /// Check out an existing branch in `root`.
    pub fn checkout(&self, root: impl AsRef<Path>, name: &str) {
        self.lock().worktree_mut(root.as_ref()).head = Some(HeadValue::Symbolic(branch(name)));
    }

    /// Detach HEAD of `root` at its current revision.
    pub fn detach_head(&self, root: impl AsRef<Path>) {
        let mut inner = self.lock();
        let revision = inner.head_revision(root.as_ref());
        let entry = inner.worktree_mut(root.as_ref());
        entry.head = revision.map(HeadValue::Detached);
    }

    /// Remove HEAD of `root` entirely.
    pub fn remove_head(&self, root: impl AsRef<Path>) {
        self.lock().worktree_mut(root.as_ref()).head = None;
    }

    /// Set the in-progress operation state of `root`.
    pub fn set_state(&self, root: impl AsRef<Path>, state: GitState) {
        self.lock().worktree_mut(root.as_ref()).state = state;
    }

    /// Configure a remote in the store shared by `root`.
    pub fn add_remote(&self, root: impl AsRef<Path>, name: &str, url: &str) {
        let mut inner = self.lock();
        let (common_dir, _) = inner.head_of(root.as_ref());
        let refs = inner.repos.entry(common_dir).or_default();
        refs.remotes.retain(|r| r.name != name);
        refs.remotes.push(RemoteInfo {
            name: name.to_string(),
            urls: vec![url.to_string()],
        });
    }

    /// Remove a remote from configuration, leaving its tracking refs behind.
    pub fn remove_remote(&self, root: impl AsRef<Path>, name: &str) {
        let mut inner = self.lock();
        let (common_dir, _) = inner.head_of(root.as_ref());
        if let Some(refs) = inner.repos.get_mut(&common_dir) {
            refs.remotes.retain(|r| r.name != name);
        }
    }

    /// Set a remote-tracking branch directly.
    pub fn set_remote_branch(&self, root: impl AsRef<Path>, remote: &str, name: &str, oid: &Oid) {
        let mut inner = self.lock();
        let (common_dir, _) = inner.head_of(root.as_ref());
        inner
            .repos
            .entry(common_dir)
            .or_default()
            .remote
            .insert((remote.to_string(), branch(name)), oid.clone());
    }

    /// Push a local branch: copy its commit to `remote/<name>` and set the
    /// branch's upstream, as `git push -u` does.
    pub fn push(&self, root: impl AsRef<Path>, remote: &str, name: &str) {
        let mut inner = self.lock();
        let (common_dir, _) = inner.head_of(root.as_ref());
        let refs = inner.repos.entry(common_dir).or_default();
        let name = branch(name);
        let Some((oid, upstream)) = refs.local.get_mut(&name) else {
            panic!("cannot push unknown branch {name}");
        };
        *upstream = Some(Upstream {
            remote: remote.to_string(),
            branch: name.clone(),
        });
        let oid = oid.clone();
        refs.remote.insert((remote.to_string(), name), oid);
    }

    /// Current revision of `root`'s HEAD.
    pub fn head_revision(&self, root: impl AsRef<Path>) -> Option<Oid> {
        self.lock().head_revision(root.as_ref())
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, op: MemoryOperation) {
        self.lock().operations.push(op);
    }

    fn check_fail(&self, op: &MemoryOperation) -> Result<(), StoreError> {
        let inner = self.lock();
        match (&inner.fail_on, op) {
            (Some(FailOn::Locate(e)), MemoryOperation::Locate { .. })
            | (Some(FailOn::ReadRefs(e)), MemoryOperation::ReadRefs { .. })
            | (Some(FailOn::ReadHead(e)), MemoryOperation::ReadHead { .. })
            | (Some(FailOn::ReadState(e)), MemoryOperation::ReadState { .. }) => Err(e.clone()),
            _ => Ok(()),
        }
    }

    /// Record, check the failure configuration, and look up the worktree.
    fn begin(&self, op: MemoryOperation, paths: &RepoPaths) -> Result<(), StoreError> {
        self.record(op.clone());
        self.check_fail(&op)?;
        if self.lock().worktrees.contains_key(paths.work_dir()) {
            Ok(())
        } else {
            Err(StoreError::NotARepository {
                path: paths.work_dir.clone(),
            })
        }
    }
}

impl MemoryInner {
    fn worktree_mut(&mut self, root: &Path) -> &mut WorktreeEntry {
        self.worktrees
            .get_mut(root)
            .unwrap_or_else(|| panic!("unknown root {}", root.display()))
    }

    fn head_of(&self, root: &Path) -> (PathBuf, Option<HeadValue>) {
        let entry = self
            .worktrees
            .get(root)
            .unwrap_or_else(|| panic!("unknown root {}", root.display()));
        (entry.paths.common_dir.clone(), entry.head.clone())
    }

    fn head_revision(&self, root: &Path) -> Option<Oid> {
        let (common_dir, head) = self.head_of(root);
        match head? {
            HeadValue::Detached(oid) => Some(oid),
            HeadValue::Symbolic(name) => self
                .repos
                .get(&common_dir)
                .and_then(|refs| refs.local.get(&name))
                .map(|(oid, _)| oid.clone()),
        }
    }
}

/// Decrements the in-flight counter for a root when dropped.
struct InFlight<'a> {
    store: &'a MemoryStore,
    root: PathBuf,
}

impl<'a> InFlight<'a> {
    fn enter(store: &'a MemoryStore, root: &Path) -> Self {
        let mut inner = store.lock();
        let count = inner.in_flight.entry(root.to_path_buf()).or_insert(0);
        *count += 1;
        let current = *count;
        let max = inner.max_in_flight.entry(root.to_path_buf()).or_insert(0);
        *max = (*max).max(current);
        Self {
            store,
            root: root.to_path_buf(),
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Some(count) = self.store.lock().in_flight.get_mut(&self.root) {
            *count = count.saturating_sub(1);
        }
    }
}

impl MetadataStore for MemoryStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Memory
    }

    fn locate(&self, root: &Path) -> Result<RepoPaths, StoreError> {
        let op = MemoryOperation::Locate {
            root: root.to_path_buf(),
        };
        self.record(op.clone());
        self.check_fail(&op)?;
        self.lock()
            .worktrees
            .get(root)
            .map(|entry| entry.paths.clone())
            .ok_or_else(|| StoreError::NotARepository {
                path: root.to_path_buf(),
            })
    }

    fn read_refs(&self, paths: &RepoPaths) -> Result<RefListing, StoreError> {
        let op = MemoryOperation::ReadRefs {
            root: paths.work_dir.clone(),
        };
        self.begin(op, paths)?;

        let _in_flight = InFlight::enter(self, paths.work_dir());
        let delay = self.lock().read_delay;
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }

        let inner = self.lock();
        let Some(refs) = inner.repos.get(paths.common_dir()) else {
            return Ok(RefListing::default());
        };

        let mut local: Vec<LocalRef> = refs
            .local
            .iter()
            .map(|(name, (oid, upstream))| LocalRef {
                name: name.clone(),
                oid: oid.clone(),
                upstream: upstream.clone(),
            })
            .collect();
        local.extend(refs.extra_local.iter().cloned());

        let remote = refs
            .remote
            .iter()
            .map(|((remote, name), oid)| RemoteRef {
                remote: remote.clone(),
                name: name.clone(),
                oid: oid.clone(),
            })
            .collect();

        Ok(RefListing {
            local,
            remote,
            remotes: refs.remotes.clone(),
        })
    }

    fn read_head(&self, paths: &RepoPaths) -> Result<HeadTarget, StoreError> {
        let op = MemoryOperation::ReadHead {
            root: paths.work_dir.clone(),
        };
        self.begin(op, paths)?;

        let inner = self.lock();
        let (common_dir, head) = inner.head_of(paths.work_dir());
        match head {
            None => Err(StoreError::MissingHead {
                message: format!("{} does not exist", paths.head_path().display()),
            }),
            Some(HeadValue::Detached(oid)) => Ok(HeadTarget::Detached { oid }),
            Some(HeadValue::Symbolic(name)) => {
                let oid = inner
                    .repos
                    .get(&common_dir)
                    .and_then(|refs| refs.local.get(&name))
                    .map(|(oid, _)| oid.clone());
                Ok(HeadTarget::Branch { name, oid })
            }
        }
    }

    fn read_state(&self, paths: &RepoPaths) -> Result<GitState, StoreError> {
        let op = MemoryOperation::ReadState {
            root: paths.work_dir.clone(),
        };
        self.begin(op, paths)?;
        Ok(self
            .lock()
            .worktrees
            .get(paths.work_dir())
            .map(|entry| entry.state.clone())
            .unwrap_or(GitState::Clean))
    }
}
