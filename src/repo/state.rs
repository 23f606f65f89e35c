//! repo::state
//!
//! Immutable repository snapshots.

use std::path::Path;

use super::branches::{Branch, BranchCollection};
use super::error::RepoError;
use super::head::HeadInfo;
use crate::core::paths::{RepoContext, RepoPaths};
use crate::core::types::{BranchName, Fingerprint, Oid, RefName, UtcTimestamp};
use crate::git::{GitState, RemoteInfo};

/// Whether a snapshot reflects at least one successful refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Registered, never refreshed
    Stale,
    /// Populated by a refresh
    Fresh,
}

/// One consistent view of a tracked root.
///
/// Snapshots are never mutated. A refresh builds a new one and swaps it in,
/// so a reader holding an `Arc<RepositoryState>` never sees a partial update.
#[derive(Debug, Clone)]
pub struct RepositoryState {
    paths: RepoPaths,
    freshness: Freshness,
    branches: BranchCollection,
    head: HeadInfo,
    git_state: GitState,
    remotes: Vec<RemoteInfo>,
    refreshed_at: Option<UtcTimestamp>,
    fingerprint: Option<Fingerprint>,
}

impl RepositoryState {
    /// The empty snapshot a root starts with.
    pub fn stale(paths: RepoPaths) -> Self {
        Self {
            paths,
            freshness: Freshness::Stale,
            branches: BranchCollection::default(),
            head: HeadInfo::default(),
            git_state: GitState::Clean,
            remotes: Vec::new(),
            refreshed_at: None,
            fingerprint: None,
        }
    }

    /// A snapshot produced by a refresh.
    pub fn fresh(
        paths: RepoPaths,
        branches: BranchCollection,
        head: HeadInfo,
        git_state: GitState,
        remotes: Vec<RemoteInfo>,
    ) -> Self {
        let fingerprint = Some(fingerprint(&branches, &head, &git_state));
        Self {
            paths,
            freshness: Freshness::Fresh,
            branches,
            head,
            git_state,
            remotes,
            refreshed_at: Some(UtcTimestamp::now()),
            fingerprint,
        }
    }

    pub fn root(&self) -> &Path {
        self.paths.work_dir()
    }

    pub fn paths(&self) -> &RepoPaths {
        &self.paths
    }

    pub fn context(&self) -> RepoContext {
        self.paths.context()
    }

    pub fn freshness(&self) -> Freshness {
        self.freshness
    }

    pub fn is_fresh(&self) -> bool {
        self.freshness == Freshness::Fresh
    }

    pub fn branches(&self) -> &BranchCollection {
        &self.branches
    }

    pub fn head(&self) -> &HeadInfo {
        &self.head
    }

    /// Checked-out branch, `None` when detached.
    pub fn current_branch_name(&self) -> Option<&str> {
        self.head.branch.as_ref().map(BranchName::as_str)
    }

    /// Commit HEAD resolves to, `None` when unborn.
    pub fn current_revision(&self) -> Option<&Oid> {
        self.head.revision.as_ref()
    }

    /// The checked-out branch as a collection member.
    pub fn current_branch(&self) -> Option<Branch> {
        self.current_branch_name()
            .and_then(|name| self.branches.find_local_branch(name))
            .cloned()
            .map(Branch::Local)
    }

    /// See [`HeadInfo::require_branch`].
    pub fn require_branch(&self) -> Result<&BranchName, RepoError> {
        self.head.require_branch(self.root())
    }

    pub fn git_state(&self) -> &GitState {
        &self.git_state
    }

    pub fn remotes(&self) -> &[RemoteInfo] {
        &self.remotes
    }

    pub fn refreshed_at(&self) -> Option<&UtcTimestamp> {
        self.refreshed_at.as_ref()
    }

    /// Hash over refs, HEAD and operation state. `None` while stale.
    pub fn fingerprint(&self) -> Option<&Fingerprint> {
        self.fingerprint.as_ref()
    }
}

fn fingerprint(branches: &BranchCollection, head: &HeadInfo, git_state: &GitState) -> Fingerprint {
    let mut entries: Vec<(String, String)> = Vec::new();

    for branch in branches.local_branches() {
        if let Some(oid) = branches.local_hash(branch.name_for_local_operations()) {
            let upstream = branches
                .tracked_branch(branch)
                .map(|u| format!(" {}", u))
                .unwrap_or_default();
            entries.push((
                RefName::for_branch(branch.name()).to_string(),
                format!("{}{}", oid, upstream),
            ));
        }
    }
    for branch in branches.remote_branches() {
        if let Some(oid) = branches.hash(&Branch::Remote(branch.clone())) {
            entries.push((
                RefName::for_remote_branch(branch.remote(), branch.name()).to_string(),
                oid.to_string(),
            ));
        }
    }

    let head_value = match (&head.branch, &head.revision) {
        (Some(b), Some(o)) => format!("ref: {} {}", b, o),
        (Some(b), None) => format!("ref: {}", b),
        (None, Some(o)) => o.to_string(),
        (None, None) => String::new(),
    };
    entries.push(("HEAD".to_string(), head_value));
    entries.push(("STATE".to_string(), git_state.to_string()));

    Fingerprint::compute(entries)
}
