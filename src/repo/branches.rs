//! repo::branches
//!
//! Branch identities and the immutable branch collection.
//!
//! Local and remote-tracking branches live in disjoint namespaces. A remote
//! branch is displayed as `<remote>/<name>` but pushes and fetches by `<name>`.
//! Lookups are exact and case-sensitive; an unknown name yields `None`.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::core::types::{BranchName, Oid};

/// A local branch (`refs/heads/<name>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct LocalBranch {
    name: BranchName,
}

impl LocalBranch {
    pub fn new(name: BranchName) -> Self {
        Self { name }
    }

    pub fn name(&self) -> &BranchName {
        &self.name
    }

    pub fn name_for_local_operations(&self) -> &str {
        self.name.as_str()
    }

    pub fn name_for_remote_operations(&self) -> &str {
        self.name.as_str()
    }
}

impl std::fmt::Display for LocalBranch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A remote-tracking branch (`refs/remotes/<remote>/<name>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RemoteBranch {
    remote: String,
    name: BranchName,
}

impl RemoteBranch {
    pub fn new(remote: impl Into<String>, name: BranchName) -> Self {
        Self {
            remote: remote.into(),
            name,
        }
    }

    /// The remote this branch belongs to.
    pub fn remote(&self) -> &str {
        &self.remote
    }

    /// The branch name on the remote, without the remote prefix.
    pub fn name(&self) -> &BranchName {
        &self.name
    }

    /// `<remote>/<name>`, as shown locally.
    ///
    /// # Example
    ///
    /// ```
    /// use worktrack::core::types::BranchName;
    /// use worktrack::repo::RemoteBranch;
    ///
    /// let b = RemoteBranch::new("origin", BranchName::new("feature").unwrap());
    /// assert_eq!(b.name_for_local_operations(), "origin/feature");
    /// assert_eq!(b.name_for_remote_operations(), "feature");
    /// ```
    pub fn name_for_local_operations(&self) -> String {
        format!("{}/{}", self.remote, self.name)
    }

    /// `<name>`, as known to the remote.
    pub fn name_for_remote_operations(&self) -> &str {
        self.name.as_str()
    }
}

impl std::fmt::Display for RemoteBranch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.remote, self.name)
    }
}

/// Either kind of branch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Branch {
    Local(LocalBranch),
    Remote(RemoteBranch),
}

impl Branch {
    pub fn is_remote(&self) -> bool {
        matches!(self, Branch::Remote(_))
    }

    /// Display name (`name` or `remote/name`).
    pub fn name_for_local_operations(&self) -> String {
        match self {
            Branch::Local(b) => b.name_for_local_operations().to_string(),
            Branch::Remote(b) => b.name_for_local_operations(),
        }
    }
}

impl From<LocalBranch> for Branch {
    fn from(b: LocalBranch) -> Self {
        Branch::Local(b)
    }
}

impl From<RemoteBranch> for Branch {
    fn from(b: RemoteBranch) -> Self {
        Branch::Remote(b)
    }
}

impl std::fmt::Display for Branch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Branch::Local(b) => write!(f, "{}", b),
            Branch::Remote(b) => write!(f, "{}", b),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LocalEntry {
    pub hash: Oid,
    pub upstream: Option<RemoteBranch>,
}

/// Immutable snapshot of every branch known at the last refresh.
///
/// Built by [`build_catalog`](super::build_catalog). Membership is set-like:
/// a name is unique within its namespace. Equality compares contents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BranchCollection {
    local: BTreeMap<LocalBranch, LocalEntry>,
    remote: BTreeMap<RemoteBranch, Oid>,
}

impl BranchCollection {
    pub(crate) fn from_parts(
        local: BTreeMap<LocalBranch, LocalEntry>,
        remote: BTreeMap<RemoteBranch, Oid>,
    ) -> Self {
        Self { local, remote }
    }

    pub fn local_branches(&self) -> impl Iterator<Item = &LocalBranch> {
        self.local.keys()
    }

    pub fn remote_branches(&self) -> impl Iterator<Item = &RemoteBranch> {
        self.remote.keys()
    }

    /// Find a local branch by exact name.
    pub fn find_local_branch(&self, name: &str) -> Option<&LocalBranch> {
        self.local
            .keys()
            .find(|b| b.name_for_local_operations() == name)
    }

    /// Find a remote branch by its display name (`origin/feature`).
    pub fn find_remote_branch(&self, name: &str) -> Option<&RemoteBranch> {
        self.remote.keys().find(|b| {
            name.strip_prefix(b.remote())
                .and_then(|rest| rest.strip_prefix('/'))
                == Some(b.name.as_str())
        })
    }

    /// Find a branch by display name, local namespace first.
    pub fn find_branch_by_name(&self, name: &str) -> Option<Branch> {
        self.find_local_branch(name)
            .cloned()
            .map(Branch::Local)
            .or_else(|| self.find_remote_branch(name).cloned().map(Branch::Remote))
    }

    /// Commit a branch points at.
    pub fn hash(&self, branch: &Branch) -> Option<&Oid> {
        match branch {
            Branch::Local(b) => self.local.get(b).map(|e| &e.hash),
            Branch::Remote(b) => self.remote.get(b),
        }
    }

    /// Commit of a local branch, by name.
    pub fn local_hash(&self, name: &str) -> Option<&Oid> {
        self.find_local_branch(name)
            .and_then(|b| self.local.get(b))
            .map(|e| &e.hash)
    }

    /// Commit of a remote branch, by display name.
    pub fn remote_hash(&self, name: &str) -> Option<&Oid> {
        self.find_remote_branch(name)
            .and_then(|b| self.remote.get(b))
    }

    /// Remote branch a local branch tracks, when configured and present.
    pub fn tracked_branch(&self, branch: &LocalBranch) -> Option<&RemoteBranch> {
        self.local.get(branch).and_then(|e| e.upstream.as_ref())
    }

    /// Number of local plus remote branches.
    pub fn len(&self) -> usize {
        self.local.len() + self.remote.len()
    }

    pub fn is_empty(&self) -> bool {
        self.local.is_empty() && self.remote.is_empty()
    }
}
