//! repo::catalog
//!
//! Builds a [`BranchCollection`] from the ref listing of a metadata store.
//!
//! # Rules
//!
//! - Local branches come from `refs/heads/*` of the shared ref store, so a
//!   branch created by `git worktree add` is visible from every worktree
//! - Remote-tracking branches are kept only for configured remotes,
//!   optionally narrowed by the repository's `remotes` setting
//! - The same name listed twice with the same commit collapses to one entry;
//!   with different commits the listing is inconsistent and the build fails
//! - A local branch's upstream is linked only when the remote branch exists

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use super::branches::{BranchCollection, LocalBranch, LocalEntry, RemoteBranch};
use super::error::RepoError;
use crate::core::paths::RepoPaths;
use crate::core::types::Oid;
use crate::git::RefListing;
use crate::store::MetadataStore;

/// Per-repository catalog settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogOptions {
    /// Only enumerate remote-tracking branches of these remotes.
    pub remotes: Option<Vec<String>>,
}

/// Read the shared ref store of `paths` and build its branch collection.
///
/// # Errors
///
/// [`RepoError::RepositoryReadError`] if the store cannot be read or lists
/// conflicting commits for one branch.
pub fn build_catalog(
    store: &dyn MetadataStore,
    paths: &RepoPaths,
    options: &CatalogOptions,
) -> Result<BranchCollection, RepoError> {
    let listing = store
        .read_refs(paths)
        .map_err(|e| RepoError::from_store(e, paths.work_dir()))?;
    catalog_from_listing(listing, options, paths.work_dir())
}

/// Build a collection from an already-read listing.
pub fn catalog_from_listing(
    listing: RefListing,
    options: &CatalogOptions,
    root: &Path,
) -> Result<BranchCollection, RepoError> {
    let configured: HashSet<&str> = listing
        .remotes
        .iter()
        .map(|r| r.name.as_str())
        .filter(|name| {
            options
                .remotes
                .as_ref()
                .map_or(true, |allowed| allowed.iter().any(|a| a == name))
        })
        .collect();

    let mut remote: BTreeMap<RemoteBranch, Oid> = BTreeMap::new();
    for entry in listing.remote {
        if !configured.contains(entry.remote.as_str()) {
            tracing::trace!(remote = %entry.remote, branch = %entry.name, "skipping unlisted remote");
            continue;
        }
        let branch = RemoteBranch::new(entry.remote, entry.name);
        insert_unique(&mut remote, branch, entry.oid, root)?;
    }

    let mut local: BTreeMap<LocalBranch, LocalEntry> = BTreeMap::new();
    for entry in listing.local {
        let branch = LocalBranch::new(entry.name);
        let upstream = entry
            .upstream
            .map(|u| RemoteBranch::new(u.remote, u.branch))
            .filter(|u| remote.contains_key(u));

        if let Some(existing) = local.get(&branch) {
            if existing.hash != entry.oid {
                return Err(conflict(root, &branch.to_string(), &existing.hash, &entry.oid));
            }
            continue;
        }
        local.insert(
            branch,
            LocalEntry {
                hash: entry.oid,
                upstream,
            },
        );
    }

    Ok(BranchCollection::from_parts(local, remote))
}

fn insert_unique(
    map: &mut BTreeMap<RemoteBranch, Oid>,
    branch: RemoteBranch,
    oid: Oid,
    root: &Path,
) -> Result<(), RepoError> {
    match map.get(&branch) {
        Some(existing) if *existing != oid => {
            Err(conflict(root, &branch.to_string(), existing, &oid))
        }
        Some(_) => Ok(()),
        None => {
            map.insert(branch, oid);
            Ok(())
        }
    }
}

fn conflict(root: &Path, name: &str, a: &Oid, b: &Oid) -> RepoError {
    RepoError::RepositoryReadError {
        root: root.to_path_buf(),
        message: format!(
            "branch '{}' listed at both {} and {}",
            name,
            a.short(7),
            b.short(7)
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::BranchName;
    use crate::git::{LocalRef, RemoteInfo, RemoteRef, Upstream};
    use crate::store::{FailOn, MemoryStore, StoreError};

    fn oid(c: char) -> Oid {
        Oid::new(c.to_string().repeat(40)).unwrap()
    }

    fn name(s: &str) -> BranchName {
        BranchName::new(s).unwrap()
    }

    fn local(n: &str, c: char) -> LocalRef {
        LocalRef {
            name: name(n),
            oid: oid(c),
            upstream: None,
        }
    }

    fn remote(r: &str, n: &str, c: char) -> RemoteRef {
        RemoteRef {
            remote: r.to_string(),
            name: name(n),
            oid: oid(c),
        }
    }

    fn remote_info(n: &str) -> RemoteInfo {
        RemoteInfo {
            name: n.to_string(),
            urls: vec![],
        }
    }

    fn root() -> &'static Path {
        Path::new("/repo")
    }

    #[test]
    fn duplicates_with_same_hash_collapse() {
        let listing = RefListing {
            local: vec![local("master", 'a'), local("master", 'a')],
            ..Default::default()
        };
        let branches = catalog_from_listing(listing, &CatalogOptions::default(), root()).unwrap();
        assert_eq!(branches.local_branches().count(), 1);
    }

    #[test]
    fn conflicting_hashes_are_read_errors() {
        let listing = RefListing {
            local: vec![local("master", 'a'), local("master", 'b')],
            ..Default::default()
        };
        let err = catalog_from_listing(listing, &CatalogOptions::default(), root()).unwrap_err();
        assert!(matches!(err, RepoError::RepositoryReadError { .. }));
    }

    #[test]
    fn unconfigured_remotes_are_skipped() {
        let listing = RefListing {
            remote: vec![remote("origin", "master", 'a'), remote("gone", "old", 'b')],
            remotes: vec![remote_info("origin")],
            ..Default::default()
        };
        let branches = catalog_from_listing(listing, &CatalogOptions::default(), root()).unwrap();
        assert!(branches.find_remote_branch("origin/master").is_some());
        assert!(branches.find_remote_branch("gone/old").is_none());
    }

    #[test]
    fn remotes_filter() {
        let listing = RefListing {
            remote: vec![
                remote("origin", "master", 'a'),
                remote("upstream", "master", 'b'),
            ],
            remotes: vec![remote_info("origin"), remote_info("upstream")],
            ..Default::default()
        };
        let options = CatalogOptions {
            remotes: Some(vec!["upstream".to_string()]),
        };
        let branches = catalog_from_listing(listing, &options, root()).unwrap();
        let names: Vec<_> = branches.remote_branches().map(|b| b.to_string()).collect();
        assert_eq!(names, vec!["upstream/master".to_string()]);
    }

    #[test]
    fn upstream_linked_only_when_present() {
        let mut tracked = local("master", 'a');
        tracked.upstream = Some(Upstream {
            remote: "origin".to_string(),
            branch: name("master"),
        });
        let mut dangling = local("feature", 'b');
        dangling.upstream = Some(Upstream {
            remote: "origin".to_string(),
            branch: name("feature"),
        });

        let listing = RefListing {
            local: vec![tracked, dangling],
            remote: vec![remote("origin", "master", 'a')],
            remotes: vec![remote_info("origin")],
        };
        let branches = catalog_from_listing(listing, &CatalogOptions::default(), root()).unwrap();

        let master = branches.find_local_branch("master").unwrap();
        assert!(branches.tracked_branch(master).is_some());
        let feature = branches.find_local_branch("feature").unwrap();
        assert!(branches.tracked_branch(feature).is_none());
    }

    #[test]
    fn store_failure_is_read_error() {
        let store = MemoryStore::new().fail_on(FailOn::ReadRefs(StoreError::Unreadable {
            message: "packed-refs truncated".to_string(),
        }));
        let paths = store.add_repository("/repo");
        let err = build_catalog(&store, &paths, &CatalogOptions::default()).unwrap_err();
        assert!(matches!(err, RepoError::RepositoryReadError { .. }));
    }

    #[test]
    fn worktree_branch_visible_from_primary() {
        let store = MemoryStore::new();
        let primary = store.add_repository("/repo");
        store.commit("/repo");
        let linked = store.add_worktree("/repo", "/work/project", "project");

        let from_primary = build_catalog(&store, &primary, &CatalogOptions::default()).unwrap();
        let from_linked = build_catalog(&store, &linked, &CatalogOptions::default()).unwrap();
        assert!(from_primary.find_local_branch("project").is_some());
        assert_eq!(from_primary, from_linked);
    }
}
