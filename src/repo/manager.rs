//! repo::manager
//!
//! Process-wide registry of tracked roots.
//!
//! # Lifecycle
//!
//! ```text
//! Unregistered --register--> Registered(Stale) --refresh--> Registered(Fresh)
//!                                                  ^                |
//!                                                  +----refresh-----+
//! ```
//!
//! Lookup works in any registered state and returns the last computed
//! snapshot. It never refreshes. Entries are only removed by `unregister`.
//!
//! # Example
//!
//! ```ignore
//! use worktrack::repo::RepositoryManager;
//!
//! let manager = RepositoryManager::from_config(&config);
//! let mut events = manager.subscribe();
//! manager.register("/src/project")?;
//! let state = manager.refresh("/src/project").await?;
//! println!("{:?}", state.current_branch_name());
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::broadcast;
use tokio::task::JoinSet;

use super::catalog::CatalogOptions;
use super::error::RepoError;
use super::events::{EventBus, RepositoryChanged};
use super::repository::Repository;
use super::state::RepositoryState;
use crate::core::config::{Config, DEFAULT_EVENT_CAPACITY};
use crate::store::{MetadataStore, StoreKind, StoreRegistry};

/// Settings for a [`RepositoryManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Store used unless a repository config overrides it
    pub backend: StoreKind,
    /// Change-notification buffer size
    pub event_capacity: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            backend: StoreKind::LibGit,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

/// Registry mapping roots to tracked repositories.
#[derive(Debug)]
pub struct RepositoryManager {
    stores: StoreRegistry,
    config: ManagerConfig,
    repositories: RwLock<HashMap<PathBuf, Arc<Repository>>>,
    events: EventBus,
}

/// Canonical key for a path.
///
/// A path that does not exist yet is resolved through its nearest existing
/// ancestor. Without any existing ancestor the path is kept as given.
fn normalize(path: &Path) -> PathBuf {
    let mut missing = Vec::new();
    let mut current = path;
    loop {
        if let Ok(canonical) = current.canonicalize() {
            return missing
                .iter()
                .rev()
                .fold(canonical, |resolved, name| resolved.join(name));
        }
        match (current.parent(), current.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name);
                current = parent;
            }
            _ => return path.to_path_buf(),
        }
    }
}

impl RepositoryManager {
    pub fn new(stores: StoreRegistry, config: ManagerConfig) -> Self {
        Self {
            events: EventBus::new(config.event_capacity),
            stores,
            config,
            repositories: RwLock::new(HashMap::new()),
        }
    }

    /// A manager over the default stores, configured from the global config.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            StoreRegistry::with_defaults(),
            ManagerConfig {
                backend: config.backend(),
                event_capacity: config.event_capacity(),
            },
        )
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Receive a [`RepositoryChanged`] after every successful refresh.
    pub fn subscribe(&self) -> broadcast::Receiver<RepositoryChanged> {
        self.events.subscribe()
    }

    /// Start tracking `root` in the stale state.
    ///
    /// Runs the locator once and loads `<common_dir>/worktrack/config.toml`.
    /// Registering a root twice returns the existing handle.
    ///
    /// # Errors
    ///
    /// - [`RepoError::NotARepository`] if `root` has no git marker
    /// - [`RepoError::RepositoryReadError`] if the marker is malformed
    /// - [`RepoError::UnknownBackend`] if the selected store is not registered
    /// - [`RepoError::Config`] if the repository config is invalid
    pub fn register(&self, root: impl AsRef<Path>) -> Result<Arc<Repository>, RepoError> {
        let key = normalize(root.as_ref());
        if let Some(existing) = self.get_repository_for_root(&key) {
            return Ok(existing);
        }

        let locator = self.store(self.config.backend)?;
        let paths = locator
            .locate(&key)
            .map_err(|e| RepoError::from_store(e, &key))?;

        let repo_config = Config::load_repo(&paths.tracker_config_path())?.unwrap_or_default();
        let store = match repo_config.backend.as_deref().and_then(StoreKind::parse) {
            Some(kind) if kind != locator.kind() => self.store(kind)?,
            _ => locator,
        };
        let options = CatalogOptions {
            remotes: repo_config.remotes,
        };

        let context = paths.context();
        let repository = Arc::new(Repository::new(
            paths,
            store,
            options,
            self.events.clone(),
        ));

        let mut map = self.write_map();
        let entry = map.entry(key.clone()).or_insert_with(|| {
            tracing::info!(
                root = %key.display(),
                %context,
                backend = %repository.store_kind(),
                "registered repository"
            );
            Arc::clone(&repository)
        });
        Ok(Arc::clone(entry))
    }

    /// Refresh a registered root.
    ///
    /// # Errors
    ///
    /// [`RepoError::NotRegistered`] for an unknown root, otherwise whatever
    /// [`Repository::update`] reports.
    pub async fn refresh(&self, root: impl AsRef<Path>) -> Result<Arc<RepositoryState>, RepoError> {
        let repository = self.require(root.as_ref())?;
        repository.update().await
    }

    /// Refresh every registered root concurrently.
    ///
    /// Returns one result per root; one failure does not stop the others.
    pub async fn refresh_all(&self) -> Vec<(PathBuf, Result<Arc<RepositoryState>, RepoError>)> {
        let mut tasks = JoinSet::new();
        for repository in self.repositories() {
            tasks.spawn(async move {
                let root = repository.root().to_path_buf();
                (root, repository.update().await)
            });
        }

        let mut results = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => tracing::error!(error = %e, "refresh task panicked"),
            }
        }
        results
    }

    /// Last computed snapshot of a registered root.
    pub fn lookup(&self, root: impl AsRef<Path>) -> Result<Arc<RepositoryState>, RepoError> {
        Ok(self.require(root.as_ref())?.snapshot())
    }

    /// Handle of a registered root, if any.
    pub fn get_repository_for_root(&self, root: impl AsRef<Path>) -> Option<Arc<Repository>> {
        self.read_map().get(&normalize(root.as_ref())).cloned()
    }

    /// The registered root that most closely contains `path`.
    pub fn repository_for_path(&self, path: impl AsRef<Path>) -> Option<Arc<Repository>> {
        let path = normalize(path.as_ref());
        self.read_map()
            .iter()
            .filter(|(root, _)| path.starts_with(root))
            .max_by_key(|(root, _)| root.components().count())
            .map(|(_, repository)| Arc::clone(repository))
    }

    /// Every registered repository, in no particular order.
    pub fn repositories(&self) -> Vec<Arc<Repository>> {
        self.read_map().values().cloned().collect()
    }

    /// Registered repositories sharing `root`'s ref store, `root` included.
    pub fn sharing_store(&self, root: impl AsRef<Path>) -> Result<Vec<Arc<Repository>>, RepoError> {
        let common_dir = self.require(root.as_ref())?.paths().common_dir.clone();
        Ok(self
            .read_map()
            .values()
            .filter(|r| r.paths().common_dir == common_dir)
            .cloned()
            .collect())
    }

    /// Stop tracking `root`. Returns `false` if it was not registered.
    pub fn unregister(&self, root: impl AsRef<Path>) -> bool {
        let key = normalize(root.as_ref());
        let removed = self.write_map().remove(&key).is_some();
        if removed {
            tracing::info!(root = %key.display(), "unregistered repository");
        }
        removed
    }

    fn require(&self, root: &Path) -> Result<Arc<Repository>, RepoError> {
        self.get_repository_for_root(root)
            .ok_or_else(|| RepoError::NotRegistered {
                root: root.to_path_buf(),
            })
    }

    fn store(&self, kind: StoreKind) -> Result<Arc<dyn MetadataStore>, RepoError> {
        self.stores
            .get(kind)
            .ok_or_else(|| RepoError::UnknownBackend {
                name: kind.name().to_string(),
            })
    }

    fn read_map(&self) -> std::sync::RwLockReadGuard<'_, HashMap<PathBuf, Arc<Repository>>> {
        self.repositories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write_map(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<PathBuf, Arc<Repository>>> {
        self.repositories
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::GitState;
    use crate::store::{FailOn, MemoryStore, StoreError};
    use std::collections::BTreeSet;

    fn manager(store: &MemoryStore) -> RepositoryManager {
        let mut stores = StoreRegistry::new();
        stores.register(Arc::new(store.clone()));
        RepositoryManager::new(
            stores,
            ManagerConfig {
                backend: StoreKind::Memory,
                event_capacity: 16,
            },
        )
    }

    fn local_set(state: &RepositoryState) -> BTreeSet<(String, String)> {
        state
            .branches()
            .local_branches()
            .map(|b| {
                let name = b.name_for_local_operations().to_string();
                let hash = state.branches().local_hash(&name).unwrap().to_string();
                (name, hash)
            })
            .collect()
    }

    mod registration {
        use super::*;

        #[test]
        fn register_starts_stale() {
            let store = MemoryStore::new();
            store.add_repository("/repo");
            let manager = manager(&store);

            manager.register("/repo").unwrap();
            let state = manager.lookup("/repo").unwrap();
            assert!(!state.is_fresh());
            assert!(state.branches().is_empty());
        }

        #[test]
        fn register_twice_returns_same_handle() {
            let store = MemoryStore::new();
            store.add_repository("/repo");
            let manager = manager(&store);

            let a = manager.register("/repo").unwrap();
            let b = manager.register("/repo").unwrap();
            assert!(Arc::ptr_eq(&a, &b));
            let locates = store
                .operations()
                .iter()
                .filter(|op| matches!(op, crate::store::MemoryOperation::Locate { .. }))
                .count();
            assert_eq!(locates, 1);
        }

        #[test]
        fn register_non_repository() {
            let store = MemoryStore::new();
            let manager = manager(&store);
            assert!(matches!(
                manager.register("/nowhere"),
                Err(RepoError::NotARepository { .. })
            ));
            assert!(manager.repositories().is_empty());
        }

        #[test]
        fn corrupt_marker_is_read_error() {
            let store = MemoryStore::new().fail_on(FailOn::Locate(StoreError::Unreadable {
                message: "gitdir points nowhere".to_string(),
            }));
            store.add_repository("/repo");
            let manager = manager(&store);
            assert!(matches!(
                manager.register("/repo"),
                Err(RepoError::RepositoryReadError { .. })
            ));
        }

        #[test]
        fn unknown_backend() {
            let store = MemoryStore::new();
            store.add_repository("/repo");
            let manager = RepositoryManager::new(StoreRegistry::new(), ManagerConfig::default());
            assert!(matches!(
                manager.register("/repo"),
                Err(RepoError::UnknownBackend { .. })
            ));
        }

        #[test]
        fn unregister() {
            let store = MemoryStore::new();
            store.add_repository("/repo");
            let manager = manager(&store);
            manager.register("/repo").unwrap();

            assert!(manager.unregister("/repo"));
            assert!(!manager.unregister("/repo"));
            assert!(!manager.unregister("/never"));
            assert!(matches!(
                manager.lookup("/repo"),
                Err(RepoError::NotRegistered { .. })
            ));
        }

        #[test]
        fn lookup_unknown_root() {
            let manager = manager(&MemoryStore::new());
            assert!(matches!(
                manager.lookup("/repo"),
                Err(RepoError::NotRegistered { .. })
            ));
            assert!(manager.get_repository_for_root("/repo").is_none());
        }
    }

    mod refresh {
        use super::*;

        #[tokio::test]
        async fn refresh_unknown_root() {
            let manager = manager(&MemoryStore::new());
            assert!(matches!(
                manager.refresh("/repo").await,
                Err(RepoError::NotRegistered { .. })
            ));
        }

        #[tokio::test]
        async fn no_lost_or_phantom_branches() {
            let store = MemoryStore::new();
            store.add_repository("/repo");
            let a = store.commit("/repo");
            store.checkout_new_branch("/repo", "feature");
            let b = store.commit("/repo");
            store.set_branch("/repo", "release", &a);
            let manager = manager(&store);
            manager.register("/repo").unwrap();

            let state = manager.refresh("/repo").await.unwrap();
            let expected: BTreeSet<_> = [
                ("feature".to_string(), b.to_string()),
                ("master".to_string(), a.to_string()),
                ("release".to_string(), a.to_string()),
            ]
            .into_iter()
            .collect();
            assert_eq!(local_set(&state), expected);

            store.delete_branch("/repo", "release");
            let state = manager.refresh("/repo").await.unwrap();
            assert!(state.branches().find_local_branch("release").is_none());
            assert_eq!(state.branches().local_branches().count(), 2);
        }

        #[tokio::test]
        async fn branch_then_commit_no_cross_contamination() {
            let store = MemoryStore::new();
            store.add_repository("/repo");
            let a = store.commit("/repo");
            store.checkout_new_branch("/repo", "feature");
            let b = store.commit("/repo");
            let manager = manager(&store);
            manager.register("/repo").unwrap();

            let state = manager.refresh("/repo").await.unwrap();
            assert_eq!(state.branches().local_hash("feature"), Some(&b));
            assert_eq!(state.branches().local_hash("master"), Some(&a));
            assert_ne!(a, b);
        }

        #[tokio::test]
        async fn worktree_shares_branches_not_head() {
            let store = MemoryStore::new();
            store.add_repository("/repo");
            let a = store.commit("/repo");
            store.add_worktree("/repo", "/work/project", "project");
            let b = store.commit("/work/project");
            let manager = manager(&store);
            manager.register("/repo").unwrap();
            manager.register("/work/project").unwrap();

            let primary = manager.refresh("/repo").await.unwrap();
            let linked = manager.refresh("/work/project").await.unwrap();
            assert_eq!(primary.branches(), linked.branches());
            assert_eq!(primary.current_branch_name(), Some("master"));
            assert_eq!(primary.current_revision(), Some(&a));
            assert_eq!(linked.current_branch_name(), Some("project"));
            assert_eq!(linked.current_revision(), Some(&b));
        }

        #[tokio::test]
        async fn remote_branches_match_pushed_locals() {
            let store = MemoryStore::new();
            store.add_repository("/repo");
            let a = store.commit("/repo");
            store.checkout_new_branch("/repo", "feature");
            let b = store.commit("/repo");
            store.add_remote("/repo", "origin", "/srv/parent.git");
            store.push("/repo", "origin", "master");
            store.push("/repo", "origin", "feature");
            let manager = manager(&store);
            manager.register("/repo").unwrap();

            let state = manager.refresh("/repo").await.unwrap();
            let branches = state.branches();
            assert_eq!(branches.remote_hash("origin/master"), Some(&a));
            assert_eq!(branches.remote_hash("origin/feature"), Some(&b));
            let master = branches.find_local_branch("master").unwrap();
            assert_eq!(
                branches.tracked_branch(master).map(|r| r.to_string()),
                Some("origin/master".to_string())
            );
        }

        #[tokio::test]
        async fn checkout_and_commit_moves_only_that_head() {
            let store = MemoryStore::new();
            store.add_repository("/repo");
            let a = store.commit("/repo");
            store.add_worktree("/repo", "/work/project", "project");
            let manager = manager(&store);
            manager.register("/repo").unwrap();
            manager.register("/work/project").unwrap();
            manager.refresh_all().await;

            store.checkout_new_branch("/work/project", "topic");
            let c = store.commit("/work/project");
            let linked = manager.refresh("/work/project").await.unwrap();
            let primary = manager.refresh("/repo").await.unwrap();

            assert_eq!(linked.current_branch_name(), Some("topic"));
            assert_eq!(linked.current_revision(), Some(&c));
            assert_eq!(primary.current_branch_name(), Some("master"));
            assert_eq!(primary.current_revision(), Some(&a));
        }

        #[tokio::test]
        async fn unknown_branch_is_none() {
            let store = MemoryStore::new();
            store.add_repository("/repo");
            store.commit("/repo");
            let manager = manager(&store);
            manager.register("/repo").unwrap();

            let state = manager.refresh("/repo").await.unwrap();
            assert!(state.branches().find_branch_by_name("nonexistent").is_none());
            assert!(state.branches().local_hash("nonexistent").is_none());
        }

        #[tokio::test]
        async fn lookup_does_not_refresh() {
            let store = MemoryStore::new();
            store.add_repository("/repo");
            let a = store.commit("/repo");
            let manager = manager(&store);
            manager.register("/repo").unwrap();
            manager.refresh("/repo").await.unwrap();

            let _b = store.commit("/repo");
            let state = manager.lookup("/repo").unwrap();
            assert_eq!(state.current_revision(), Some(&a));
        }

        #[tokio::test]
        async fn failed_refresh_keeps_fresh_state() {
            let store = MemoryStore::new();
            store.add_repository("/repo");
            let a = store.commit("/repo");
            let manager = manager(&store);
            manager.register("/repo").unwrap();
            manager.refresh("/repo").await.unwrap();

            store.commit("/repo");
            store.set_fail_on(FailOn::ReadRefs(StoreError::Unreadable {
                message: "packed-refs truncated".to_string(),
            }));
            assert!(matches!(
                manager.refresh("/repo").await,
                Err(RepoError::RepositoryReadError { .. })
            ));

            let state = manager.lookup("/repo").unwrap();
            assert!(state.is_fresh());
            assert_eq!(state.current_revision(), Some(&a));
        }

        #[tokio::test]
        async fn missing_head_is_reported() {
            let store = MemoryStore::new();
            store.add_repository("/repo");
            store.commit("/repo");
            store.remove_head("/repo");
            let manager = manager(&store);
            manager.register("/repo").unwrap();

            assert!(matches!(
                manager.refresh("/repo").await,
                Err(RepoError::DetachedOrMissingHead { .. })
            ));
        }

        #[tokio::test]
        async fn operation_state_is_reported() {
            let store = MemoryStore::new();
            store.add_repository("/repo");
            store.commit("/repo");
            store.set_state("/repo", GitState::Merge);
            let manager = manager(&store);
            manager.register("/repo").unwrap();

            let state = manager.refresh("/repo").await.unwrap();
            assert_eq!(state.git_state(), &GitState::Merge);
        }

        #[tokio::test]
        async fn refresh_all_reports_each_root() {
            let store = MemoryStore::new();
            store.add_repository("/a");
            store.commit("/a");
            store.add_repository("/b");
            store.remove_head("/b");
            let manager = manager(&store);
            manager.register("/a").unwrap();
            manager.register("/b").unwrap();

            let mut results = manager.refresh_all().await;
            results.sort_by(|x, y| x.0.cmp(&y.0));
            assert_eq!(results.len(), 2);
            assert!(results[0].1.is_ok());
            assert!(results[1].1.is_err());
        }

        #[tokio::test]
        async fn events_after_successful_refresh_only() {
            let store = MemoryStore::new();
            store.add_repository("/repo");
            store.commit("/repo");
            let manager = manager(&store);
            let mut rx = manager.subscribe();
            manager.register("/repo").unwrap();

            manager.refresh("/repo").await.unwrap();
            let event = rx.recv().await.unwrap();
            assert_eq!(event.root, PathBuf::from("/repo"));
            assert!(event.changed);
            assert!(event.state.is_fresh());

            store.set_fail_on(FailOn::ReadState(StoreError::Unreadable {
                message: "boom".to_string(),
            }));
            assert!(manager.refresh("/repo").await.is_err());
            assert!(matches!(
                rx.try_recv(),
                Err(broadcast::error::TryRecvError::Empty)
            ));
        }

        #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
        async fn roots_refresh_independently() {
            let store = MemoryStore::new().with_read_delay(std::time::Duration::from_millis(10));
            for root in ["/a", "/b", "/c"] {
                store.add_repository(root);
                store.commit(root);
            }
            let manager = Arc::new(manager(&store));
            for root in ["/a", "/b", "/c"] {
                manager.register(root).unwrap();
            }

            let mut tasks = Vec::new();
            for root in ["/a", "/b", "/c", "/a", "/b", "/c"] {
                let manager = Arc::clone(&manager);
                tasks.push(tokio::spawn(async move { manager.refresh(root).await }));
            }
            for task in tasks {
                task.await.unwrap().unwrap();
            }

            for root in ["/a", "/b", "/c"] {
                assert_eq!(store.max_concurrent_reads(root), 1);
                assert!(manager.lookup(root).unwrap().is_fresh());
            }
        }
    }

    mod queries {
        use super::*;

        #[test]
        fn repository_for_path_picks_deepest_root() {
            let store = MemoryStore::new();
            store.add_repository("/fixture/src");
            store.add_repository("/fixture/src/vendor/lib");
            let manager = manager(&store);
            manager.register("/fixture/src").unwrap();
            manager.register("/fixture/src/vendor/lib").unwrap();

            let found = manager.repository_for_path("/fixture/src/vendor/lib/mod.rs").unwrap();
            assert_eq!(found.root(), Path::new("/fixture/src/vendor/lib"));
            let found = manager.repository_for_path("/fixture/src/main.rs").unwrap();
            assert_eq!(found.root(), Path::new("/fixture/src"));
            assert!(manager.repository_for_path("/elsewhere").is_none());
        }

        #[cfg(unix)]
        #[test]
        fn new_file_under_symlinked_root_finds_root() {
            let temp = tempfile::TempDir::new().unwrap();
            let real = temp.path().canonicalize().unwrap().join("real");
            std::fs::create_dir_all(real.join("repo")).unwrap();
            let link = temp.path().join("link");
            std::os::unix::fs::symlink(&real, &link).unwrap();

            let store = MemoryStore::new();
            store.add_repository(real.join("repo"));
            let manager = manager(&store);
            manager.register(link.join("repo")).unwrap();

            let not_yet_created = link.join("repo/src/new.rs");
            assert!(!not_yet_created.exists());
            let found = manager.repository_for_path(&not_yet_created).unwrap();
            assert_eq!(found.root(), real.join("repo"));
            assert!(manager.get_repository_for_root(link.join("repo")).is_some());
        }

        #[test]
        fn sharing_store_groups_worktrees() {
            let store = MemoryStore::new();
            store.add_repository("/repo");
            store.commit("/repo");
            store.add_worktree("/repo", "/work/project", "project");
            store.add_repository("/other");
            let manager = manager(&store);
            for root in ["/repo", "/work/project", "/other"] {
                manager.register(root).unwrap();
            }

            let mut roots: Vec<_> = manager
                .sharing_store("/work/project")
                .unwrap()
                .iter()
                .map(|r| r.root().to_path_buf())
                .collect();
            roots.sort();
            assert_eq!(
                roots,
                vec![PathBuf::from("/repo"), PathBuf::from("/work/project")]
            );
        }

        #[test]
        fn defaults() {
            let config = ManagerConfig::default();
            assert_eq!(config.backend, StoreKind::LibGit);
            assert_eq!(config.event_capacity, DEFAULT_EVENT_CAPACITY);
        }
    }
}
