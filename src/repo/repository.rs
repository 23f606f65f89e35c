//! repo::repository
//!
//! Per-root handle owning the current snapshot.

use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::Mutex;

use super::catalog::{catalog_from_listing, CatalogOptions};
use super::error::RepoError;
use super::events::{EventBus, RepositoryChanged};
use super::head::resolve_head;
use super::state::RepositoryState;
use crate::core::paths::RepoPaths;
use crate::store::{MetadataStore, StoreKind};

/// A tracked root.
///
/// # Concurrency
///
/// - `update` calls on one repository are serialised by an async mutex, so
///   at most one refresh per root reads the store at a time
/// - the snapshot pointer sits behind a `RwLock` held only for the clone or
///   swap, never across an `.await`
/// - repositories share no locks, so different roots refresh in parallel
#[derive(Debug)]
pub struct Repository {
    paths: RepoPaths,
    store: Arc<dyn MetadataStore>,
    options: CatalogOptions,
    state: RwLock<Arc<RepositoryState>>,
    refresh_lock: Mutex<()>,
    events: EventBus,
}

impl Repository {
    /// Create a repository in the stale state.
    pub fn new(
        paths: RepoPaths,
        store: Arc<dyn MetadataStore>,
        options: CatalogOptions,
        events: EventBus,
    ) -> Self {
        Self {
            state: RwLock::new(Arc::new(RepositoryState::stale(paths.clone()))),
            paths,
            store,
            options,
            refresh_lock: Mutex::new(()),
            events,
        }
    }

    pub fn root(&self) -> &Path {
        self.paths.work_dir()
    }

    pub fn paths(&self) -> &RepoPaths {
        &self.paths
    }

    pub fn store_kind(&self) -> StoreKind {
        self.store.kind()
    }

    pub fn options(&self) -> &CatalogOptions {
        &self.options
    }

    /// The last computed snapshot. Never triggers a refresh.
    pub fn snapshot(&self) -> Arc<RepositoryState> {
        Arc::clone(&self.state.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Re-read refs, HEAD and operation state and swap in a new snapshot.
    ///
    /// Waits for any refresh of this root already in progress. On failure
    /// the previous snapshot stays visible and no event is published.
    pub async fn update(&self) -> Result<Arc<RepositoryState>, RepoError> {
        let _guard = self.refresh_lock.lock().await;

        let store = Arc::clone(&self.store);
        let paths = self.paths.clone();
        let options = self.options.clone();
        let result = tokio::task::spawn_blocking(move || read_snapshot(store.as_ref(), paths, &options))
            .await
            .unwrap_or_else(|e| {
                Err(RepoError::RepositoryReadError {
                    root: self.paths.work_dir.clone(),
                    message: format!("refresh task failed: {}", e),
                })
            });

        let next = match result {
            Ok(state) => Arc::new(state),
            Err(err) => {
                tracing::warn!(root = %self.root().display(), error = %err, "refresh failed");
                return Err(err);
            }
        };

        let previous = {
            let mut current = self.state.write().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *current, Arc::clone(&next))
        };
        let changed = previous.fingerprint() != next.fingerprint();

        tracing::debug!(
            root = %self.root().display(),
            branch = next.current_branch_name().unwrap_or("(detached)"),
            branches = next.branches().len(),
            changed,
            "refreshed"
        );

        self.events.publish(RepositoryChanged {
            root: self.paths.work_dir.clone(),
            state: Arc::clone(&next),
            changed,
        });

        Ok(next)
    }
}

/// All reads of one refresh.
fn read_snapshot(
    store: &dyn MetadataStore,
    paths: RepoPaths,
    options: &CatalogOptions,
) -> Result<RepositoryState, RepoError> {
    let root = paths.work_dir();
    let head = resolve_head(store, &paths)?;
    let listing = store
        .read_refs(&paths)
        .map_err(|e| RepoError::from_store(e, root))?;
    let remotes = listing.remotes.clone();
    let branches = catalog_from_listing(listing, options, root)?;
    let git_state = store
        .read_state(&paths)
        .map_err(|e| RepoError::from_store(e, root))?;

    Ok(RepositoryState::fresh(
        paths, branches, head, git_state, remotes,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FailOn, MemoryStore, StoreError};

    fn tracked(store: &MemoryStore, root: &str) -> Repository {
        let paths = store.locate(Path::new(root)).unwrap();
        Repository::new(
            paths,
            Arc::new(store.clone()),
            CatalogOptions::default(),
            EventBus::new(8),
        )
    }

    #[tokio::test]
    async fn update_makes_fresh() {
        let store = MemoryStore::new();
        store.add_repository("/repo");
        let a = store.commit("/repo");
        let repo = tracked(&store, "/repo");

        assert!(!repo.snapshot().is_fresh());
        let state = repo.update().await.unwrap();
        assert!(state.is_fresh());
        assert_eq!(state.current_revision(), Some(&a));
        assert_eq!(repo.snapshot().current_branch_name(), Some("master"));
    }

    #[tokio::test]
    async fn failed_update_keeps_previous_snapshot() {
        let store = MemoryStore::new();
        store.add_repository("/repo");
        store.commit("/repo");
        let repo = tracked(&store, "/repo");
        let first = repo.update().await.unwrap();

        store.commit("/repo");
        store.set_fail_on(FailOn::ReadHead(StoreError::Unreadable {
            message: "io error".to_string(),
        }));
        let err = repo.update().await.unwrap_err();
        assert!(matches!(err, RepoError::RepositoryReadError { .. }));
        assert_eq!(repo.snapshot().fingerprint(), first.fingerprint());

        store.clear_fail_on();
        let second = repo.update().await.unwrap();
        assert_ne!(second.fingerprint(), first.fingerprint());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_updates_are_serialised() {
        let store = MemoryStore::new().with_read_delay(std::time::Duration::from_millis(20));
        store.add_repository("/repo");
        store.commit("/repo");
        let repo = Arc::new(tracked(&store, "/repo"));

        let mut tasks = Vec::new();
        for _ in 0..4 {
            let repo = Arc::clone(&repo);
            tasks.push(tokio::spawn(async move { repo.update().await }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(store.max_concurrent_reads("/repo"), 1);
    }

    #[tokio::test]
    async fn events_flag_changes() {
        let store = MemoryStore::new();
        store.add_repository("/repo");
        store.commit("/repo");
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        let repo = Repository::new(
            store.locate(Path::new("/repo")).unwrap(),
            Arc::new(store.clone()),
            CatalogOptions::default(),
            bus,
        );

        repo.update().await.unwrap();
        assert!(rx.recv().await.unwrap().changed);

        repo.update().await.unwrap();
        assert!(!rx.recv().await.unwrap().changed);

        store.commit("/repo");
        repo.update().await.unwrap();
        let event = rx.recv().await.unwrap();
        assert!(event.changed);
        assert_eq!(event.root, std::path::PathBuf::from("/repo"));
    }
}
