//! repo
//!
//! Repository topology and branch-state tracking.
//!
//! # Modules
//!
//! - [`branches`] - Branch identities and the immutable branch collection
//! - `catalog` - Builds a collection from a store's ref listing
//! - `head` - Resolves the worktree-specific HEAD
//! - `state` - Immutable snapshots
//! - `repository` - Per-root handle with serialised refresh
//! - `events` - Change notifications
//! - `manager` - Process-wide registry of roots
//!
//! # Invariants
//!
//! - A refresh publishes a whole snapshot or nothing
//! - At most one refresh per root runs at a time; roots never wait on each other
//! - Absent branches are `None`, never a default

pub mod branches;
mod catalog;
mod error;
mod events;
mod head;
mod manager;
mod repository;
mod state;

pub use branches::{Branch, BranchCollection, LocalBranch, RemoteBranch};
pub use catalog::{build_catalog, catalog_from_listing, CatalogOptions};
pub use error::RepoError;
pub use events::{EventBus, RepositoryChanged};
pub use head::{resolve_head, HeadInfo};
pub use manager::{ManagerConfig, RepositoryManager};
pub use repository::Repository;
pub use state::{Freshness, RepositoryState};
