//! store
//!
//! Metadata store seam.
//!
//! # Architecture
//!
//! The [`MetadataStore`] trait is the read contract the tracker needs from a
//! repository: locate a root, list refs, read HEAD, read operation state.
//! Implementations are selected through [`StoreRegistry`] by [`StoreKind`]:
//!
//! - [`LibGitStore`]: libgit2 reads
//! - [`FileStore`]: plain-file reads of the on-disk layout
//! - [`MemoryStore`]: in-memory fake for tests

mod files;
mod libgit;
pub mod memory;
mod registry;
mod traits;

pub use files::FileStore;
pub use libgit::LibGitStore;
pub use memory::{FailOn, MemoryOperation, MemoryStore};
pub use registry::{StoreKind, StoreRegistry};
pub use traits::{MetadataStore, StoreError};
