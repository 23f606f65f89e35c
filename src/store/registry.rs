//! store::registry
//!
//! Store selection by key.
//!
//! Commands and the repository manager ask the registry for a store by
//! [`StoreKind`] instead of naming a concrete implementation. Stores are
//! registered once at startup; lookup is a plain map access.

use std::collections::HashMap;
use std::sync::Arc;

use super::files::FileStore;
use super::libgit::LibGitStore;
use super::traits::MetadataStore;

/// Supported metadata store backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StoreKind {
    /// libgit2 reads
    LibGit,
    /// Plain-file reads of the on-disk layout
    Files,
    /// In-memory fake (tests only)
    Memory,
}

impl StoreKind {
    /// Every known kind.
    ///
    /// # Example
    ///
    /// ```
    /// use worktrack::store::StoreKind;
    ///
    /// assert!(StoreKind::all().contains(&StoreKind::Files));
    /// ```
    pub fn all() -> &'static [StoreKind] {
        &[StoreKind::LibGit, StoreKind::Files, StoreKind::Memory]
    }

    /// The name used in configuration files and on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            StoreKind::LibGit => "libgit",
            StoreKind::Files => "files",
            StoreKind::Memory => "memory",
        }
    }

    /// Parse a kind from its name (case-insensitive).
    ///
    /// # Example
    ///
    /// ```
    /// use worktrack::store::StoreKind;
    ///
    /// assert_eq!(StoreKind::parse("Files"), Some(StoreKind::Files));
    /// assert_eq!(StoreKind::parse("svn"), None);
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "libgit" => Some(StoreKind::LibGit),
            "files" => Some(StoreKind::Files),
            "memory" => Some(StoreKind::Memory),
            _ => None,
        }
    }

    /// Whether the kind may be selected from configuration.
    pub fn is_configurable(&self) -> bool {
        !matches!(self, StoreKind::Memory)
    }

    /// Names accepted by the `backend` config key and `--backend` flag.
    pub fn configurable_names() -> Vec<&'static str> {
        Self::all()
            .iter()
            .filter(|k| k.is_configurable())
            .map(|k| k.name())
            .collect()
    }
}

impl std::fmt::Display for StoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Registry mapping a [`StoreKind`] to its store.
#[derive(Debug, Clone, Default)]
pub struct StoreRegistry {
    stores: HashMap<StoreKind, Arc<dyn MetadataStore>>,
}

impl StoreRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the libgit and files stores.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(LibGitStore::new()));
        registry.register(Arc::new(FileStore::new()));
        registry
    }

    /// Register a store under its own kind, replacing any previous entry.
    pub fn register(&mut self, store: Arc<dyn MetadataStore>) {
        self.stores.insert(store.kind(), store);
    }

    /// Look up a store by kind.
    pub fn get(&self, kind: StoreKind) -> Option<Arc<dyn MetadataStore>> {
        self.stores.get(&kind).cloned()
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<StoreKind> {
        let mut kinds: Vec<_> = self.stores.keys().copied().collect();
        kinds.sort();
        kinds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn names_roundtrip() {
        for kind in StoreKind::all() {
            assert_eq!(StoreKind::parse(kind.name()), Some(*kind));
        }
    }

    #[test]
    fn memory_is_not_configurable() {
        assert_eq!(StoreKind::configurable_names(), vec!["libgit", "files"]);
    }

    #[test]
    fn defaults_have_real_backends() {
        let registry = StoreRegistry::with_defaults();
        assert_eq!(registry.kinds(), vec![StoreKind::LibGit, StoreKind::Files]);
        assert!(registry.get(StoreKind::Memory).is_none());
    }

    #[test]
    fn register_by_kind() {
        let mut registry = StoreRegistry::new();
        registry.register(Arc::new(MemoryStore::new()));
        let store = registry.get(StoreKind::Memory).unwrap();
        assert_eq!(store.kind(), StoreKind::Memory);
    }
}
