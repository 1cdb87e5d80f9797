//! Last-observed latest versions, shared between the poll loop and readers

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Copy-on-write map of package name to last observed latest version.
///
/// The poll loop is the only writer and replaces the whole map once per
/// tick; readers hold an `Arc` snapshot that never changes underneath them.
#[derive(Debug, Clone, Default)]
pub struct VersionStore {
    current: Arc<RwLock<Arc<HashMap<String, String>>>>,
}

impl VersionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a store with known versions
    pub fn with_versions(versions: HashMap<String, String>) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(versions))),
        }
    }

    /// Current map; cheap to clone and immutable
    pub fn snapshot(&self) -> Arc<HashMap<String, String>> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    pub fn get(&self, package: &str) -> Option<String> {
        self.snapshot().get(package).cloned()
    }

    /// Atomically replaces the map
    pub fn publish(&self, versions: HashMap<String, String>) {
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(versions);
    }
}
