//! In-memory registry for offline runs and tests

use crate::error::RegistryError;
use crate::registry::RegistryAdapter;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Registry whose answers are set programmatically
///
/// Cloning shares the underlying table, so a test can keep a handle and
/// change versions or inject failures between poll ticks.
#[derive(Clone, Default)]
pub struct InMemoryRegistry {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    versions: HashMap<String, String>,
    failing: HashMap<String, String>,
    delays: HashMap<String, Duration>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Sets the latest version of a package and clears any injected failure
    pub fn set_version(&self, package: &str, version: &str) {
        let mut inner = self.lock();
        inner.failing.remove(package);
        inner
            .versions
            .insert(package.to_string(), version.to_string());
    }

    /// Makes fetches for `package` fail with a network error
    pub fn fail(&self, package: &str, message: &str) {
        self.lock()
            .failing
            .insert(package.to_string(), message.to_string());
    }

    /// Delays every fetch of `package`
    pub fn delay(&self, package: &str, delay: Duration) {
        self.lock().delays.insert(package.to_string(), delay);
    }
}

#[async_trait]
impl RegistryAdapter for InMemoryRegistry {
    fn registry_name(&self) -> &'static str {
        "memory"
    }

    async fn fetch_latest(&self, package: &str) -> Result<String, RegistryError> {
        let delay = self.lock().delays.get(package).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let inner = self.lock();
        if let Some(message) = inner.failing.get(package) {
            return Err(RegistryError::network_error(package, "memory", message.clone()));
        }
        inner
            .versions
            .get(package)
            .cloned()
            .ok_or_else(|| RegistryError::package_not_found(package, "memory"))
    }
}
