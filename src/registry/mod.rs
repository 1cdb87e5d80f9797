//! Registry adapters for fetching the latest release of a package
//!
//! This module provides:
//! - HTTP client shared foundation with retry logic
//! - PyPI JSON API adapter
//! - In-memory adapter for offline use and tests

mod client;
mod memory;
mod pypi;

pub use client::HttpClient;
pub use memory::InMemoryRegistry;
pub use pypi::{PyPIAdapter, PYPI_API_URL};

use crate::error::RegistryError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::warn;

/// Trait for registry adapters
#[async_trait]
pub trait RegistryAdapter: Send + Sync {
    /// Get the registry name
    fn registry_name(&self) -> &'static str;

    /// Fetch the latest published version of a package
    async fn fetch_latest(&self, package: &str) -> Result<String, RegistryError>;
}

/// Fetches the latest version of every package concurrently, handing each
/// result to `on_result` with its input index as soon as it arrives
///
/// At most `concurrency` requests are in flight, and each one is bounded by
/// `timeout` so a slow package cannot hold up the rest. Every index is
/// reported exactly once; a fetch task that dies is reported as an error
/// after the others.
pub async fn fetch_each<F>(
    registry: &Arc<dyn RegistryAdapter>,
    packages: &[String],
    concurrency: usize,
    timeout: Duration,
    mut on_result: F,
) where
    F: FnMut(usize, Result<String, RegistryError>),
{
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = JoinSet::new();

    for (index, package) in packages.iter().enumerate() {
        let registry = Arc::clone(registry);
        let semaphore = Arc::clone(&semaphore);
        let package = package.clone();
        tasks.spawn(async move {
            let result = match semaphore.acquire_owned().await {
                Ok(_permit) => {
                    match tokio::time::timeout(timeout, registry.fetch_latest(&package)).await {
                        Ok(result) => result,
                        Err(_) => Err(RegistryError::timeout(&package, registry.registry_name())),
                    }
                }
                Err(_) => Err(RegistryError::network_error(
                    &package,
                    registry.registry_name(),
                    "fetch cancelled",
                )),
            };
            (index, result)
        });
    }

    let mut reported = vec![false; packages.len()];
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, result)) => {
                reported[index] = true;
                on_result(index, result);
            }
            Err(e) => warn!("Fetch task failed: {}", e),
        }
    }

    for (index, package) in packages.iter().enumerate() {
        if !reported[index] {
            on_result(
                index,
                Err(RegistryError::network_error(
                    package,
                    registry.registry_name(),
                    "fetch task aborted",
                )),
            );
        }
    }
}

/// Like [`fetch_each`], collecting results in input order
///
/// `on_done` is called with the input index as each fetch finishes.
pub async fn fetch_all<F>(
    registry: &Arc<dyn RegistryAdapter>,
    packages: &[String],
    concurrency: usize,
    timeout: Duration,
    mut on_done: F,
) -> Vec<Result<String, RegistryError>>
where
    F: FnMut(usize),
{
    let mut results: Vec<Option<Result<String, RegistryError>>> =
        (0..packages.len()).map(|_| None).collect();
    fetch_each(registry, packages, concurrency, timeout, |index, result| {
        on_done(index);
        results[index] = Some(result);
    })
    .await;

    results
        .into_iter()
        .zip(packages)
        .map(|(result, package)| {
            result.unwrap_or_else(|| {
                Err(RegistryError::network_error(
                    package,
                    registry.registry_name(),
                    "fetch task aborted",
                ))
            })
        })
        .collect()
}
