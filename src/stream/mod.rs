//! Update stream: periodic re-fetching of latest versions
//!
//! A single background task polls the registry for every known dependency,
//! diffs the answers against the last observed versions and pushes events
//! to subscribers. The controller never triggers a source rescan.

mod broadcaster;
mod event;
mod state;

pub use broadcaster::{EventBroadcaster, DEFAULT_SUBSCRIBER_CAPACITY};
pub use event::{EventPayload, StreamEvent};
pub use state::VersionStore;

use crate::classify::classify;
use crate::domain::{DependencySpec, VersionStatus};
use crate::registry::{fetch_each, RegistryAdapter};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Shortest allowed poll interval
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Poll interval when none is configured
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Per-package fetch timeout
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Default number of concurrent fetches
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Lifecycle of the poll loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Polling,
    Stopped,
}

/// What happened during one poll tick
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickOutcome {
    /// Packages whose latest version changed (or was seen for the first time)
    pub updated: Vec<String>,
    /// Packages whose latest version is a major bump over the pinned one
    pub breaking: Vec<String>,
    /// One message per failed fetch
    pub failures: Vec<String>,
}

/// Drives the poll loop for a fixed dependency set
pub struct StreamController {
    registry: Arc<dyn RegistryAdapter>,
    dependencies: Vec<DependencySpec>,
    store: VersionStore,
    broadcaster: Arc<EventBroadcaster>,
    interval: Duration,
    fetch_timeout: Duration,
    concurrency: usize,
    state: Mutex<ControllerState>,
}

impl StreamController {
    pub fn new(registry: Arc<dyn RegistryAdapter>, dependencies: Vec<DependencySpec>) -> Self {
        Self {
            registry,
            dependencies,
            store: VersionStore::new(),
            broadcaster: Arc::new(EventBroadcaster::new()),
            interval: DEFAULT_POLL_INTERVAL,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            concurrency: DEFAULT_CONCURRENCY,
            state: Mutex::new(ControllerState::Idle),
        }
    }

    /// Sets the poll interval, raising it to [`MIN_POLL_INTERVAL`] if shorter
    pub fn with_interval(mut self, interval: Duration) -> Self {
        if interval < MIN_POLL_INTERVAL {
            warn!(
                "Poll interval {:?} is below the minimum, using {:?}",
                interval, MIN_POLL_INTERVAL
            );
            self.interval = MIN_POLL_INTERVAL;
        } else {
            self.interval = interval;
        }
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Uses an existing store, e.g. one seeded from a single-shot run
    pub fn with_store(mut self, store: VersionStore) -> Self {
        self.store = store;
        self
    }

    pub fn with_broadcaster(mut self, broadcaster: Arc<EventBroadcaster>) -> Self {
        self.broadcaster = broadcaster;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn store(&self) -> &VersionStore {
        &self.store
    }

    pub fn broadcaster(&self) -> &Arc<EventBroadcaster> {
        &self.broadcaster
    }

    /// Registers a subscriber; see [`EventBroadcaster::subscribe`]
    pub fn subscribe(&self) -> tokio::sync::mpsc::Receiver<StreamEvent> {
        self.broadcaster.subscribe()
    }

    pub fn state(&self) -> ControllerState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, next: ControllerState) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if *state != ControllerState::Stopped {
            *state = next;
        }
    }

    fn emit(&self, event: StreamEvent) {
        self.broadcaster.broadcast(&event);
    }

    /// Runs one poll cycle and publishes the new versions
    ///
    /// Each dependency's events go out as soon as its own fetch finishes, so
    /// the order across dependencies follows completion. The store is
    /// published once, after every fetch has finished.
    pub async fn tick(&self) -> TickOutcome {
        self.set_state(ControllerState::Polling);
        self.emit(StreamEvent::poll_start(self.dependencies.len()));

        let previous = self.store.snapshot();
        let packages: Vec<String> = self.dependencies.iter().map(|d| d.name.clone()).collect();
        let mut next = (*previous).clone();
        let mut outcome = TickOutcome::default();

        fetch_each(
            &self.registry,
            &packages,
            self.concurrency,
            self.fetch_timeout,
            |index, result| {
                let dep = &self.dependencies[index];
                match result {
                    Ok(latest) => {
                        let seen = previous.get(&dep.name);
                        self.observe(dep, seen, latest, &mut next, &mut outcome)
                    }
                    Err(e) => {
                        warn!("Keeping last known version of {}: {}", dep.name, e);
                        outcome.failures.push(e.to_string());
                    }
                }
            },
        )
        .await;

        self.store.publish(next);
        self.set_state(ControllerState::Idle);
        outcome
    }

    /// Emits `package_update` then `breaking_change` for one fetched version
    fn observe(
        &self,
        dep: &DependencySpec,
        seen: Option<&String>,
        latest: String,
        next: &mut HashMap<String, String>,
        outcome: &mut TickOutcome,
    ) {
        if seen != Some(&latest) {
            debug!("{} latest version is now {}", dep.name, latest);
            self.emit(StreamEvent::package_update(
                &dep.name,
                seen.map(String::as_str),
                &latest,
            ));
            outcome.updated.push(dep.name.clone());
        }

        if let Some(pinned) = &dep.pinned_version {
            if classify(pinned, &latest) == VersionStatus::Breaking {
                self.emit(StreamEvent::breaking_change(&dep.name, pinned, &latest));
                outcome.breaking.push(dep.name.clone());
            }
        }
        next.insert(dep.name.clone(), latest);
    }

    /// Polls until `cancel` fires. Cancellation is checked before each tick
    /// and during the sleep between ticks, never in the middle of one.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            "Watching {} dependencies every {:?}",
            self.dependencies.len(),
            self.interval
        );
        loop {
            if cancel.is_cancelled() {
                break;
            }
            let outcome = self.tick().await;
            debug!(
                "Tick finished: {} updated, {} breaking, {} failed",
                outcome.updated.len(),
                outcome.breaking.len(),
                outcome.failures.len()
            );
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = ControllerState::Stopped;
        info!("Update stream stopped");
    }

    /// Runs the poll loop on a background task
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(cancel).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::InMemoryRegistry;
    use tokio::sync::mpsc::Receiver;

    fn dep(name: &str, pinned: &str) -> DependencySpec {
        DependencySpec::new(name, Some(pinned.to_string()), "requirements.txt").with_operator("==")
    }

    fn controller(registry: &InMemoryRegistry, deps: Vec<DependencySpec>) -> StreamController {
        StreamController::new(Arc::new(registry.clone()), deps)
            .with_fetch_timeout(Duration::from_millis(500))
    }

    fn drain(rx: &mut Receiver<StreamEvent>) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn types(events: &[StreamEvent]) -> Vec<&'static str> {
        events.iter().map(StreamEvent::event_type).collect()
    }

    #[tokio::test]
    async fn test_first_tick_emits_update_per_package() {
        let registry = InMemoryRegistry::new();
        registry.set_version("requests", "2.32.5");
        registry.set_version("flask", "3.1.2");
        let controller = controller(
            &registry,
            vec![dep("requests", "2.28.1"), dep("flask", "2.0.0")],
        );
        let mut rx = controller.subscribe();

        let outcome = controller.tick().await;
        let mut updated = outcome.updated.clone();
        updated.sort();
        assert_eq!(updated, vec!["flask", "requests"]);
        assert_eq!(outcome.breaking, vec!["flask"]);

        let events = drain(&mut rx);
        assert_eq!(types(&events)[..2], ["connected", "poll_start"]);
        let mut rest = types(&events)[2..].to_vec();
        rest.sort();
        assert_eq!(rest, vec!["breaking_change", "package_update", "package_update"]);

        let requests = events
            .iter()
            .find_map(|e| match &e.payload {
                EventPayload::PackageUpdate {
                    package_name,
                    is_first_fetch,
                    ..
                } if package_name == "requests" => Some(*is_first_fetch),
                _ => None,
            })
            .unwrap();
        assert!(requests);

        // a package's update precedes its breaking change
        let flask_update = events
            .iter()
            .position(|e| {
                matches!(&e.payload, EventPayload::PackageUpdate { package_name, .. } if package_name == "flask")
            })
            .unwrap();
        let breaking = events
            .iter()
            .position(|e| e.event_type() == "breaking_change")
            .unwrap();
        assert!(flask_update < breaking);
        assert_eq!(controller.store().get("flask").as_deref(), Some("3.1.2"));
        assert_eq!(controller.state(), ControllerState::Idle);
    }

    #[tokio::test]
    async fn test_fast_package_event_not_held_by_slow_fetch() {
        let registry = InMemoryRegistry::new();
        registry.set_version("slow", "2.0.0");
        registry.set_version("fast", "3.0.0");
        registry.delay("slow", Duration::from_millis(800));
        let controller = Arc::new(
            StreamController::new(
                Arc::new(registry.clone()),
                vec![dep("slow", "1.0.0"), dep("fast", "1.0.0")],
            )
            .with_fetch_timeout(Duration::from_secs(5)),
        );
        let mut rx = controller.subscribe();
        let ticking = Arc::clone(&controller);
        let tick = tokio::spawn(async move { ticking.tick().await });

        let mut first = Vec::new();
        while first.len() < 4 {
            let event = tokio::time::timeout(Duration::from_millis(400), rx.recv())
                .await
                .expect("fast events should arrive before the slow fetch ends")
                .unwrap();
            first.push(event);
        }
        assert_eq!(
            types(&first),
            vec!["connected", "poll_start", "package_update", "breaking_change"]
        );
        match &first[2].payload {
            EventPayload::PackageUpdate { package_name, .. } => assert_eq!(package_name, "fast"),
            other => panic!("unexpected payload {:?}", other),
        }
        assert!(controller.store().get("fast").is_none());

        let outcome = tick.await.unwrap();
        assert_eq!(outcome.updated, vec!["fast", "slow"]);
        assert_eq!(outcome.breaking, vec!["fast", "slow"]);
        assert_eq!(controller.store().get("slow").as_deref(), Some("2.0.0"));
    }

    #[tokio::test]
    async fn test_unchanged_version_emits_no_update() {
        let registry = InMemoryRegistry::new();
        registry.set_version("requests", "2.32.5");
        let controller = controller(&registry, vec![dep("requests", "2.28.1")]);
        controller.tick().await;
        let mut rx = controller.subscribe();

        let outcome = controller.tick().await;
        assert!(outcome.updated.is_empty());
        assert_eq!(types(&drain(&mut rx)), vec!["connected", "poll_start"]);
    }

    #[tokio::test]
    async fn test_changed_version_reports_previous() {
        let registry = InMemoryRegistry::new();
        registry.set_version("requests", "2.32.4");
        let controller = controller(&registry, vec![dep("requests", "2.28.1")]);
        controller.tick().await;
        registry.set_version("requests", "2.32.5");
        let mut rx = controller.subscribe();

        controller.tick().await;
        let events = drain(&mut rx);
        match &events[2].payload {
            EventPayload::PackageUpdate {
                previous_version,
                latest_version,
                is_first_fetch,
                ..
            } => {
                assert_eq!(previous_version.as_deref(), Some("2.32.4"));
                assert_eq!(latest_version, "2.32.5");
                assert!(!is_first_fetch);
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_previous_version() {
        let registry = InMemoryRegistry::new();
        registry.set_version("flask", "3.0.0");
        registry.set_version("requests", "2.32.5");
        let controller = controller(
            &registry,
            vec![dep("flask", "3.0.0"), dep("requests", "2.32.5")],
        );
        controller.tick().await;

        registry.fail("flask", "connection reset");
        registry.set_version("requests", "2.33.0");
        let mut rx = controller.subscribe();
        let outcome = controller.tick().await;

        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.updated, vec!["requests"]);
        assert_eq!(controller.store().get("flask").as_deref(), Some("3.0.0"));
        let updates: Vec<_> = drain(&mut rx)
            .into_iter()
            .filter_map(|e| match e.payload {
                EventPayload::PackageUpdate { package_name, .. } => Some(package_name),
                _ => None,
            })
            .collect();
        assert_eq!(updates, vec!["requests"]);
    }

    #[tokio::test]
    async fn test_breaking_change_reported_every_tick() {
        let registry = InMemoryRegistry::new();
        registry.set_version("flask", "3.1.2");
        let controller = controller(&registry, vec![dep("flask", "2.0.0")]);
        assert_eq!(controller.tick().await.breaking, vec!["flask"]);
        assert_eq!(controller.tick().await.breaking, vec!["flask"]);
    }

    #[tokio::test]
    async fn test_slow_fetch_times_out_without_blocking_others() {
        let registry = InMemoryRegistry::new();
        registry.set_version("slow", "1.0.0");
        registry.set_version("fast", "1.0.0");
        registry.delay("slow", Duration::from_secs(5));
        let controller = StreamController::new(
            Arc::new(registry.clone()),
            vec![dep("slow", "1.0.0"), dep("fast", "1.0.0")],
        )
        .with_fetch_timeout(Duration::from_millis(100));

        let outcome = controller.tick().await;
        assert_eq!(outcome.updated, vec!["fast"]);
        assert_eq!(outcome.failures.len(), 1);
        assert!(outcome.failures[0].contains("timeout"));
    }

    #[tokio::test]
    async fn test_unpinned_dependency_never_breaking() {
        let registry = InMemoryRegistry::new();
        registry.set_version("flask", "3.1.2");
        let deps = vec![DependencySpec::new("flask", None, "requirements.txt")];
        let outcome = controller(&registry, deps).tick().await;
        assert!(outcome.breaking.is_empty());
        assert_eq!(outcome.updated, vec!["flask"]);
    }

    #[test]
    fn test_interval_clamped_to_minimum() {
        let registry = InMemoryRegistry::new();
        let controller = StreamController::new(Arc::new(registry), Vec::new())
            .with_interval(Duration::from_secs(1));
        assert_eq!(controller.interval(), MIN_POLL_INTERVAL);
    }

    #[test]
    fn test_default_interval() {
        let controller = StreamController::new(Arc::new(InMemoryRegistry::new()), Vec::new());
        assert_eq!(controller.interval(), DEFAULT_POLL_INTERVAL);
    }

    #[tokio::test]
    async fn test_run_until_cancelled() {
        let registry = InMemoryRegistry::new();
        registry.set_version("flask", "3.1.2");
        let controller = Arc::new(controller(&registry, vec![dep("flask", "3.1.2")]));
        let mut rx = controller.subscribe();
        let cancel = CancellationToken::new();
        let handle = Arc::clone(&controller).spawn(cancel.clone());

        assert_eq!(rx.recv().await.unwrap().event_type(), "connected");
        assert_eq!(rx.recv().await.unwrap().event_type(), "poll_start");
        assert_eq!(rx.recv().await.unwrap().event_type(), "package_update");

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(controller.state(), ControllerState::Stopped);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_runs_no_tick() {
        let registry = InMemoryRegistry::new();
        let controller = controller(&registry, vec![dep("flask", "1.0.0")]);
        let mut rx = controller.subscribe();
        let cancel = CancellationToken::new();
        cancel.cancel();
        controller.run(cancel).await;
        assert_eq!(types(&drain(&mut rx)), vec!["connected"]);
        assert_eq!(controller.state(), ControllerState::Stopped);
    }
}
