//! Analysis pipeline for coordinating a full run
//!
//! This module provides:
//! - Single-shot workflow: parse → fetch → classify → scan → map → fix → report
//! - Parallel registry queries with a concurrency limit
//! - Optional `pipeline_step` events for stream subscribers
//! - The watch session that follows a single-shot run in `--watch` mode
//!
//! Per-item failures (unreadable manifests, unparseable sources, registry
//! errors) become report warnings; a run always produces a report.

use crate::domain::{
    AnalysisReport, DependencySpec, ImpactEntry, ImpactReport, ImpactedFile, PackageResult,
    UsageSite, VersionRecord,
};
use crate::fixer::{FixRequest, MigrationFixer, DEFAULT_MAX_FIXES_PER_PACKAGE};
use crate::impact::{impact_for, map_impacts};
use crate::manifest::{load_dependencies, ManifestSet};
use crate::output::EventWriter;
use crate::progress::Progress;
use crate::registry::{fetch_all, RegistryAdapter};
use crate::scanner::{CodeScanner, PackageFilter};
use crate::stream::{
    EventBroadcaster, EventPayload, StreamController, StreamEvent, DEFAULT_CONCURRENCY,
    DEFAULT_FETCH_TIMEOUT, DEFAULT_SUBSCRIBER_CAPACITY,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::Receiver;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Number of steps in a single-shot run
pub const PIPELINE_STEPS: usize = 7;

/// Queue size for a watch subscriber that is not drained until the
/// single-shot run ends
///
/// Holds `connected`, every `pipeline_step` and one full first tick
/// (`poll_start` plus an update and a breaking change per dependency).
pub fn watch_queue_capacity(dependencies: usize) -> usize {
    (2 * dependencies + PIPELINE_STEPS + 8).max(DEFAULT_SUBSCRIBER_CAPACITY)
}

/// Everything a single-shot run produced
#[derive(Debug)]
pub struct PipelineOutcome {
    pub report: AnalysisReport,
    /// Dependencies after merging and `--only` filtering
    pub dependencies: Vec<DependencySpec>,
    pub records: Vec<VersionRecord>,
    /// Usage table from the source scan, reused while watching
    pub usages: Vec<UsageSite>,
}

/// Single-shot analysis of one repository
pub struct Pipeline {
    root: PathBuf,
    registry: Arc<dyn RegistryAdapter>,
    scanner: CodeScanner,
    fixer: Option<Arc<dyn MigrationFixer>>,
    max_fixes_per_package: usize,
    concurrency: usize,
    fetch_timeout: Duration,
    only: Vec<String>,
    broadcaster: Option<Arc<EventBroadcaster>>,
    show_progress: bool,
}

impl Pipeline {
    pub fn new(root: impl Into<PathBuf>, registry: Arc<dyn RegistryAdapter>) -> Self {
        Self {
            root: root.into(),
            registry,
            scanner: CodeScanner::new(),
            fixer: None,
            max_fixes_per_package: DEFAULT_MAX_FIXES_PER_PACKAGE,
            concurrency: DEFAULT_CONCURRENCY,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            only: Vec::new(),
            broadcaster: None,
            show_progress: false,
        }
    }

    /// Uses a preconfigured scanner (exclusions); the package filter is set per run
    pub fn with_scanner(mut self, scanner: CodeScanner) -> Self {
        self.scanner = scanner;
        self
    }

    pub fn with_fixer(mut self, fixer: Arc<dyn MigrationFixer>, max_per_package: usize) -> Self {
        self.fixer = Some(fixer);
        self.max_fixes_per_package = max_per_package;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Restricts the run to these packages
    pub fn with_only(mut self, packages: Vec<String>) -> Self {
        self.only = packages;
        self
    }

    /// Emits a `pipeline_step` event at the start of each step
    pub fn with_broadcaster(mut self, broadcaster: Arc<EventBroadcaster>) -> Self {
        self.broadcaster = Some(broadcaster);
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    fn step(&self, progress: &mut Progress, step: usize, message: &str) {
        debug!("Step {}/{}: {}", step, PIPELINE_STEPS, message);
        progress.step(step, PIPELINE_STEPS, message);
        if let Some(broadcaster) = &self.broadcaster {
            broadcaster.broadcast(&StreamEvent::pipeline_step(step, PIPELINE_STEPS, message));
        }
    }

    /// Reads and merges the repository's manifests
    pub fn load_manifests(&self) -> ManifestSet {
        load_dependencies(&self.root)
    }

    /// Runs every step and builds the report
    pub async fn run(&self) -> PipelineOutcome {
        let manifests = self.load_manifests();
        self.run_loaded(manifests).await
    }

    /// Runs every step over manifests read by [`Pipeline::load_manifests`]
    pub async fn run_loaded(&self, manifests: ManifestSet) -> PipelineOutcome {
        let mut progress = Progress::new(self.show_progress);
        let mut warnings = Vec::new();

        // Step 1: Parse manifests
        self.step(&mut progress, 1, "Parsing dependency manifests");
        warnings.extend(manifests.warnings);
        let total_dependencies = manifests.dependencies.len();
        let dependencies: Vec<DependencySpec> = if self.only.is_empty() {
            manifests.dependencies
        } else {
            let filter = PackageFilter::only(&self.only);
            manifests
                .dependencies
                .into_iter()
                .filter(|d| filter.accepts(&d.name))
                .collect()
        };

        // Step 2: Fetch latest versions
        self.step(&mut progress, 2, "Fetching latest versions");
        progress.start(dependencies.len() as u64, "Fetching latest versions");
        let packages: Vec<String> = dependencies.iter().map(|d| d.name.clone()).collect();
        let fetched = fetch_all(
            &self.registry,
            &packages,
            self.concurrency,
            self.fetch_timeout,
            |_| progress.inc(),
        )
        .await;

        // Step 3: Classify
        self.step(&mut progress, 3, "Classifying version changes");
        let records: Vec<VersionRecord> = dependencies
            .iter()
            .zip(fetched)
            .map(|(dep, result)| {
                let latest = match result {
                    Ok(latest) => Some(latest),
                    Err(e) => {
                        warn!("{}", e);
                        warnings.push(e.to_string());
                        None
                    }
                };
                VersionRecord::new(&dep.name, dep.pinned_version.clone(), latest)
            })
            .collect();

        // Step 4: Scan sources
        self.step(&mut progress, 4, "Scanning source files");
        let scanner = self
            .scanner
            .clone()
            .with_filter(PackageFilter::only(&packages));
        let root = self.root.clone();
        let scan = match tokio::task::spawn_blocking(move || scanner.scan(&root)).await {
            Ok(scan) => scan,
            Err(e) => {
                warn!("Source scan failed: {}", e);
                warnings.push(format!("source scan failed: {}", e));
                Default::default()
            }
        };
        info!(
            "Scanned {} files, found {} usages",
            scan.files_scanned,
            scan.usages.len()
        );
        warnings.extend(scan.warnings);

        // Step 5: Map impacts
        self.step(&mut progress, 5, "Mapping impacted lines");
        let impacts = map_impacts(&records, &scan.usages);

        // Step 6: Suggest fixes
        self.step(&mut progress, 6, "Generating fix suggestions");
        let mut results: Vec<PackageResult> =
            records.iter().map(PackageResult::from_record).collect();
        for impact in &impacts {
            if let Some(result) = results.iter_mut().find(|r| r.package == impact.package) {
                result.impacted_files = self.impacted_files(impact);
            }
        }
        if let Some(fixer) = &self.fixer {
            self.attach_fixes(fixer.as_ref(), &mut results, &mut progress)
                .await;
        }

        // Step 7: Build report
        self.step(&mut progress, 7, "Building report");
        progress.finish_and_clear();
        let report = AnalysisReport::new(
            self.root.display().to_string(),
            total_dependencies,
            results,
            warnings,
        );

        PipelineOutcome {
            report,
            dependencies,
            records,
            usages: scan.usages,
        }
    }

    fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }

    fn impacted_files(&self, impact: &ImpactReport) -> Vec<ImpactedFile> {
        impact
            .files
            .iter()
            .map(|file| ImpactedFile {
                file: self.relative(&file.file),
                impacts: file
                    .usages
                    .iter()
                    .map(|usage| ImpactEntry {
                        line: usage.line,
                        api: usage.symbol.clone(),
                        context: usage.context.clone(),
                        ai_fix: None,
                    })
                    .collect(),
            })
            .collect()
    }

    /// Requests suggestions for the first impacted lines of each breaking package
    async fn attach_fixes(
        &self,
        fixer: &dyn MigrationFixer,
        results: &mut [PackageResult],
        progress: &mut Progress,
    ) {
        let requested: usize = results
            .iter()
            .map(|r| r.impact_count().min(self.max_fixes_per_package))
            .sum();
        progress.start(requested as u64, "Generating fix suggestions");

        for result in results.iter_mut() {
            let (Some(current), Some(latest)) =
                (result.current_version.clone(), result.latest_version.clone())
            else {
                continue;
            };
            let package = result.package.clone();
            let mut remaining = self.max_fixes_per_package;

            for file in &mut result.impacted_files {
                for entry in &mut file.impacts {
                    if remaining == 0 {
                        break;
                    }
                    remaining -= 1;
                    let request = FixRequest {
                        package: package.clone(),
                        current_version: current.clone(),
                        latest_version: latest.clone(),
                        file: PathBuf::from(&file.file),
                        line: entry.line,
                        symbol: entry.api.clone(),
                        context: entry.context.clone(),
                    };
                    entry.ai_fix = fixer.suggest(&request).await;
                    progress.inc();
                }
            }
        }
    }
}

/// Streams controller events as JSON lines until `cancel` fires
///
/// `events` must be subscribed to the controller's broadcaster. For every
/// `breaking_change` event the stored usage table is re-joined and handed to
/// `on_breaking`; sources are not rescanned.
pub async fn watch_updates<W, F>(
    controller: Arc<StreamController>,
    mut events: Receiver<StreamEvent>,
    usages: &[UsageSite],
    cancel: CancellationToken,
    writer: &mut EventWriter<W>,
    mut on_breaking: F,
) -> std::io::Result<()>
where
    W: Write,
    F: FnMut(&ImpactReport),
{
    let handle = Arc::clone(&controller).spawn(cancel.clone());

    let mut handle_event = |event: &StreamEvent, writer: &mut EventWriter<W>| {
        if let EventPayload::BreakingChange {
            package_name,
            current_version,
            latest_version,
        } = &event.payload
        {
            let record = VersionRecord::new(
                package_name,
                Some(current_version.clone()),
                Some(latest_version.clone()),
            );
            on_breaking(&impact_for(&record, usages));
        }
        writer.write_event(event)
    };

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            event = events.recv() => match event {
                Some(event) => handle_event(&event, writer)?,
                None => break,
            },
        }
    }

    if let Err(e) = handle.await {
        warn!("Update stream task failed: {}", e);
    }
    while let Ok(event) = events.try_recv() {
        handle_event(&event, writer)?;
    }
    Ok(())
}
