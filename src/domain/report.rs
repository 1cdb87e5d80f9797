//! Impact and analysis report structures

use super::{UsageSite, VersionRecord, VersionStatus};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Usages of one breaking package, grouped by file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImpactReport {
    pub package: String,
    pub current_version: Option<String>,
    pub latest_version: Option<String>,
    /// Files in first-seen scan order
    pub files: Vec<FileImpacts>,
}

impl ImpactReport {
    /// Total number of usages across all files
    pub fn usage_count(&self) -> usize {
        self.files.iter().map(|f| f.usages.len()).sum()
    }
}

/// Usages in a single file, ascending by line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileImpacts {
    pub file: PathBuf,
    pub usages: Vec<UsageSite>,
}

/// A suggested migration for one usage site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiFix {
    pub explanation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migration_notes: Option<String>,
    /// Confidence in `[0, 1]`
    pub confidence: f64,
}

/// One impacted line in the final report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImpactEntry {
    pub line: usize,
    /// Dotted API path that was used
    pub api: String,
    pub context: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_fix: Option<AiFix>,
}

/// All impacted lines of one file in the final report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImpactedFile {
    /// Path relative to the repository root
    pub file: String,
    pub impacts: Vec<ImpactEntry>,
}

/// Per-package entry of the final report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackageResult {
    pub package: String,
    pub current_version: Option<String>,
    pub latest_version: Option<String>,
    pub status: VersionStatus,
    pub impacted_files: Vec<ImpactedFile>,
}

impl PackageResult {
    /// Creates a result with no impacted files from a record
    pub fn from_record(record: &VersionRecord) -> Self {
        Self {
            package: record.name().to_string(),
            current_version: record.pinned_version().map(str::to_string),
            latest_version: record.latest_version().map(str::to_string),
            status: record.status(),
            impacted_files: Vec::new(),
        }
    }

    /// Number of impacted lines across all files
    pub fn impact_count(&self) -> usize {
        self.impacted_files.iter().map(|f| f.impacts.len()).sum()
    }
}

/// Final single-shot report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub repository: String,
    pub total_dependencies: usize,
    pub total_updates: usize,
    pub breaking_changes: usize,
    pub outdated_packages: usize,
    pub up_to_date_packages: usize,
    pub unknown_packages: usize,
    pub results: Vec<PackageResult>,
    pub warnings: Vec<String>,
}

impl AnalysisReport {
    /// Builds a report and its counters from per-package results
    pub fn new(
        repository: impl Into<String>,
        total_dependencies: usize,
        results: Vec<PackageResult>,
        warnings: Vec<String>,
    ) -> Self {
        let count = |status: VersionStatus| results.iter().filter(|r| r.status == status).count();
        let breaking_changes = count(VersionStatus::Breaking);
        let outdated_packages = count(VersionStatus::Outdated);
        let up_to_date_packages = count(VersionStatus::UpToDate);
        Self {
            repository: repository.into(),
            total_dependencies,
            // unknown results have no comparable version and are not updates
            total_updates: breaking_changes + outdated_packages + up_to_date_packages,
            breaking_changes,
            outdated_packages,
            up_to_date_packages,
            unknown_packages: count(VersionStatus::Unknown),
            results,
            warnings,
        }
    }

    /// Returns true if any package has a breaking upgrade
    pub fn has_breaking(&self) -> bool {
        self.breaking_changes > 0
    }
}
