//! Core domain models for depimpact
//!
//! This module contains the fundamental types used throughout the application:
//! - Dependency declarations read from manifests
//! - Version records and their classification status
//! - Usage sites found by the source scanner
//! - Impact and analysis report structures

mod dependency;
mod record;
mod report;
mod status;
mod usage;

pub use dependency::{merge_last_wins, normalize_package_name, DependencySpec};
pub use record::VersionRecord;
pub use report::{
    AiFix, AnalysisReport, FileImpacts, ImpactEntry, ImpactReport, ImpactedFile, PackageResult,
};
pub use status::VersionStatus;
pub use usage::{UsageKind, UsageSite};
