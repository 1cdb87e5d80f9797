//! Classified version record

use super::VersionStatus;
use crate::classify::classify_optional;
use serde::Serialize;

/// A dependency's pinned and latest versions with the derived status.
///
/// The status is computed by the classifier on construction and cannot be
/// set directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionRecord {
    name: String,
    pinned_version: Option<String>,
    latest_version: Option<String>,
    status: VersionStatus,
}

impl VersionRecord {
    /// Creates a record, classifying the two versions
    pub fn new(
        name: impl Into<String>,
        pinned_version: Option<String>,
        latest_version: Option<String>,
    ) -> Self {
        let status = classify_optional(pinned_version.as_deref(), latest_version.as_deref());
        Self {
            name: name.into(),
            pinned_version,
            latest_version,
            status,
        }
    }

    /// Normalized package name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pinned_version(&self) -> Option<&str> {
        self.pinned_version.as_deref()
    }

    pub fn latest_version(&self) -> Option<&str> {
        self.latest_version.as_deref()
    }

    pub fn status(&self) -> VersionStatus {
        self.status
    }
}
