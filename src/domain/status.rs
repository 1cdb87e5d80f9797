//! Classification status of a dependency

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of comparing a pinned version against the latest release
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VersionStatus {
    /// Latest is not newer than pinned
    UpToDate,
    /// Latest is newer within the same major version
    Outdated,
    /// Latest has a higher major version
    Breaking,
    /// Either version is missing or unparseable
    Unknown,
}

impl VersionStatus {
    /// Returns the wire name of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionStatus::UpToDate => "up-to-date",
            VersionStatus::Outdated => "outdated",
            VersionStatus::Breaking => "breaking",
            VersionStatus::Unknown => "unknown",
        }
    }

    /// Returns true for `Breaking`
    pub fn is_breaking(&self) -> bool {
        matches!(self, VersionStatus::Breaking)
    }
}

impl fmt::Display for VersionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
