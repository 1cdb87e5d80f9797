//! Version classification
//!
//! Compares the version a repository pins against the latest release and
//! assigns a [`VersionStatus`]. Classification is a pure function of the two
//! strings:
//!
//! 1. either side missing or unparseable: `unknown`
//! 2. latest major greater than pinned major: `breaking`
//! 3. latest greater than pinned: `outdated`
//! 4. otherwise `up-to-date`

mod version;

pub use version::{PreIdent, Version};

use crate::domain::VersionStatus;

/// Classifies a pinned version against the latest available version
pub fn classify(pinned: &str, latest: &str) -> VersionStatus {
    let (Some(pinned), Some(latest)) = (Version::parse(pinned), Version::parse(latest)) else {
        return VersionStatus::Unknown;
    };
    if latest.major() > pinned.major() {
        VersionStatus::Breaking
    } else if latest > pinned {
        VersionStatus::Outdated
    } else {
        VersionStatus::UpToDate
    }
}

/// Like [`classify`], with absent versions mapping to `unknown`
pub fn classify_optional(pinned: Option<&str>, latest: Option<&str>) -> VersionStatus {
    match (pinned, latest) {
        (Some(p), Some(l)) => classify(p, l),
        _ => VersionStatus::Unknown,
    }
}
