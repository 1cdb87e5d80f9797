//! Impact mapping: joins breaking version records with scanned usages

use crate::domain::{
    normalize_package_name, FileImpacts, ImpactReport, UsageSite, VersionRecord,
};
use std::collections::HashMap;
use std::path::PathBuf;

/// Builds one report per breaking record, in record order.
///
/// Usages are grouped by file in the order files first appear in `usages`
/// and sorted by line within each file. A breaking package nobody imports
/// still gets a report with no files.
pub fn map_impacts(records: &[VersionRecord], usages: &[UsageSite]) -> Vec<ImpactReport> {
    records
        .iter()
        .filter(|r| r.status().is_breaking())
        .map(|record| impact_for(record, usages))
        .collect()
}

/// Report for a single record regardless of its status
pub fn impact_for(record: &VersionRecord, usages: &[UsageSite]) -> ImpactReport {
    let package = normalize_package_name(record.name());
    let mut index: HashMap<&PathBuf, usize> = HashMap::new();
    let mut files: Vec<FileImpacts> = Vec::new();

    for usage in usages
        .iter()
        .filter(|u| normalize_package_name(&u.bound_package) == package)
    {
        let slot = *index.entry(&usage.file).or_insert_with(|| {
            files.push(FileImpacts {
                file: usage.file.clone(),
                usages: Vec::new(),
            });
            files.len() - 1
        });
        files[slot].usages.push(usage.clone());
    }

    for file in &mut files {
        file.usages.sort_by_key(|u| u.line);
    }

    ImpactReport {
        package: record.name().to_string(),
        current_version: record.pinned_version().map(str::to_string),
        latest_version: record.latest_version().map(str::to_string),
        files,
    }
}
