//! Per-scope import binding tables

use crate::domain::normalize_package_name;
use std::collections::{HashMap, HashSet};

/// Import names that differ from the distribution published on PyPI
const IMPORT_ALIASES: &[(&str, &str)] = &[
    ("yaml", "pyyaml"),
    ("PIL", "pillow"),
    ("sklearn", "scikit-learn"),
    ("bs4", "beautifulsoup4"),
    ("cv2", "opencv-python"),
    ("dateutil", "python-dateutil"),
];

/// Maps a top-level import module to the normalized distribution name
pub fn package_for_module(top_level: &str) -> String {
    IMPORT_ALIASES
        .iter()
        .find(|(module, _)| *module == top_level)
        .map(|(_, dist)| (*dist).to_string())
        .unwrap_or_else(|| normalize_package_name(top_level))
}

/// Restricts which packages the scanner binds
#[derive(Debug, Clone, Default)]
pub struct PackageFilter {
    packages: Option<HashSet<String>>,
}

impl PackageFilter {
    /// Accepts every package
    pub fn all() -> Self {
        Self { packages: None }
    }

    /// Accepts only the given packages (normalized on entry)
    pub fn only<I, S>(packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            packages: Some(
                packages
                    .into_iter()
                    .map(|p| normalize_package_name(p.as_ref()))
                    .collect(),
            ),
        }
    }

    pub fn accepts(&self, package: &str) -> bool {
        self.packages
            .as_ref()
            .is_none_or(|set| set.contains(package))
    }
}

/// Where a local name came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    /// Normalized distribution name
    pub package: String,
    /// Dotted path shown for usages through this name
    pub symbol: String,
}

/// Local name to binding table for one scope
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportBindings {
    table: HashMap<String, Binding>,
}

impl ImportBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, local: impl Into<String>, binding: Binding) {
        self.table.insert(local.into(), binding);
    }

    pub fn unbind(&mut self, local: &str) {
        self.table.remove(local);
    }

    pub fn get(&self, local: &str) -> Option<&Binding> {
        self.table.get(local)
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Adds names bound in `other` but not here; used where control flow joins
    pub fn merge(&mut self, other: &ImportBindings) {
        for (name, binding) in &other.table {
            self.table
                .entry(name.clone())
                .or_insert_with(|| binding.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding(package: &str, symbol: &str) -> Binding {
        Binding {
            package: package.to_string(),
            symbol: symbol.to_string(),
        }
    }

    #[test]
    fn test_package_for_module_alias_table() {
        assert_eq!(package_for_module("yaml"), "pyyaml");
        assert_eq!(package_for_module("PIL"), "pillow");
        assert_eq!(package_for_module("sklearn"), "scikit-learn");
        assert_eq!(package_for_module("bs4"), "beautifulsoup4");
        assert_eq!(package_for_module("cv2"), "opencv-python");
        assert_eq!(package_for_module("dateutil"), "python-dateutil");
    }

    #[test]
    fn test_package_for_module_normalizes() {
        assert_eq!(package_for_module("Flask"), "flask");
        assert_eq!(package_for_module("google_auth"), "google-auth");
    }

    #[test]
    fn test_filter_all_accepts_everything() {
        assert!(PackageFilter::all().accepts("anything"));
    }

    #[test]
    fn test_filter_only_normalizes() {
        let filter = PackageFilter::only(["Flask", "python_dateutil"]);
        assert!(filter.accepts("flask"));
        assert!(filter.accepts("python-dateutil"));
        assert!(!filter.accepts("requests"));
    }

    #[test]
    fn test_bind_unbind() {
        let mut table = ImportBindings::new();
        table.bind("np", binding("numpy", "numpy"));
        assert_eq!(table.get("np").map(|b| b.package.as_str()), Some("numpy"));
        table.unbind("np");
        assert!(table.get("np").is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn test_merge_keeps_existing_and_adds_missing() {
        let mut left = ImportBindings::new();
        left.bind("a", binding("pkg-a", "a"));
        let mut right = ImportBindings::new();
        right.bind("a", binding("other", "a"));
        right.bind("b", binding("pkg-b", "b"));
        left.merge(&right);
        assert_eq!(left.len(), 2);
        assert_eq!(left.get("a").map(|b| b.package.as_str()), Some("pkg-a"));
        assert_eq!(left.get("b").map(|b| b.package.as_str()), Some("pkg-b"));
    }
}
