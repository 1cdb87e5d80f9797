//! Manifest file detection and parsing
//!
//! This module provides functionality to:
//! - Detect requirements and pyproject manifests in a repository root
//! - Parse dependencies from each format
//! - Merge declarations across files, later files winning

mod detector;
mod pyproject_toml;
mod requirements;

pub use detector::{detect_manifests, ManifestInfo, ManifestKind};
pub use pyproject_toml::PyprojectTomlParser;
pub use requirements::{parse_requirement_line, RequirementsParser};

use crate::domain::{merge_last_wins, DependencySpec};
use crate::error::ManifestError;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Trait for parsing manifest files
pub trait ManifestParser {
    /// Parse dependencies from the content of the manifest at `path`
    fn parse(&self, path: &Path, content: &str) -> Result<Vec<DependencySpec>, ManifestError>;
}

/// Get a manifest parser for the specified format
pub fn get_parser(kind: ManifestKind) -> Box<dyn ManifestParser> {
    match kind {
        ManifestKind::Requirements => Box::new(RequirementsParser),
        ManifestKind::Pyproject => Box::new(PyprojectTomlParser),
    }
}

/// Parse dependencies from a manifest file path
pub fn parse_manifest(path: &Path) -> Result<Vec<DependencySpec>, ManifestError> {
    let kind = ManifestKind::from_path(path).ok_or_else(|| ManifestError::UnsupportedFormat {
        path: path.to_path_buf(),
    })?;
    let content = std::fs::read_to_string(path).map_err(|e| ManifestError::read_error(path, e))?;
    get_parser(kind).parse(path, &content)
}

/// Dependencies gathered from every manifest in a repository
#[derive(Debug, Default)]
pub struct ManifestSet {
    /// Unique by normalized name, in first-declaration order
    pub dependencies: Vec<DependencySpec>,
    /// Manifests that were read, in merge order
    pub files: Vec<PathBuf>,
    /// One entry per manifest that could not be read or parsed
    pub warnings: Vec<String>,
}

/// Detects, parses and merges all manifests under `dir`
///
/// A manifest that fails to read or parse is skipped with a warning.
pub fn load_dependencies(dir: &Path) -> ManifestSet {
    let manifests = detect_manifests(dir);
    if manifests.is_empty() {
        warn!("No requirements files found in {}", dir.display());
    }

    let mut set = ManifestSet::default();
    let mut collected = Vec::new();
    for manifest in manifests {
        match parse_manifest(&manifest.path) {
            Ok(deps) => {
                debug!("{}: {} dependencies", manifest.path.display(), deps.len());
                collected.extend(deps);
                set.files.push(manifest.path);
            }
            Err(e) => {
                warn!("{}", e);
                set.warnings.push(e.to_string());
            }
        }
    }

    set.dependencies = merge_last_wins(collected);
    info!(
        "Parsed {} unique dependencies from {} manifest(s)",
        set.dependencies.len(),
        set.files.len()
    );
    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_merges_last_file_wins() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("requirements-base.txt"), "flask==1.1.0\nrequests==2.0.0\n").unwrap();
        fs::write(dir.path().join("requirements.txt"), "Flask==2.0.0\n").unwrap();

        let set = load_dependencies(dir.path());
        assert_eq!(set.files.len(), 2);
        assert_eq!(set.dependencies.len(), 2);
        assert_eq!(set.dependencies[0].name, "flask");
        assert_eq!(set.dependencies[0].pinned_version.as_deref(), Some("2.0.0"));
        assert!(set.dependencies[0].source_file.ends_with("requirements.txt"));
        assert_eq!(set.dependencies[1].name, "requests");
    }

    #[test]
    fn test_load_bad_pyproject_is_warning() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("pyproject.toml"), "not = [valid").unwrap();
        fs::write(dir.path().join("requirements.txt"), "flask==2.0.0\n").unwrap();

        let set = load_dependencies(dir.path());
        assert_eq!(set.dependencies.len(), 1);
        assert_eq!(set.warnings.len(), 1);
        assert!(set.warnings[0].contains("pyproject.toml"));
    }

    #[test]
    fn test_load_empty_repository() {
        let dir = TempDir::new().unwrap();
        let set = load_dependencies(dir.path());
        assert!(set.dependencies.is_empty());
        assert!(set.files.is_empty());
    }

    #[test]
    fn test_parse_manifest_unsupported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Pipfile");
        fs::write(&path, "").unwrap();
        assert!(matches!(
            parse_manifest(&path),
            Err(ManifestError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_parse_manifest_missing_file() {
        let result = parse_manifest(Path::new("/nonexistent/requirements.txt"));
        assert!(matches!(result, Err(ManifestError::ReadError { .. })));
    }
}
