//! Manifest file detection
//!
//! Detects, relative to the repository root:
//! - `pyproject.toml`
//! - `requirements.txt` and `requirements-*.txt`
//! - `requirements/*.txt`

use std::path::{Path, PathBuf};

/// Format of a detected manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManifestKind {
    /// pip requirements list
    Requirements,
    /// PEP 621 / Poetry `pyproject.toml`
    Pyproject,
}

impl ManifestKind {
    /// Infers the kind from a file name
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        if name == "pyproject.toml" {
            Some(Self::Pyproject)
        } else if name.ends_with(".txt") {
            Some(Self::Requirements)
        } else {
            None
        }
    }
}

/// Information about a detected manifest file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestInfo {
    pub path: PathBuf,
    pub kind: ManifestKind,
}

impl ManifestInfo {
    pub fn new(path: impl Into<PathBuf>, kind: ManifestKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

fn is_requirements_name(name: &str) -> bool {
    name == "requirements.txt" || (name.starts_with("requirements-") && name.ends_with(".txt"))
}

fn list_files(dir: &Path) -> Vec<PathBuf> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .collect(),
        Err(_) => Vec::new(),
    }
}

/// Detects all manifest files directly under `dir`, sorted by path
///
/// Sorting decides merge precedence: declarations in later files win.
pub fn detect_manifests(dir: &Path) -> Vec<ManifestInfo> {
    let mut manifests = Vec::new();

    for path in list_files(dir) {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name == "pyproject.toml" {
            manifests.push(ManifestInfo::new(path, ManifestKind::Pyproject));
        } else if is_requirements_name(name) {
            manifests.push(ManifestInfo::new(path, ManifestKind::Requirements));
        }
    }

    for path in list_files(&dir.join("requirements")) {
        if path.extension().is_some_and(|ext| ext == "txt") {
            manifests.push(ManifestInfo::new(path, ManifestKind::Requirements));
        }
    }

    manifests.sort_by(|a, b| a.path.cmp(&b.path));
    manifests.dedup_by(|a, b| a.path == b.path);
    manifests
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn names(dir: &Path, manifests: &[ManifestInfo]) -> Vec<String> {
        manifests
            .iter()
            .map(|m| {
                m.path
                    .strip_prefix(dir)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect()
    }

    #[test]
    fn test_detect_requirements_variants_sorted() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("requirements.txt"), "").unwrap();
        fs::write(dir.path().join("requirements-dev.txt"), "").unwrap();
        fs::create_dir(dir.path().join("requirements")).unwrap();
        fs::write(dir.path().join("requirements/base.txt"), "").unwrap();
        fs::write(dir.path().join("requirements/notes.md"), "").unwrap();
        fs::write(dir.path().join("pyproject.toml"), "").unwrap();
        fs::write(dir.path().join("setup.py"), "").unwrap();

        let manifests = detect_manifests(dir.path());
        assert_eq!(
            names(dir.path(), &manifests),
            vec![
                "pyproject.toml",
                "requirements/base.txt",
                "requirements-dev.txt",
                "requirements.txt",
            ]
        );
        assert_eq!(manifests[0].kind, ManifestKind::Pyproject);
        assert_eq!(manifests[3].kind, ManifestKind::Requirements);
    }

    #[test]
    fn test_detect_none() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("app.py"), "").unwrap();
        assert!(detect_manifests(dir.path()).is_empty());
    }

    #[test]
    fn test_ignores_unrelated_txt() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();
        fs::write(dir.path().join("requirements_old.txt"), "").unwrap();
        assert!(detect_manifests(dir.path()).is_empty());
    }

    #[test]
    fn test_kind_from_path() {
        assert_eq!(
            ManifestKind::from_path(Path::new("a/pyproject.toml")),
            Some(ManifestKind::Pyproject)
        );
        assert_eq!(
            ManifestKind::from_path(Path::new("reqs.txt")),
            Some(ManifestKind::Requirements)
        );
        assert_eq!(ManifestKind::from_path(Path::new("Cargo.toml")), None);
    }
}
