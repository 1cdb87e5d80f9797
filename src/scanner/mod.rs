//! Source scanning: finds every use of an imported package in a repository
//!
//! Files are discovered with walkdir, parsed with tree-sitter, and resolved
//! in parallel with rayon. Results are appended in path order so every file
//! contributes one contiguous block of usages.

mod bindings;
mod resolver;
mod syntax;

pub use bindings::{package_for_module, Binding, ImportBindings, PackageFilter};
pub use resolver::resolve_usages;
pub use syntax::{parse_module, MAX_NESTING_DEPTH};

use crate::domain::UsageSite;
use crate::error::ScanError;
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Directory names never descended into
pub const DEFAULT_EXCLUDE_DIRS: &[&str] = &[
    "__pycache__",
    ".git",
    ".venv",
    "venv",
    "env",
    "node_modules",
    ".tox",
    "build",
    "dist",
    ".eggs",
    ".mypy_cache",
    ".pytest_cache",
];

/// Result of scanning a repository
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub usages: Vec<UsageSite>,
    /// One entry per file that could not be read or parsed
    pub warnings: Vec<String>,
    pub files_scanned: usize,
}

/// Scans Python sources for usages of imported packages
#[derive(Debug, Clone)]
pub struct CodeScanner {
    exclude_dirs: HashSet<String>,
    filter: PackageFilter,
}

impl Default for CodeScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeScanner {
    /// Creates a scanner with the default exclusions and no package filter
    pub fn new() -> Self {
        Self {
            exclude_dirs: DEFAULT_EXCLUDE_DIRS.iter().map(|d| d.to_string()).collect(),
            filter: PackageFilter::all(),
        }
    }

    /// Adds directory names to skip
    pub fn with_exclude_dirs<I, S>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_dirs.extend(dirs.into_iter().map(Into::into));
        self
    }

    /// Restricts usages to the given packages
    pub fn with_filter(mut self, filter: PackageFilter) -> Self {
        self.filter = filter;
        self
    }

    fn is_excluded(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return false;
        }
        let name = entry.file_name().to_string_lossy();
        name.starts_with('.') || self.exclude_dirs.contains(name.as_ref())
    }

    /// Lists `*.py` files under `root`, sorted by path
    pub fn discover(&self, root: &Path) -> (Vec<PathBuf>, Vec<String>) {
        let mut files = Vec::new();
        let mut warnings = Vec::new();
        let walker = WalkDir::new(root)
            .into_iter()
            .filter_entry(|e| !self.is_excluded(e));
        for entry in walker {
            match entry {
                Ok(entry) => {
                    let is_python = entry.path().extension().is_some_and(|ext| ext == "py");
                    if entry.file_type().is_file() && is_python {
                        files.push(entry.into_path());
                    }
                }
                Err(e) => {
                    warn!("Skipping unreadable path: {}", e);
                    warnings.push(e.to_string());
                }
            }
        }
        files.sort();
        (files, warnings)
    }

    /// Resolves usages in already-loaded source text
    pub fn scan_source(&self, path: &Path, source: &str) -> Result<Vec<UsageSite>, ScanError> {
        let module = parse_module(path, source)?;
        Ok(resolve_usages(path, source, &module, &self.filter))
    }

    /// Reads and scans one file
    pub fn scan_file(&self, path: &Path) -> Result<Vec<UsageSite>, ScanError> {
        let source =
            std::fs::read_to_string(path).map_err(|e| ScanError::read_error(path, e))?;
        self.scan_source(path, &source)
    }

    /// Scans every Python file under `root`
    ///
    /// Unreadable or unparseable files are skipped and reported in
    /// [`ScanOutcome::warnings`]; a scan never fails as a whole.
    pub fn scan(&self, root: &Path) -> ScanOutcome {
        let (files, mut warnings) = self.discover(root);
        debug!("Scanning {} Python files under {}", files.len(), root.display());

        let results: Vec<Result<Vec<UsageSite>, ScanError>> =
            files.par_iter().map(|path| self.scan_file(path)).collect();

        let mut usages = Vec::new();
        for result in results {
            match result {
                Ok(found) => usages.extend(found),
                Err(e) => {
                    warn!("{}", e);
                    warnings.push(e.to_string());
                }
            }
        }

        ScanOutcome {
            usages,
            warnings,
            files_scanned: files.len(),
        }
    }
}
