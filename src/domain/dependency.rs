//! Dependency declaration structures

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

/// A single dependency declared in a manifest file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencySpec {
    /// Normalized (PEP 503) package name, used as the identity key
    pub name: String,
    /// Package name as written in the manifest
    pub raw_name: String,
    /// Version the repository pins or constrains to, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pinned_version: Option<String>,
    /// Comparison operator that preceded the version (`==`, `>=`, `~=`...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    /// Manifest the declaration was read from
    pub source_file: PathBuf,
    /// 1-based line in the manifest, 0 when the format has no line notion
    pub line: usize,
}

impl DependencySpec {
    /// Creates a new dependency spec; the name is normalized
    pub fn new(
        raw_name: impl Into<String>,
        pinned_version: Option<String>,
        source_file: impl Into<PathBuf>,
    ) -> Self {
        let raw_name = raw_name.into();
        Self {
            name: normalize_package_name(&raw_name),
            raw_name,
            pinned_version,
            operator: None,
            source_file: source_file.into(),
            line: 0,
        }
    }

    /// Sets the version operator (builder pattern)
    pub fn with_operator(mut self, operator: impl Into<String>) -> Self {
        self.operator = Some(operator.into());
        self
    }

    /// Sets the manifest line (builder pattern)
    pub fn with_line(mut self, line: usize) -> Self {
        self.line = line;
        self
    }

    /// Returns true if the declaration pins an exact version
    pub fn is_pinned(&self) -> bool {
        self.pinned_version.is_some() && matches!(self.operator.as_deref(), Some("==") | Some("==="))
    }
}

impl fmt::Display for DependencySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.operator, &self.pinned_version) {
            (Some(op), Some(v)) => write!(f, "{}{}{}", self.name, op, v),
            (None, Some(v)) => write!(f, "{}=={}", self.name, v),
            _ => write!(f, "{}", self.name),
        }
    }
}

/// Normalizes a package name per PEP 503: lowercase, runs of `-`, `_`, `.`
/// collapsed to a single `-`
pub fn normalize_package_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_separator = false;
    for c in name.trim().chars() {
        if matches!(c, '-' | '_' | '.') {
            if !in_separator {
                out.push('-');
                in_separator = true;
            }
        } else {
            out.push(c.to_ascii_lowercase());
            in_separator = false;
        }
    }
    out
}

/// Merges specs in the given order; a later spec for the same normalized name
/// replaces the earlier one but keeps the earlier position.
pub fn merge_last_wins(specs: impl IntoIterator<Item = DependencySpec>) -> Vec<DependencySpec> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut merged: Vec<DependencySpec> = Vec::new();
    for spec in specs {
        match index.get(&spec.name) {
            Some(&pos) => merged[pos] = spec,
            None => {
                index.insert(spec.name.clone(), merged.len());
                merged.push(spec);
            }
        }
    }
    merged
}
