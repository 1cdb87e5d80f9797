//! requirements.txt parser
//!
//! One requirement per line. Options (`-r`, `-e`, `--index-url`), VCS and URL
//! requirements, comments and environment markers are skipped.

use crate::domain::DependencySpec;
use crate::error::ManifestError;
use crate::manifest::ManifestParser;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

/// Parser for pip requirements files
pub struct RequirementsParser;

// name, optional [extras], optional operator, optional version
static REQUIREMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^([a-zA-Z0-9](?:[a-zA-Z0-9._-]*[a-zA-Z0-9])?)(\[[a-zA-Z0-9,_ -]+\])?\s*([=<>!~]=?=?)?\s*([0-9a-zA-Z.*+-]+)?",
    )
    .unwrap()
});

const SKIPPED_PREFIXES: &[&str] = &["-", "git+", "http://", "https://", "svn+", "hg+"];

/// Parses a single requirement line, returning `None` for lines that declare
/// nothing
pub fn parse_requirement_line(line: &str, source: &Path, line_no: usize) -> Option<DependencySpec> {
    let line = line.split('#').next().unwrap_or("");
    let line = line.split(';').next().unwrap_or("").trim();
    if line.is_empty() || SKIPPED_PREFIXES.iter().any(|p| line.starts_with(p)) {
        return None;
    }

    let caps = REQUIREMENT_RE.captures(line)?;
    let raw_name = caps.get(1)?.as_str();
    let operator = caps.get(3).map(|m| m.as_str());
    let version = caps.get(4).map(|m| m.as_str().to_string());

    let mut spec = DependencySpec::new(raw_name, operator.and(version), source).with_line(line_no);
    if let Some(op) = operator {
        spec = spec.with_operator(op);
    }
    Some(spec)
}

impl ManifestParser for RequirementsParser {
    fn parse(&self, path: &Path, content: &str) -> Result<Vec<DependencySpec>, ManifestError> {
        Ok(content
            .lines()
            .enumerate()
            .filter_map(|(i, line)| parse_requirement_line(line, path, i + 1))
            .collect())
    }
}
