//! pyproject.toml parser for Python projects
//!
//! Handles:
//! - project.dependencies (PEP 621)
//! - project.optional-dependencies (PEP 621)
//! - tool.poetry.dependencies (Poetry)
//! - tool.poetry.dev-dependencies (Poetry)
//! - tool.poetry.group.*.dependencies (Poetry 1.2+)

use crate::domain::DependencySpec;
use crate::error::ManifestError;
use crate::manifest::requirements::parse_requirement_line;
use crate::manifest::ManifestParser;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use toml::Value;

/// Parser for pyproject.toml files
pub struct PyprojectTomlParser;

// Poetry constraint: optional operator then a version, e.g. "^2.28.0", ">=1.0,<2.0", "1.2.3"
static POETRY_CONSTRAINT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\^|~=|~|==|>=|<=|!=|>|<|=)?\s*([0-9][0-9a-zA-Z.*+-]*)").unwrap());

impl ManifestParser for PyprojectTomlParser {
    fn parse(&self, path: &Path, content: &str) -> Result<Vec<DependencySpec>, ManifestError> {
        let toml: Value = toml::from_str(content)
            .map_err(|e: toml::de::Error| ManifestError::toml_parse_error(path, e.to_string()))?;

        let mut dependencies = Vec::new();
        let project = toml.get("project");

        // PEP 621 project.dependencies
        if let Some(deps) = project
            .and_then(|p| p.get("dependencies"))
            .and_then(|d| d.as_array())
        {
            dependencies.extend(pep508_array(deps, path));
        }

        // PEP 621 project.optional-dependencies
        if let Some(optional) = project
            .and_then(|p| p.get("optional-dependencies"))
            .and_then(|d| d.as_table())
        {
            for deps in optional.values().filter_map(Value::as_array) {
                dependencies.extend(pep508_array(deps, path));
            }
        }

        let poetry = toml.get("tool").and_then(|t| t.get("poetry"));

        for key in ["dependencies", "dev-dependencies"] {
            if let Some(table) = poetry.and_then(|p| p.get(key)).and_then(|d| d.as_table()) {
                dependencies.extend(poetry_table(table, path));
            }
        }

        if let Some(groups) = poetry
            .and_then(|p| p.get("group"))
            .and_then(|g| g.as_table())
        {
            for group in groups.values() {
                if let Some(table) = group.get("dependencies").and_then(|d| d.as_table()) {
                    dependencies.extend(poetry_table(table, path));
                }
            }
        }

        Ok(dependencies)
    }
}

fn pep508_array<'a>(deps: &'a [Value], path: &'a Path) -> impl Iterator<Item = DependencySpec> + 'a {
    deps.iter()
        .filter_map(Value::as_str)
        .filter_map(move |dep| parse_requirement_line(dep, path, 0))
}

fn poetry_table<'a>(
    table: &'a toml::map::Map<String, Value>,
    path: &'a Path,
) -> impl Iterator<Item = DependencySpec> + 'a {
    table
        .iter()
        // the interpreter constraint is not a package
        .filter(|(name, _)| name.as_str() != "python")
        .map(move |(name, value)| parse_poetry_dependency(name, value, path))
}

fn parse_poetry_dependency(name: &str, value: &Value, path: &Path) -> DependencySpec {
    let constraint = match value {
        Value::String(s) => Some(s.as_str()),
        Value::Table(t) => t.get("version").and_then(Value::as_str),
        _ => None,
    };

    let caps = constraint.and_then(|c| POETRY_CONSTRAINT_RE.captures(c));
    let version = caps
        .as_ref()
        .and_then(|c| c.get(2))
        .map(|m| m.as_str().to_string());
    let operator = caps
        .as_ref()
        .map(|c| c.get(1).map_or("==", |m| m.as_str()).to_string());

    let spec = DependencySpec::new(name, version, path);
    match operator {
        Some(op) => spec.with_operator(op),
        None => spec,
    }
}
