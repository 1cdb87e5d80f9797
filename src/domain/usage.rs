//! Usage sites produced by the source scanner

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// How a bound symbol was referenced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageKind {
    /// The import statement that created the binding
    Import,
    /// A call through the binding, `requests.get(...)`
    Call,
    /// An attribute access that is not called
    Attribute,
    /// A bare reference to the bound name
    Name,
}

/// One reference to an external package's symbol in a source file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSite {
    /// File path (absolute during a scan, relative in reports)
    pub file: PathBuf,
    /// 1-based line number
    pub line: usize,
    /// Dotted access path, e.g. `requests.get` or `Flask`
    pub symbol: String,
    /// Normalized package the symbol resolves to
    pub bound_package: String,
    /// Trimmed text of the source line
    pub context: String,
    pub kind: UsageKind,
}

impl fmt::Display for UsageSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} {} [{}]",
            self.file.display(),
            self.line,
            self.symbol,
            self.bound_package
        )
    }
}
