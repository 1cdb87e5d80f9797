//! JSON output formatter for machine processing

use crate::domain::AnalysisReport;
use crate::output::{OutputFormatter, Verbosity};
use std::io::Write;

/// JSON formatter for machine-readable output
pub struct JsonFormatter {
    /// Quiet drops per-package results and keeps the counters
    verbosity: Verbosity,
}

impl JsonFormatter {
    /// Create a new JSON formatter
    pub fn new(verbosity: Verbosity) -> Self {
        Self { verbosity }
    }
}

impl OutputFormatter for JsonFormatter {
    fn format(&self, report: &AnalysisReport, writer: &mut dyn Write) -> std::io::Result<()> {
        let mut value = serde_json::to_value(report).map_err(std::io::Error::other)?;
        if self.verbosity == Verbosity::Quiet {
            if let Some(object) = value.as_object_mut() {
                object.remove("results");
            }
        }

        let json = serde_json::to_string_pretty(&value).map_err(std::io::Error::other)?;
        writeln!(writer, "{}", json)?;
        Ok(())
    }
}
