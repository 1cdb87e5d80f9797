//! Text output formatter for human-readable display
//!
//! This module provides:
//! - Per-package status lines with colors
//! - Impacted files and lines under each breaking package
//! - Fix suggestions and warnings in verbose mode
//! - Summary with status breakdown

use crate::domain::{AnalysisReport, ImpactReport, PackageResult, VersionStatus};
use crate::output::{OutputFormatter, Verbosity};
use colored::Colorize;
use std::io::Write;

/// Text formatter for human-readable output
pub struct TextFormatter {
    verbosity: Verbosity,
    color: bool,
}

impl TextFormatter {
    /// Create a new text formatter
    pub fn new(verbosity: Verbosity) -> Self {
        Self::with_color(verbosity, true)
    }

    /// Create a new text formatter with color option
    pub fn with_color(verbosity: Verbosity, color: bool) -> Self {
        Self { verbosity, color }
    }

    fn status_label(&self, status: VersionStatus) -> String {
        let label = status.as_str();
        if !self.color {
            return label.to_string();
        }
        match status {
            VersionStatus::Breaking => label.red().bold().to_string(),
            VersionStatus::Outdated => label.yellow().to_string(),
            VersionStatus::UpToDate => label.green().to_string(),
            VersionStatus::Unknown => label.dimmed().to_string(),
        }
    }

    fn is_listed(&self, status: VersionStatus) -> bool {
        match status {
            VersionStatus::Breaking | VersionStatus::Outdated => true,
            VersionStatus::UpToDate | VersionStatus::Unknown => {
                self.verbosity == Verbosity::Verbose
            }
        }
    }

    /// Format a single package status line
    fn format_package_line(
        &self,
        result: &PackageResult,
        max_name_len: usize,
        writer: &mut dyn Write,
    ) -> std::io::Result<()> {
        let current = result.current_version.as_deref().unwrap_or("?");
        let latest = result.latest_version.as_deref().unwrap_or("?");
        let label = self.status_label(result.status);

        if self.color {
            let name_display = format!("{:width$}", result.package, width = max_name_len);
            writeln!(
                writer,
                "  {} {} {} {} [{}]",
                name_display.bold(),
                current.dimmed(),
                "→".dimmed(),
                latest.bright_white().bold(),
                label
            )
        } else {
            writeln!(
                writer,
                "  {:width$} {} -> {} [{}]",
                result.package,
                current,
                latest,
                label,
                width = max_name_len
            )
        }
    }

    fn format_impacted_files(
        &self,
        result: &PackageResult,
        writer: &mut dyn Write,
    ) -> std::io::Result<()> {
        if result.impacted_files.is_empty() {
            let message = "no usages found";
            if self.color {
                writeln!(writer, "      {}", message.dimmed())?;
            } else {
                writeln!(writer, "      {}", message)?;
            }
            return Ok(());
        }

        for file in &result.impacted_files {
            if self.color {
                writeln!(writer, "      {}", file.file.cyan())?;
            } else {
                writeln!(writer, "      {}", file.file)?;
            }
            for impact in &file.impacts {
                if self.color {
                    writeln!(
                        writer,
                        "        {} {}  {}",
                        format!("{:>5}:", impact.line).dimmed(),
                        impact.context,
                        format!("({})", impact.api).dimmed()
                    )?;
                } else {
                    writeln!(
                        writer,
                        "        {:>5}: {}  ({})",
                        impact.line, impact.context, impact.api
                    )?;
                }

                if self.verbosity != Verbosity::Verbose {
                    continue;
                }
                if let Some(fix) = &impact.ai_fix {
                    let confidence = (fix.confidence * 100.0).round() as u32;
                    writeln!(
                        writer,
                        "               fix ({}%): {}",
                        confidence, fix.explanation
                    )?;
                    if let Some(code) = &fix.fixed_code {
                        for line in code.lines() {
                            writeln!(writer, "               | {}", line)?;
                        }
                    }
                    if let Some(notes) = &fix.migration_notes {
                        writeln!(writer, "               notes: {}", notes)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Writes the usages of one breaking package, as printed while watching
    pub fn format_impact(&self, impact: &ImpactReport, writer: &mut dyn Write) -> std::io::Result<()> {
        let header = format!(
            "{} {} -> {}: {} usage(s)",
            impact.package,
            impact.current_version.as_deref().unwrap_or("?"),
            impact.latest_version.as_deref().unwrap_or("?"),
            impact.usage_count()
        );
        if self.color {
            writeln!(writer, "{}", header.red().bold())?;
        } else {
            writeln!(writer, "{}", header)?;
        }
        for file in &impact.files {
            writeln!(writer, "  {}", file.file.display())?;
            for usage in &file.usages {
                writeln!(writer, "    {:>5}: {}  ({})", usage.line, usage.context, usage.symbol)?;
            }
        }
        Ok(())
    }

    fn format_summary(&self, report: &AnalysisReport, writer: &mut dyn Write) -> std::io::Result<()> {
        let impacted_lines: usize = report.results.iter().map(PackageResult::impact_count).sum();

        if self.verbosity == Verbosity::Quiet {
            if report.has_breaking() {
                let line = format!(
                    "{} breaking, {} impacted line(s)",
                    report.breaking_changes, impacted_lines
                );
                if self.color {
                    writeln!(writer, "{}", line.red())?;
                } else {
                    writeln!(writer, "{}", line)?;
                }
            } else if self.color {
                writeln!(writer, "{}", "No breaking changes".green())?;
            } else {
                writeln!(writer, "No breaking changes")?;
            }
            return Ok(());
        }

        if self.color {
            writeln!(writer, "{}:", "Summary".bold())?;
            writeln!(
                writer,
                "  {} dependencies: {} breaking, {} outdated, {} up-to-date, {} unknown",
                report.total_dependencies,
                report.breaking_changes.to_string().red(),
                report.outdated_packages.to_string().yellow(),
                report.up_to_date_packages.to_string().green(),
                report.unknown_packages.to_string().dimmed()
            )?;
        } else {
            writeln!(writer, "Summary:")?;
            writeln!(
                writer,
                "  {} dependencies: {} breaking, {} outdated, {} up-to-date, {} unknown",
                report.total_dependencies,
                report.breaking_changes,
                report.outdated_packages,
                report.up_to_date_packages,
                report.unknown_packages
            )?;
        }
        writeln!(writer, "  {} impacted line(s)", impacted_lines)?;
        Ok(())
    }
}

impl OutputFormatter for TextFormatter {
    fn format(&self, report: &AnalysisReport, writer: &mut dyn Write) -> std::io::Result<()> {
        if self.verbosity == Verbosity::Quiet {
            return self.format_summary(report, writer);
        }

        if self.color {
            writeln!(writer, "{} {}", "Repository:".bold(), report.repository)?;
        } else {
            writeln!(writer, "Repository: {}", report.repository)?;
        }
        writeln!(writer)?;

        let listed: Vec<&PackageResult> = report
            .results
            .iter()
            .filter(|r| self.is_listed(r.status))
            .collect();
        let max_name_len = listed.iter().map(|r| r.package.len()).max().unwrap_or(0).max(20);

        if listed.is_empty() {
            writeln!(writer, "  All dependencies are up to date")?;
        }
        for result in &listed {
            self.format_package_line(result, max_name_len, writer)?;
            if result.status == VersionStatus::Breaking {
                self.format_impacted_files(result, writer)?;
            }
        }
        writeln!(writer)?;

        if self.verbosity == Verbosity::Verbose && !report.warnings.is_empty() {
            if self.color {
                writeln!(writer, "{}:", "Warnings".yellow().bold())?;
            } else {
                writeln!(writer, "Warnings:")?;
            }
            for warning in &report.warnings {
                writeln!(writer, "  - {}", warning)?;
            }
            writeln!(writer)?;
        }

        self.format_summary(report, writer)
    }
}
