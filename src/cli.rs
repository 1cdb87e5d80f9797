//! CLI argument parsing module for depimpact

use crate::config::{parse_duration, Overrides};
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::time::Duration;

fn parse_interval(s: &str) -> Result<Duration, String> {
    parse_duration(s).map_err(|e| e.to_string())
}

/// Breaking-upgrade impact analyzer for Python repositories
#[derive(Parser, Debug, Clone)]
#[command(
    name = "depimpact",
    version,
    about = "Find breaking dependency upgrades and the source lines they affect"
)]
pub struct CliArgs {
    /// Repository directory (default: current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,

    // General options
    /// Enable verbose output
    #[arg(long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Enable quiet mode - minimal output
    #[arg(short, long)]
    pub quiet: bool,

    /// Config file (default: depimpact.toml in the repository, if present)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    // Output options
    /// Output the report in JSON format
    #[arg(long)]
    pub json: bool,

    /// Write the report to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    // Scan options
    /// Skip directories with this name (can be specified multiple times)
    #[arg(long = "exclude-dir", value_name = "NAME", action = ArgAction::Append)]
    pub exclude_dirs: Vec<String>,

    /// Analyze only specific packages (can be specified multiple times)
    #[arg(long, value_name = "PACKAGE", action = ArgAction::Append)]
    pub only: Vec<String>,

    // Registry options
    /// PyPI-compatible JSON API base URL
    #[arg(long, value_name = "URL")]
    pub registry_url: Option<String>,

    /// Maximum concurrent registry requests
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,

    // Fix suggestions
    /// Ask the configured chat-completions endpoint for migration suggestions
    #[arg(long)]
    pub ai: bool,

    // Watch mode
    /// Keep polling the registry and stream change events as JSON lines
    #[arg(long, conflicts_with = "output")]
    pub watch: bool,

    /// Poll interval in watch mode (e.g. 30s, 5m, 1h; minimum 5s)
    #[arg(long, value_parser = parse_interval, requires = "watch")]
    pub interval: Option<Duration>,

    /// Exit with status 2 when breaking changes are found
    #[arg(long)]
    pub fail_on_breaking: bool,
}

impl CliArgs {
    /// Command-line values that override the config file
    pub fn overrides(&self) -> Overrides {
        Overrides {
            exclude_dirs: self.exclude_dirs.clone(),
            poll_interval: self.interval,
            concurrency: self.concurrency,
            registry_url: self.registry_url.clone(),
        }
    }

    /// Check if a package should be analyzed based on `--only`
    pub fn should_process_package(&self, name: &str) -> bool {
        let name = crate::domain::normalize_package_name(name);
        self.only.is_empty()
            || self
                .only
                .iter()
                .any(|p| crate::domain::normalize_package_name(p) == name)
    }
}
