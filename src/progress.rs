//! Progress display for the analysis pipeline
//!
//! Provides visual feedback on stderr using indicatif. Disabled in quiet
//! and JSON modes so stdout stays machine-readable.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

const SPINNER_TEMPLATE: &str = "{spinner:.cyan} {prefix:.dim} {msg}";
const BAR_TEMPLATE: &str = "{spinner:.cyan} {prefix:.dim} {msg} [{bar:30.cyan/blue}] {pos}/{len}";

/// Progress reporter for the pipeline
pub struct Progress {
    /// Whether progress display is enabled
    enabled: bool,
    /// Current spinner or bar
    bar: Option<ProgressBar>,
}

impl Progress {
    /// Create a new progress reporter
    pub fn new(enabled: bool) -> Self {
        Self { enabled, bar: None }
    }

    fn replace(&mut self, bar: ProgressBar) {
        if let Some(previous) = self.bar.replace(bar) {
            previous.finish_and_clear();
        }
    }

    /// Show a spinner for pipeline step `step` of `total`
    pub fn step(&mut self, step: usize, total: usize, message: &str) {
        if !self.enabled {
            return;
        }

        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template(SPINNER_TEMPLATE)
        {
            spinner.set_style(style);
        }
        spinner.set_prefix(format!("[{}/{}]", step, total));
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(80));
        self.replace(spinner);
    }

    /// Turn the current step into a bar over `total` items
    pub fn start(&mut self, total: u64, message: &str) {
        if !self.enabled {
            return;
        }

        let prefix = self.bar.as_ref().map(|b| b.prefix()).unwrap_or_default();
        let bar = ProgressBar::new(total);
        if let Ok(style) = ProgressStyle::default_bar().template(BAR_TEMPLATE) {
            bar.set_style(style.progress_chars("█▓▒░"));
        }
        bar.set_prefix(prefix);
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));
        self.replace(bar);
    }

    #[cfg(test)]
    fn position(&self) -> Option<u64> {
        self.bar.as_ref().map(ProgressBar::position)
    }

    /// Increment progress by one
    pub fn inc(&self) {
        if let Some(ref bar) = self.bar {
            bar.inc(1);
        }
    }

    /// Finish and clear the current progress display
    pub fn finish_and_clear(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Drop for Progress {
    fn drop(&mut self) {
        self.finish_and_clear();
    }
}
