//! Per-image progress reporting
//!
//! Interactive terminals get an `indicatif` bar on stderr. In CI
//! (`CI=true` or `GITHUB_ACTIONS=true`) the bar is replaced by plain
//! `[n/total]` log lines so the job log stays readable.

use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

const TEMPLATE: &str = "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}";

/// Whether the process runs inside a CI job.
pub fn in_ci() -> bool {
    ["CI", "GITHUB_ACTIONS"]
        .iter()
        .any(|var| std::env::var(var).is_ok_and(|v| v == "true"))
}

/// Progress over the images of one manifest.
pub struct Progress {
    bar: Option<ProgressBar>,
    total: usize,
    verb: &'static str,
    log_lines: bool,
}

impl Progress {
    /// Progress bar when interactive, log lines in CI.
    pub fn for_terminal(total: usize, verb: &'static str) -> Self {
        if in_ci() {
            return Self {
                bar: None,
                total,
                verb,
                log_lines: true,
            };
        }
        let style = ProgressStyle::with_template(TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        let bar = ProgressBar::new(total as u64);
        bar.set_style(style);
        Self {
            bar: Some(bar),
            total,
            verb,
            log_lines: false,
        }
    }

    /// No bar and no log lines.
    pub fn hidden(total: usize, verb: &'static str) -> Self {
        Self {
            bar: None,
            total,
            verb,
            log_lines: false,
        }
    }

    /// Marks the start of work on image `index` (1-based).
    pub fn start(&self, index: usize, key: &str) {
        if let Some(ref bar) = self.bar {
            bar.set_message(format!("{} {key}...", self.verb));
        } else if self.log_lines {
            info!("[{index}/{}] {} {key}...", self.total, self.verb);
        }
    }

    /// Marks the current image as done with a one-line result.
    pub fn finish_item(&self, line: &str) {
        if let Some(ref bar) = self.bar {
            bar.inc(1);
        } else if self.log_lines {
            info!("  {line}");
        }
    }

    /// Removes the bar from the terminal.
    pub fn finish(&self) {
        if let Some(ref bar) = self.bar {
            bar.finish_and_clear();
        }
    }
}
