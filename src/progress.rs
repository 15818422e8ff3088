//! # Progress Tracking and Statistics Module
//!
//! - `ProgressManager`: `indicatif` bar for batch runs
//! - `RunSummary`: counts aggregated from every `TranscodeOutcome`
//!
//! ## Visual feedback:
//! ```text
//! ⠋ [00:00:04] [========================>---------------] 96/150 (64%) sub/c.gif
//! ```

use crate::file_manager::FileManager;
use crate::transcoder::{PrimaryResult, TranscodeOutcome};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::time::Duration;

/// Manages the progress bar of a batch run
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
}

impl ProgressManager {
    /// Create a new progress manager
    pub fn new(total_files: u64) -> Self {
        let bar = ProgressBar::new(total_files);

        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
        {
            bar.set_style(style.progress_chars("=>-"));
        }

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// A bar that never draws
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    /// Advance by one file and show its name
    pub fn update(&self, message: &str) {
        self.bar.inc(1);
        self.bar.set_message(message.to_string());
    }

    /// Run `f` with the bar cleared, so log lines do not tear it
    pub fn suspend<F: FnOnce()>(&self, f: F) {
        self.bar.suspend(f);
    }

    /// Finish with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

/// Aggregate of one run, built at the orchestrator boundary
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub files_processed: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Files whose primary artifact succeeded but whose WebP variant failed
    pub webp_failed: usize,
    pub bytes_written: u64,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, outcome: &TranscodeOutcome) {
        self.files_processed += 1;
        match outcome.primary {
            PrimaryResult::Success { .. } => self.succeeded += 1,
            PrimaryResult::Skipped { .. } => self.skipped += 1,
            PrimaryResult::Failure { .. } => self.failed += 1,
        }
        if outcome.webp_failed() {
            self.webp_failed += 1;
        }
        self.bytes_written += outcome.bytes_written();
    }

    pub fn format_summary(&self) -> String {
        format!(
            "Processed: {} files | Succeeded: {} | Skipped: {} | Failed: {} | WebP failures: {} | Written: {}",
            self.files_processed,
            self.succeeded,
            self.skipped,
            self.failed,
            self.webp_failed,
            FileManager::format_size(self.bytes_written),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcoder::WebpResult;

    fn outcome(primary: PrimaryResult, webp: WebpResult) -> TranscodeOutcome {
        TranscodeOutcome {
            file_name: "f.png".to_string(),
            source_format: "png".to_string(),
            primary,
            webp,
        }
    }

    #[test]
    fn test_summary_counts() {
        let mut summary = RunSummary::new();
        summary.record(&outcome(
            PrimaryResult::Success { size_bytes: 100 },
            WebpResult::Success { size_bytes: 50 },
        ));
        summary.record(&outcome(
            PrimaryResult::Success { size_bytes: 10 },
            WebpResult::Failure { error: "boom".to_string() },
        ));
        summary.record(&outcome(
            PrimaryResult::Skipped { reason: "unsupported format".to_string() },
            WebpResult::NotAttempted,
        ));
        summary.record(&outcome(
            PrimaryResult::Failure { error: "corrupt".to_string() },
            WebpResult::NotAttempted,
        ));

        assert_eq!(
            summary,
            RunSummary {
                files_processed: 4,
                succeeded: 2,
                skipped: 1,
                failed: 1,
                webp_failed: 1,
                bytes_written: 160,
            }
        );
        assert!(summary.format_summary().contains("Failed: 1"));
    }
}
