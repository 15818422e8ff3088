//! # Progress Tracking Module
//!
//! Single place where per-file results reach the operator: a log line (or a
//! JSON event) for every outcome, plus the batch progress bar.

use crate::{
    config::Config,
    file_manager::FileManager,
    json_output::JsonMessage,
    progress::{ProgressManager, RunSummary},
    transcoder::{PrimaryResult, TranscodeOutcome, WebpResult},
};
use std::path::Path;
use tracing::{error, info, warn};

/// How results are reported
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable log lines through `tracing`
    #[default]
    Log,
    /// One JSON object per line on stdout
    Json,
}

/// Reports outcomes as they complete
#[derive(Clone)]
pub struct ProgressTracker {
    mode: OutputMode,
    bar: ProgressManager,
}

impl ProgressTracker {
    /// Tracker for `total_files` files. The bar is only drawn in log mode
    /// when `show_bar` is set.
    pub fn new(mode: OutputMode, total_files: usize, show_bar: bool) -> Self {
        let bar = if show_bar && mode == OutputMode::Log && total_files > 0 {
            ProgressManager::new(total_files as u64)
        } else {
            ProgressManager::hidden()
        };
        Self { mode, bar }
    }

    pub fn start(&self, run_mode: &str, config: &Config, total_files: usize) {
        match self.mode {
            OutputMode::Json => JsonMessage::start(
                run_mode,
                &config.input,
                &config.output,
                total_files,
                config.quality,
            )
            .emit(),
            OutputMode::Log => {
                info!(
                    "Processing {} files: {} -> {}",
                    total_files,
                    config.input.display(),
                    config.output.display()
                );
                info!(
                    "Quality: jpg {} | png {} | gif {} | webp {}",
                    config.quality.jpg, config.quality.png, config.quality.gif, config.quality.webp
                );
            }
        }
    }

    /// Report one finished file, `relative` being its path under the input root
    pub fn file_complete(&self, relative: &Path, outcome: &TranscodeOutcome) {
        self.bar.update(&relative.display().to_string());

        if self.mode == OutputMode::Json {
            JsonMessage::file_complete(relative, outcome).emit();
            return;
        }

        self.bar.suspend(|| Self::log_outcome(relative, outcome));
    }

    fn log_outcome(relative: &Path, outcome: &TranscodeOutcome) {
        match &outcome.primary {
            PrimaryResult::Success { size_bytes } => match &outcome.webp {
                WebpResult::Success { size_bytes: webp_size } => info!(
                    "[OK] {} ({}, webp {})",
                    relative.display(),
                    FileManager::format_size(*size_bytes),
                    FileManager::format_size(*webp_size)
                ),
                WebpResult::Failure { error } => warn!(
                    "[OK] {} ({}), webp failed: {}",
                    relative.display(),
                    FileManager::format_size(*size_bytes),
                    error
                ),
                WebpResult::NotAttempted => info!(
                    "[OK] {} ({})",
                    relative.display(),
                    FileManager::format_size(*size_bytes)
                ),
            },
            PrimaryResult::Skipped { reason } => {
                warn!("[SKIP] {}: {}", relative.display(), reason)
            }
            PrimaryResult::Failure { error } => {
                error!("[FAIL] {}: {}", relative.display(), error)
            }
        }
    }

    /// Report a stale artifact that was deleted, relative to the output root
    pub fn removed(&self, relative: &Path) {
        match self.mode {
            OutputMode::Json => JsonMessage::removed(relative).emit(),
            OutputMode::Log => info!("[DEL] {}", relative.display()),
        }
    }

    pub fn finish(&self, summary: &RunSummary, duration_seconds: f64) {
        self.bar.finish(&summary.format_summary());
        match self.mode {
            OutputMode::Json => JsonMessage::complete(summary, duration_seconds).emit(),
            OutputMode::Log => {
                info!("=== Run Complete ({:.2}s) ===", duration_seconds);
                info!("{}", summary.format_summary());
            }
        }
    }
}
