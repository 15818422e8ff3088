//! # Optimizer Module
//!
//! Orchestration of the two run modes:
//! - `batch`: every file under the input root ("all")
//! - `incremental`: one changed file, called by an external watcher
//! - `progress_tracker`: reporting of outcomes
//! - `path_resolver`: mirrored output paths

pub mod batch;
pub mod incremental;
pub mod path_resolver;
pub mod progress_tracker;

pub use batch::BatchOrchestrator;
pub use incremental::{IncrementalUpdater, UpdateOutcome};
pub use path_resolver::PathResolver;
pub use progress_tracker::{OutputMode, ProgressTracker};

/// Knobs shared by both run modes that are not part of `Config`
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Produce WebP variants (still suppressed per file by the `no-webp` marker)
    pub emit_webp: bool,
    pub output_mode: OutputMode,
    /// Draw a progress bar during batch runs
    pub show_progress: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            emit_webp: true,
            output_mode: OutputMode::Log,
            show_progress: false,
        }
    }
}
