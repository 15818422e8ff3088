//! # Error Types Module
//!
//! Every failure the pipeline can produce is a variant of `PipelineError`.
//!
//! ## Categories:
//! - Configuration: `MissingInput` (the only fatal config error)
//! - Run start: `InputNotFound`, `InputNotDirectory`, `OutsideInputRoot`
//! - Per file: `Io`, `Image`, `Tool`, `Worker`
//! - Orchestration: `TasksPanicked`
//!
//! Per-file errors never escape the transcoder; they are turned into
//! `TranscodeOutcome` failures. Only run-start errors reach `main`, where
//! they become a non-zero exit status via `anyhow`.

use std::path::PathBuf;

/// Custom error types for the asset pipeline
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("External tool error: {0}")]
    Tool(String),

    #[error("Background task failed: {0}")]
    Worker(String),

    #[error("No input directory specified (pass one on the command line or set \"input\" in the config file)")]
    MissingInput,

    #[error("Input directory does not exist: {0}")]
    InputNotFound(PathBuf),

    #[error("Input path is not a directory: {0}")]
    InputNotDirectory(PathBuf),

    #[error("{path} is not inside the input directory {root}")]
    OutsideInputRoot { path: PathBuf, root: PathBuf },

    #[error("{0} transcode task(s) panicked")]
    TasksPanicked(usize),
}

impl PipelineError {
    /// Wraps an I/O error with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
impl PipelineError {
    /// True when the underlying cause is a missing file
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Io { source, .. } => source.kind() == std::io::ErrorKind::NotFound,
            Self::Image(image::ImageError::IoError(e)) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
