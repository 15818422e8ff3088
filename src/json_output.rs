//! # JSON Output Module
//!
//! With `--json`, progress is reported as one JSON object per line on stdout
//! so other tools can follow a run. Logs move to stderr in that mode.
//!
//! ## Message types:
//! - `start`: run begins (mode, roots, file count, quality)
//! - `file_complete`: one file handled, with both artifact results
//! - `removed`: a stale artifact was deleted (update mode)
//! - `complete`: batch finished, with the run summary
//! - `error`: the run could not start or finish

use crate::config::Quality;
use crate::progress::RunSummary;
use crate::transcoder::{PrimaryResult, TranscodeOutcome, WebpResult};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Message emitted on stdout
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JsonMessage {
    Start {
        mode: String,
        input: PathBuf,
        output: PathBuf,
        total_files: usize,
        quality: Quality,
    },

    FileComplete {
        path: PathBuf,
        source_format: String,
        primary: PrimaryResult,
        webp: WebpResult,
    },

    Removed {
        path: PathBuf,
    },

    Complete {
        #[serde(flatten)]
        summary: RunSummary,
        duration_seconds: f64,
    },

    Error {
        message: String,
    },
}

impl JsonMessage {
    /// Print the message as a single line on stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }

    pub fn start(mode: &str, input: &Path, output: &Path, total_files: usize, quality: Quality) -> Self {
        Self::Start {
            mode: mode.to_string(),
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            total_files,
            quality,
        }
    }

    pub fn file_complete(relative: &Path, outcome: &TranscodeOutcome) -> Self {
        Self::FileComplete {
            path: relative.to_path_buf(),
            source_format: outcome.source_format.clone(),
            primary: outcome.primary.clone(),
            webp: outcome.webp.clone(),
        }
    }

    pub fn removed(path: &Path) -> Self {
        Self::Removed {
            path: path.to_path_buf(),
        }
    }

    pub fn complete(summary: &RunSummary, duration_seconds: f64) -> Self {
        Self::Complete {
            summary: summary.clone(),
            duration_seconds,
        }
    }

    pub fn error(message: String) -> Self {
        Self::Error { message }
    }
}
