//! # Transcoder
//!
//! Produces the artifacts for one source file and describes what happened in
//! a `TranscodeOutcome`. Never fails as a whole: every error becomes part of
//! the outcome so a batch keeps going.
//!
//! ## Artifacts for `photo.jpg` written to `out/`:
//! ```text
//! out/photo.jpg          primary, re-encoded JPEG
//! out/webp/photo.webp    secondary, unless suppressed
//! ```
//!
//! ## Rules:
//! - svg: copied byte for byte, no WebP variant
//! - jpg/jpeg/png/gif: re-encoded in their own format at the channel quality
//! - anything else: skipped ("unsupported format"), not an error
//! - a file name containing `no-webp` never gets a WebP variant
//! - the `webp/` directory is only created right before a WebP write
//! - a failed WebP encode leaves the primary result untouched
//! - a failed primary encode stops there, no WebP is attempted
//!
//! The output directory itself must already exist; orchestrators create it.

use crate::codec::ImageCodec;
use crate::config::Quality;
use crate::error::{PipelineError, Result};
use crate::file_manager::FileManager;
use crate::format::{self, FormatPolicy, TargetFormat};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// File names containing this marker never get a WebP variant
pub const NO_WEBP_MARKER: &str = "no-webp";
/// Subdirectory holding WebP variants, next to the primary artifacts
pub const WEBP_DIR: &str = "webp";
/// Reason recorded for files that are not images the pipeline handles
pub const UNSUPPORTED_REASON: &str = "unsupported format";

/// Result of producing the primary artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PrimaryResult {
    Success { size_bytes: u64 },
    Failure { error: String },
    Skipped { reason: String },
}

/// Result of producing the WebP artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WebpResult {
    Success { size_bytes: u64 },
    Failure { error: String },
    NotAttempted,
}

/// What happened to one source file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscodeOutcome {
    pub file_name: String,
    /// Lower-cased extension of the source
    pub source_format: String,
    pub primary: PrimaryResult,
    pub webp: WebpResult,
}

impl TranscodeOutcome {
    /// Outcome for a file that could not even be handed to the transcoder
    pub fn failed(input: &Path, error: &PipelineError) -> Self {
        Self {
            file_name: input
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            source_format: format::extension(input),
            primary: PrimaryResult::Failure {
                error: error.to_string(),
            },
            webp: WebpResult::NotAttempted,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.primary, PrimaryResult::Success { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.primary, PrimaryResult::Skipped { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.primary, PrimaryResult::Failure { .. })
    }

    /// Record that the WebP variant belongs to `owner`, a sibling with the
    /// same stem. No-op unless the primary succeeded.
    pub fn shadow_webp(&mut self, owner: &Path) {
        if self.is_success() {
            let owner = owner.file_name().unwrap_or_default().to_string_lossy();
            self.webp = WebpResult::Failure {
                error: format!("WebP variant already produced from {}", owner),
            };
        }
    }

    pub fn webp_failed(&self) -> bool {
        matches!(self.webp, WebpResult::Failure { .. })
    }

    /// Total bytes written for this file across both artifacts
    pub fn bytes_written(&self) -> u64 {
        let primary = match self.primary {
            PrimaryResult::Success { size_bytes } => size_bytes,
            _ => 0,
        };
        let webp = match self.webp {
            WebpResult::Success { size_bytes } => size_bytes,
            _ => 0,
        };
        primary + webp
    }
}

/// Encodes source files into primary and WebP artifacts
#[derive(Clone)]
pub struct Transcoder {
    codec: Arc<dyn ImageCodec>,
    quality: Quality,
}

impl Transcoder {
    pub fn new(codec: Arc<dyn ImageCodec>, quality: Quality) -> Self {
        Self { codec, quality }
    }

    /// Where the primary artifact for `input` goes inside `output_dir`
    pub fn primary_path(input: &Path, output_dir: &Path) -> PathBuf {
        output_dir.join(input.file_name().unwrap_or_default())
    }

    /// Where the WebP artifact for `input` goes inside `output_dir`
    pub fn webp_path(input: &Path, output_dir: &Path) -> PathBuf {
        let file_name = Path::new(input.file_name().unwrap_or_default());
        output_dir.join(WEBP_DIR).join(file_name.with_extension("webp"))
    }

    /// False for file names carrying the `no-webp` marker
    pub fn wants_webp(input: &Path) -> bool {
        !input
            .file_name()
            .map(|name| name.to_string_lossy().contains(NO_WEBP_MARKER))
            .unwrap_or(false)
    }

    /// True for sources that get a WebP variant
    pub fn wants_webp_variant(input: &Path) -> bool {
        matches!(format::classify(input), FormatPolicy::Transcode(_)) && Self::wants_webp(input)
    }

    /// Of several sources sharing a stem (and so a WebP path), the one that
    /// writes it: lowest extension first, then file name
    pub fn webp_owner<'a>(candidates: impl IntoIterator<Item = &'a Path>) -> Option<&'a Path> {
        candidates
            .into_iter()
            .min_by_key(|path| (format::extension(path), path.file_name().map(|name| name.to_os_string())))
    }

    /// Produce the artifacts for `input` inside `output_dir`
    pub async fn transcode(&self, input: &Path, output_dir: &Path, emit_webp: bool) -> TranscodeOutcome {
        let file_name = input
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let source_format = format::extension(input);

        let (primary, webp) = match format::classify(input) {
            FormatPolicy::Unsupported => {
                debug!("Skipping {}: {}", file_name, UNSUPPORTED_REASON);
                (
                    PrimaryResult::Skipped {
                        reason: UNSUPPORTED_REASON.to_string(),
                    },
                    WebpResult::NotAttempted,
                )
            }
            FormatPolicy::Copy => {
                let primary = match self.copy(input, output_dir).await {
                    Ok(size_bytes) => PrimaryResult::Success { size_bytes },
                    Err(e) => PrimaryResult::Failure { error: e.to_string() },
                };
                (primary, WebpResult::NotAttempted)
            }
            FormatPolicy::Transcode(source) => {
                let primary_output = Self::primary_path(input, output_dir);
                match self.encode(input, primary_output, source.into()).await {
                    Err(e) => (PrimaryResult::Failure { error: e.to_string() }, WebpResult::NotAttempted),
                    Ok(size_bytes) => {
                        let webp = if emit_webp && Self::wants_webp(input) {
                            self.encode_webp(input, output_dir).await
                        } else {
                            WebpResult::NotAttempted
                        };
                        (PrimaryResult::Success { size_bytes }, webp)
                    }
                }
            }
        };

        TranscodeOutcome {
            file_name,
            source_format,
            primary,
            webp,
        }
    }

    async fn copy(&self, input: &Path, output_dir: &Path) -> Result<u64> {
        let input = input.to_path_buf();
        let output = Self::primary_path(&input, output_dir);
        tokio::task::spawn_blocking(move || FileManager::copy_atomic(&input, &output))
            .await
            .map_err(|e| PipelineError::Worker(e.to_string()))?
    }

    async fn encode_webp(&self, input: &Path, output_dir: &Path) -> WebpResult {
        let output = Self::webp_path(input, output_dir);
        let result = match output.parent() {
            Some(webp_dir) => FileManager::ensure_dir(webp_dir).await,
            None => Ok(()),
        };
        let result = match result {
            Ok(()) => self.encode(input, output, TargetFormat::WebP).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(size_bytes) => WebpResult::Success { size_bytes },
            Err(e) => {
                warn!("WebP conversion failed for {}: {}", input.display(), e);
                WebpResult::Failure { error: e.to_string() }
            }
        }
    }

    /// Runs the codec on the blocking pool
    async fn encode(&self, input: &Path, output: PathBuf, target: TargetFormat) -> Result<u64> {
        let codec = Arc::clone(&self.codec);
        let input = input.to_path_buf();
        let quality = self.quality.for_format(target);
        debug!("Encoding {} -> {} ({} q{})", input.display(), output.display(), target, quality);

        tokio::task::spawn_blocking(move || codec.encode(&input, &output, target, quality))
            .await
            .map_err(|e| PipelineError::Worker(e.to_string()))?
    }
}
