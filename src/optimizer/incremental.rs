//! # Incremental Updater
//!
//! "update" mode, driven by an external watcher that reports one changed
//! path at a time. The path may name a created, modified or deleted file.
//!
//! A deleted source shows up as a failed transcode; its stale artifacts are
//! then removed from the mirrored output directory. Sources sharing a stem
//! (`a.jpg`, `a.png`) share one WebP path; it is written by the first by
//! extension and survives the deletion of the others.

use crate::{
    codec::ImageCodec,
    config::Config,
    error::Result,
    file_manager::FileManager,
    format,
    optimizer::{path_resolver::PathResolver, progress_tracker::ProgressTracker, RunOptions},
    transcoder::{TranscodeOutcome, Transcoder},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What an update did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Not a format the pipeline handles; nothing was touched
    Ignored,
    /// Artifacts were (re)written
    Updated(TranscodeOutcome),
    /// Transcode failed and nothing was removed
    Failed(TranscodeOutcome),
    /// Source is gone; `removed` lists the deleted artifacts
    Removed {
        outcome: TranscodeOutcome,
        removed: Vec<PathBuf>,
    },
}

/// Brings the output tree in line with one changed source path
pub struct IncrementalUpdater {
    config: Config,
    transcoder: Transcoder,
    options: RunOptions,
}

impl IncrementalUpdater {
    pub fn new(config: Config, codec: Arc<dyn ImageCodec>, options: RunOptions) -> Self {
        let transcoder = Transcoder::new(codec, config.quality);
        Self {
            config,
            transcoder,
            options,
        }
    }

    pub async fn run(&self, changed: &Path) -> Result<UpdateOutcome> {
        let input = self.config.require_input()?;

        if !format::classify(changed).is_supported() {
            debug!("Ignoring change to {}", changed.display());
            return Ok(UpdateOutcome::Ignored);
        }

        let relative = PathResolver::relative_to_root(changed, input).await?;
        let relative_dir = relative.parent().unwrap_or_else(|| Path::new(""));
        let output_dir = PathResolver::mirror_dir(&self.config.output, relative_dir);

        let source_exists = match tokio::fs::try_exists(changed).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!("Could not check whether {} exists: {}", changed.display(), e);
                true
            }
        };
        // No mirror directory for a source that is already gone
        if source_exists {
            FileManager::ensure_dir(&output_dir).await?;
        }

        let siblings = if Transcoder::wants_webp_variant(changed) {
            Self::webp_siblings(changed).await
        } else {
            Vec::new()
        };
        let shadowed_by = Self::shared_webp_owner(changed, &siblings).filter(|owner| owner != changed);

        let tracker = ProgressTracker::new(self.options.output_mode, 1, false);
        let emit_webp = self.options.emit_webp && shadowed_by.is_none();
        let mut outcome = self.transcoder.transcode(changed, &output_dir, emit_webp).await;
        if let (true, Some(owner)) = (self.options.emit_webp, &shadowed_by) {
            outcome.shadow_webp(owner);
        }
        tracker.file_complete(&relative, &outcome);

        if !outcome.is_failure() {
            return Ok(UpdateOutcome::Updated(outcome));
        }
        if source_exists {
            warn!(
                "{} could not be transcoded, keeping previous artifacts",
                changed.display()
            );
            return Ok(UpdateOutcome::Failed(outcome));
        }

        let owned_webp = shadowed_by.is_none();
        let removed = Self::remove_stale(changed, &output_dir, siblings.is_empty()).await;
        if removed.is_empty() {
            return Ok(UpdateOutcome::Failed(outcome));
        }
        for path in &removed {
            let shown = path.strip_prefix(&self.config.output).unwrap_or(path);
            tracker.removed(shown);
        }

        // The shared variant was made from the deleted source; rebuild it from
        // the sibling that now owns it
        if owned_webp && self.options.emit_webp {
            if let Some(next) = Transcoder::webp_owner(siblings.iter().map(PathBuf::as_path)) {
                info!("Rebuilding WebP variant from {}", next.display());
                let rebuilt = self.transcoder.transcode(next, &output_dir, true).await;
                let next_relative = relative.with_file_name(next.file_name().unwrap_or_default());
                tracker.file_complete(&next_relative, &rebuilt);
            }
        }

        Ok(UpdateOutcome::Removed { outcome, removed })
    }

    /// Existing sources next to `source` whose WebP variant lands on the same path
    async fn webp_siblings(source: &Path) -> Vec<PathBuf> {
        let dir = match source.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let target = Transcoder::webp_path(source, Path::new(""));

        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Cannot list {} for WebP siblings: {}", dir.display(), e);
                return Vec::new();
            }
        };

        let mut siblings = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.file_name() == source.file_name()
                || !Transcoder::wants_webp_variant(&path)
                || Transcoder::webp_path(&path, Path::new("")) != target
            {
                continue;
            }
            if tokio::fs::metadata(&path).await.is_ok_and(|m| m.is_file()) {
                siblings.push(path);
            }
        }
        siblings
    }

    /// Owner of the WebP path shared by `source` and `siblings`, `None` when
    /// nothing is shared
    fn shared_webp_owner(source: &Path, siblings: &[PathBuf]) -> Option<PathBuf> {
        if siblings.is_empty() {
            return None;
        }
        let candidates = siblings
            .iter()
            .map(PathBuf::as_path)
            .chain(std::iter::once(source));
        Transcoder::webp_owner(candidates).map(Path::to_path_buf)
    }

    /// Delete the primary artifact of a vanished source and, if it was there
    /// and `remove_webp` is set, its WebP variant. Returns the paths actually
    /// deleted.
    async fn remove_stale(source: &Path, output_dir: &Path, remove_webp: bool) -> Vec<PathBuf> {
        let mut removed = Vec::new();

        let primary = Transcoder::primary_path(source, output_dir);
        match tokio::fs::remove_file(&primary).await {
            Ok(()) => removed.push(primary),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return removed,
            Err(e) => {
                warn!("Failed to remove stale {}: {}", primary.display(), e);
                return removed;
            }
        }

        if remove_webp {
            let webp = Transcoder::webp_path(source, output_dir);
            match tokio::fs::remove_file(&webp).await {
                Ok(()) => removed.push(webp),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove stale {}: {}", webp.display(), e),
            }
        }

        info!("Removed {} stale artifacts for {}", removed.len(), source.display());
        removed
    }
}
