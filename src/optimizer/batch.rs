//! # Batch Orchestrator
//!
//! "all" mode: harvest the whole input tree, transcode every file into the
//! mirrored output tree, wait for every task, summarise.
//!
//! Skipped and failed files are reported and counted but do not fail the
//! run. The run fails only when it cannot start (no input configured, input
//! missing or unreadable, output root cannot be created) or when a task
//! panicked.

use crate::{
    codec::ImageCodec,
    config::Config,
    error::{PipelineError, Result},
    file_manager::{DiscoveredFile, FileManager},
    optimizer::{path_resolver::PathResolver, progress_tracker::ProgressTracker, RunOptions},
    progress::RunSummary,
    transcoder::{TranscodeOutcome, Transcoder},
};
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Runs the pipeline over a whole input tree
pub struct BatchOrchestrator {
    config: Config,
    transcoder: Transcoder,
    options: RunOptions,
}

impl BatchOrchestrator {
    pub fn new(config: Config, codec: Arc<dyn ImageCodec>, options: RunOptions) -> Self {
        let transcoder = Transcoder::new(codec, config.quality);
        Self {
            config,
            transcoder,
            options,
        }
    }

    /// Process every file under `config.input`
    pub async fn run(&self) -> Result<RunSummary> {
        let start_time = Instant::now();

        let input = self.config.require_input()?;
        Self::check_input_root(input).await?;
        FileManager::ensure_dir(&self.config.output).await?;

        let harvest = FileManager::harvest(input).await;
        if !harvest.unreadable.is_empty() {
            warn!(
                "{} directories could not be read and were skipped",
                harvest.unreadable.len()
            );
        }

        let tracker = ProgressTracker::new(
            self.options.output_mode,
            harvest.files.len(),
            self.options.show_progress,
        );
        tracker.start("all", &self.config, harvest.files.len());

        let shadowed = if self.options.emit_webp {
            Self::shadowed_webp(&harvest.files)
        } else {
            HashMap::new()
        };

        let mut tasks = FuturesUnordered::new();
        for file in harvest.files {
            let transcoder = self.transcoder.clone();
            let output_dir = PathResolver::mirror_dir(&self.config.output, file.relative_dir());
            let owner = shadowed.get(&file.path).cloned();
            let emit_webp = self.options.emit_webp && owner.is_none();

            tasks.push(tokio::spawn(async move {
                let mut outcome = match FileManager::ensure_dir(&output_dir).await {
                    Ok(()) => transcoder.transcode(&file.path, &output_dir, emit_webp).await,
                    Err(e) => TranscodeOutcome::failed(&file.path, &e),
                };
                if let Some(owner) = owner {
                    outcome.shadow_webp(&owner);
                }
                (file, outcome)
            }));
        }

        let mut summary = RunSummary::new();
        let mut panicked = 0;
        while let Some(joined) = tasks.next().await {
            match joined {
                Ok((file, outcome)) => {
                    tracker.file_complete(&file.relative, &outcome);
                    summary.record(&outcome);
                }
                Err(e) => {
                    error!("Transcode task panicked: {}", e);
                    panicked += 1;
                }
            }
        }

        tracker.finish(&summary, start_time.elapsed().as_secs_f64());

        if panicked > 0 {
            return Err(PipelineError::TasksPanicked(panicked));
        }
        Ok(summary)
    }

    /// Sources whose WebP path is also claimed by a sibling with the same
    /// stem, mapped to the sibling that writes it. Keeps every output path
    /// to a single writer.
    fn shadowed_webp(files: &[DiscoveredFile]) -> HashMap<PathBuf, PathBuf> {
        let mut claims: HashMap<PathBuf, Vec<&Path>> = HashMap::new();
        for file in files.iter().filter(|f| Transcoder::wants_webp_variant(&f.path)) {
            let webp = Transcoder::webp_path(&file.relative, file.relative_dir());
            claims.entry(webp).or_default().push(&file.path);
        }

        let mut shadowed = HashMap::new();
        for (webp, sources) in claims.into_iter().filter(|(_, sources)| sources.len() > 1) {
            let Some(owner) = Transcoder::webp_owner(sources.iter().copied()) else {
                continue;
            };
            for source in sources.into_iter().filter(|source| *source != owner) {
                warn!(
                    "{} shares its WebP path {} with {}, skipping its variant",
                    source.display(),
                    webp.display(),
                    owner.display()
                );
                shadowed.insert(source.to_path_buf(), owner.to_path_buf());
            }
        }
        shadowed
    }

    /// The input root must be an existing, listable directory
    async fn check_input_root(input: &Path) -> Result<()> {
        let metadata = match tokio::fs::metadata(input).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PipelineError::InputNotFound(input.to_path_buf()));
            }
            Err(e) => return Err(PipelineError::io(input, e)),
        };
        if !metadata.is_dir() {
            return Err(PipelineError::InputNotDirectory(input.to_path_buf()));
        }
        tokio::fs::read_dir(input)
            .await
            .map_err(|e| PipelineError::io(input, e))?;

        info!("Input directory: {}", input.display());
        Ok(())
    }
}
