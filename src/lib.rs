//! # assetpress
//!
//! Publishes a tree of static images into a mirrored output tree, re-encoding
//! every JPEG, PNG and GIF at a configurable quality and adding a WebP variant
//! next to it.
//!
//! ## Modules:
//! - `config` / `schema`: `.assetpressrc` loading, validation and CLI overrides
//! - `error`: the crate-wide `PipelineError`
//! - `format`: extension classification
//! - `file_manager`: directory harvest and atomic writes
//! - `codec`: the `ImageCodec` seam and its `image`-backed implementation
//! - `transcoder`: artifacts for a single file
//! - `optimizer`: batch ("all") and incremental ("update") runs
//! - `progress` / `json_output`: reporting
//!
//! ## Usage:
//! ```no_run
//! use assetpress::{BatchOrchestrator, CliOverrides, ConfigResolver, NativeCodec, RunOptions};
//! use std::sync::Arc;
//!
//! # async fn run() -> assetpress::error::Result<()> {
//! let config = ConfigResolver::new().resolve(&CliOverrides::default()).await;
//! let summary = BatchOrchestrator::new(config, Arc::new(NativeCodec::detect()), RunOptions::default())
//!     .run()
//!     .await?;
//! println!("{}", summary.format_summary());
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod file_manager;
pub mod format;
pub mod json_output;
pub mod optimizer;
pub mod progress;
pub mod schema;
pub mod transcoder;

pub use codec::{ImageCodec, NativeCodec};
pub use config::{CliOverrides, Config, ConfigResolver, SchemaSource};
pub use error::PipelineError;
pub use optimizer::{BatchOrchestrator, IncrementalUpdater, OutputMode, RunOptions, UpdateOutcome};
pub use progress::RunSummary;
pub use transcoder::{TranscodeOutcome, Transcoder};
