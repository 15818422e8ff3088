//! # assetpress - command line entry point
//!
//! ## Responsibilities:
//! - Parse the command line with `clap`
//! - Install the `tracing` subscriber (stderr when `--json` owns stdout)
//! - Resolve the configuration and dispatch to the batch or update run
//!
//! ## Examples:
//! ```bash
//! assetpress all src public --jpg-quality 80
//! assetpress --json update src/img/hero.png src public
//! ```

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use assetpress::{
    json_output::JsonMessage, BatchOrchestrator, CliOverrides, ConfigResolver, IncrementalUpdater,
    NativeCodec, OutputMode, RunOptions, SchemaSource, UpdateOutcome,
};

#[derive(Parser)]
#[command(name = "assetpress", version)]
#[command(about = "Re-encode a tree of static images and publish WebP variants")]
struct Cli {
    /// Config file to read instead of ./.assetpressrc
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Validate the config file against this schema instead of the bundled one
    #[arg(long, global = true, value_name = "PATH", conflicts_with = "no_schema")]
    schema: Option<PathBuf>,

    /// Merge config values field by field without schema validation
    #[arg(long, global = true)]
    no_schema: bool,

    /// Report progress as JSON lines on stdout
    #[arg(long, global = true)]
    json: bool,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Process every file under the input directory
    All {
        /// Input directory (overrides the config file)
        input: Option<PathBuf>,
        /// Output directory (overrides the config file)
        output: Option<PathBuf>,
        /// Draw a progress bar
        #[arg(long)]
        progress: bool,
        #[command(flatten)]
        encoding: EncodingArgs,
    },
    /// Process one created, modified or deleted file
    #[command(visible_alias = "watch")]
    Update {
        /// The path that changed
        changed: PathBuf,
        /// Input directory (overrides the config file)
        input: Option<PathBuf>,
        /// Output directory (overrides the config file)
        output: Option<PathBuf>,
        #[command(flatten)]
        encoding: EncodingArgs,
    },
}

#[derive(Args)]
struct EncodingArgs {
    /// Do not produce WebP variants
    #[arg(long)]
    skip_webp: bool,

    /// JPEG quality (0-100)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    jpg_quality: Option<u8>,

    /// PNG quality (0-100)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    png_quality: Option<u8>,

    /// GIF quality (0-100)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    gif_quality: Option<u8>,

    /// WebP quality (0-100)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    webp_quality: Option<u8>,
}

impl EncodingArgs {
    fn overrides(&self, input: Option<PathBuf>, output: Option<PathBuf>) -> CliOverrides {
        CliOverrides {
            input,
            output,
            jpg_quality: self.jpg_quality,
            png_quality: self.png_quality,
            gif_quality: self.gif_quality,
            webp_quality: self.webp_quality,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json)?;

    let output_mode = if cli.json { OutputMode::Json } else { OutputMode::Log };
    match run(cli, output_mode).await {
        Ok(()) => Ok(()),
        Err(e) if output_mode == OutputMode::Json => {
            JsonMessage::error(format!("{:#}", e)).emit();
            Err(e)
        }
        Err(e) => Err(e),
    }
}

fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if json {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }
    Ok(())
}

async fn run(cli: Cli, output_mode: OutputMode) -> Result<()> {
    let mut resolver = ConfigResolver::new();
    if let Some(path) = cli.config {
        resolver = resolver.with_config_path(path);
    }
    if cli.no_schema {
        resolver = resolver.with_schema(SchemaSource::Disabled);
    } else if let Some(path) = cli.schema {
        resolver = resolver.with_schema(SchemaSource::File(path));
    }

    let codec = NativeCodec::detect();
    if codec.has_lossy_webp() {
        debug!("Using cwebp for lossy WebP variants");
    }
    let codec = Arc::new(codec);

    match cli.command {
        Command::All {
            input,
            output,
            progress,
            encoding,
        } => {
            let config = resolver.resolve(&encoding.overrides(input, output)).await;
            let options = RunOptions {
                emit_webp: !encoding.skip_webp,
                output_mode,
                show_progress: progress,
            };
            BatchOrchestrator::new(config, codec, options).run().await?;
        }
        Command::Update {
            changed,
            input,
            output,
            encoding,
        } => {
            let config = resolver.resolve(&encoding.overrides(input, output)).await;
            let options = RunOptions {
                emit_webp: !encoding.skip_webp,
                output_mode,
                show_progress: false,
            };
            match IncrementalUpdater::new(config, codec, options).run(&changed).await? {
                UpdateOutcome::Ignored => info!("Ignored {}: unsupported format", changed.display()),
                UpdateOutcome::Updated(_) | UpdateOutcome::Failed(_) | UpdateOutcome::Removed { .. } => {}
            }
        }
    }

    Ok(())
}
