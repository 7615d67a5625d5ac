use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use rand::{rngs::StdRng, RngCore, SeedableRng};
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::EnvFilter;

use piano_cover_rust::constants::{DEFAULT_CONFIG_PATH, DEFAULT_OUTPUT_PATH};
use piano_cover_rust::{Context, Pipeline, SegmentDataset, Split, SplitFilter, StyleTable, StyleVectorSampler};

/// Piano-cover dataset tooling and transcription
#[derive(Parser)]
#[command(name = "piano-cover")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Configuration document
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Transcribe a WAV file into a piano-cover MIDI file
    Infer {
        input: PathBuf,

        /// Output MIDI file
        #[arg(short, long, default_value = DEFAULT_OUTPUT_PATH)]
        output: PathBuf,

        /// Style profile to sample the conditioning vector from
        #[arg(short, long, default_value = "level2")]
        style: String,

        /// ONNX model, defaults to the configured one
        #[arg(long)]
        model: Option<PathBuf>,

        /// Seed for style sampling
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Write the listing of included covers grouped by title
    Export,
    /// List the ids of a split
    Ids {
        #[arg(long, value_parser = parse_split)]
        split: Split,

        /// List the originals the covers map to instead
        #[arg(long)]
        orig: bool,
    },
    /// Print the canonical file paths of a recording
    Paths {
        id: String,

        /// Resolve the original recording this piano cover is based on
        #[arg(long)]
        orig: bool,
    },
    /// Check every segment of a split has its spectrogram and style vector
    Validate {
        #[arg(long, default_value = "all", value_parser = parse_split_filter)]
        split: SplitFilter,
    },
}

fn parse_split(s: &str) -> Result<Split, String> {
    s.parse().map_err(|e: piano_cover_rust::Error| e.to_string())
}

fn parse_split_filter(s: &str) -> Result<SplitFilter, String> {
    s.parse().map_err(|e: piano_cover_rust::Error| e.to_string())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { LevelFilter::DEBUG } else { LevelFilter::INFO };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    let ctx = Context::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    match cli.command {
        Commands::Infer {
            input,
            output,
            style,
            model,
            seed,
        } => {
            let styles = StyleTable::load(ctx.style_path())?;
            let mut rng: Box<dyn RngCore> = match seed {
                Some(seed) => Box::new(StdRng::seed_from_u64(seed)),
                None => Box::new(rand::rng()),
            };
            let style_vector = styles.sample(&style, rng.as_mut())?;

            let pipeline = Pipeline::from_context(&ctx, model.as_deref())?;
            pipeline.wav2midi(&input, &output, style_vector.view())?;
            println!("{}", output.display());
        }
        Commands::Export => {
            let path = ctx.export_path();
            let movies = ctx.registry.export(&path)?;
            info!(movies = movies.len(), "export done");
        }
        Commands::Ids { split, orig } => {
            for id in ctx.registry.get_ids(split, orig) {
                println!("{}", id);
            }
        }
        Commands::Paths { id, orig } => {
            let resolver = ctx.path_resolver();
            let paths = resolver.resolve(&id, orig)?;
            println!("{}", serde_json::to_string_pretty(paths)?);
        }
        Commands::Validate { split } => {
            let styles = StyleTable::load(ctx.style_path())?;
            let dataset = SegmentDataset::open(ctx.dataset_dirs(), &ctx.registry, &styles, split)?;
            dataset.validate()?;
            println!("{} segments ok", dataset.len());
        }
    }

    Ok(())
}
