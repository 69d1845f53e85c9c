//! flowscope CLI
//!
//! Runs the analysis pipeline, prints the published results, or checks their
//! digests.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use flowscope_analysis::{AnalysisConfig, AnalysisPipeline};
use flowscope_artifacts::{error_body, read_all, ArtifactStore};
use serde_json::Value;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "flowscope")]
#[command(author = "flowscope Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Deterministic network-flow analysis and result artifacts", long_about = None)]
struct Cli {
    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute and publish all result artifacts
    Run(RunArgs),
    /// Print the published results as one JSON object
    Show {
        /// Results directory
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Check published artifacts against the digest manifest
    Verify {
        /// Results directory
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Input CSV dataset path (header row, one label column)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output directory for the result artifacts
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Name of the label column
    #[arg(long)]
    label: Option<String>,

    /// Number of trees in the forest
    #[arg(long)]
    trees: Option<usize>,

    /// Random seed for the split and the forest
    #[arg(long)]
    seed: Option<u64>,

    /// Tree fitting threads (0 = all cores)
    #[arg(long)]
    jobs: Option<usize>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };

    let builder = FmtSubscriber::builder().with_target(false);
    let result = if std::env::var_os("RUST_LOG").is_some() {
        tracing::subscriber::set_global_default(
            builder.with_env_filter(EnvFilter::from_default_env()).finish(),
        )
    } else {
        tracing::subscriber::set_global_default(builder.with_max_level(log_level).finish())
    };
    result.context("Failed to set tracing subscriber")?;

    match cli.command {
        Command::Run(args) => run(args),
        Command::Show { output } => show(resolve_output(output)?),
        Command::Verify { output } => verify(resolve_output(output)?),
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<AnalysisConfig> {
    let mut config = match path {
        Some(path) => AnalysisConfig::load_from_file(path).context("Failed to load configuration")?,
        None => AnalysisConfig::default(),
    };
    config.apply_env().context("Invalid environment override")?;
    Ok(config)
}

/// Output directory from the flag, else config defaults plus environment
fn resolve_output(output: Option<PathBuf>) -> Result<PathBuf> {
    match output {
        Some(dir) => Ok(dir),
        None => Ok(load_config(None)?.output_dir),
    }
}

fn run(args: RunArgs) -> Result<()> {
    let mut config = load_config(args.config.as_ref())?;
    if let Some(input) = args.input {
        config.input_path = input;
    }
    if let Some(output) = args.output {
        config.output_dir = output;
    }
    if let Some(label) = args.label {
        config.label_column = label;
    }
    if let Some(trees) = args.trees {
        config.n_trees = trees;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(jobs) = args.jobs {
        config.n_jobs = jobs;
    }

    info!("flowscope analysis v{}", env!("CARGO_PKG_VERSION"));
    info!("═══════════════════════════════════════════");
    info!("Run configuration:");
    info!("  Input: {}", config.input_path.display());
    info!("  Output: {}", config.output_dir.display());
    info!("  Label column: {}", config.label_column);
    info!("  Test fraction: {}", config.test_fraction);
    info!("  Trees: {}", config.n_trees);
    info!("  Seed: {}", config.seed);
    info!("═══════════════════════════════════════════");

    let pipeline = AnalysisPipeline::new(config).context("Invalid configuration")?;
    let report = pipeline.run().context("Analysis run failed")?;
    let summary = &report.summary;

    info!("═══════════════════════════════════════════");
    info!("✓ Analysis completed successfully");
    info!("  Rows: {} loaded, {} kept", summary.rows_loaded, summary.rows_kept);
    info!("  Features: {}, classes: {}", summary.n_features, summary.n_classes);
    info!("  Split: {} train / {} test", summary.n_train, summary.n_test);
    info!("  Hold-out accuracy: {:.4}", summary.test_accuracy);
    for entry in &report.manifest.artifacts {
        info!("  {} ({})", entry.file, entry.blake3);
    }

    Ok(())
}

fn show(output: PathBuf) -> Result<()> {
    match read_all(&output) {
        Ok(response) => {
            let body = serde_json::to_string_pretty(&Value::Object(response))
                .context("Failed to render results")?;
            println!("{}", body);
            Ok(())
        }
        Err(err) => {
            println!("{}", error_body(&err));
            std::process::exit(1);
        }
    }
}

fn verify(output: PathBuf) -> Result<()> {
    let store = ArtifactStore::new(output);
    info!("Verifying artifacts in: {}", store.root().display());

    let mismatched = store.verify().context("Failed to verify artifacts")?;
    if !mismatched.is_empty() {
        let names: Vec<&str> = mismatched.iter().map(|key| key.name()).collect();
        bail!("digest mismatch for: {}", names.join(", "));
    }

    info!("✓ All artifacts match the digest manifest");
    Ok(())
}
