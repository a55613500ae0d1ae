use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hb_engine::{load_benchmark, BenchmarkRunner, LogProgress};
use hb_types::CorruptPolicy;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hb-bench", version, about = "Run resumable HPO benchmarks")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every leaf of the benchmark that is not on disk yet.
    Run {
        benchmark: PathBuf,
        /// Overrides the output root of the benchmark file.
        #[arg(long)]
        output: Option<PathBuf>,
        /// Rerun leaves with malformed artifacts instead of failing.
        #[arg(long)]
        rerun_corrupt: bool,
        /// Print the run summary as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Check a benchmark file without running anything.
    Validate { benchmark: PathBuf },
    /// Print size statistics of every dataset in the benchmark.
    Datasets { benchmark: PathBuf },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match Cli::parse().command {
        Commands::Run {
            benchmark,
            output,
            rerun_corrupt,
            json,
        } => {
            let mut bench = load_benchmark(&benchmark)
                .with_context(|| format!("loading {}", benchmark.display()))?;
            if let Some(output) = output {
                bench.settings.output = output;
            }
            if rerun_corrupt {
                bench.settings.on_corrupt = CorruptPolicy::Rerun;
            }
            let summary = BenchmarkRunner::new(&bench).with_progress(&LogProgress).run()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            }
        }
        Commands::Validate { benchmark } => {
            let bench = load_benchmark(&benchmark)
                .with_context(|| format!("loading {}", benchmark.display()))?;
            bench.validate()?;
            info!(
                "{} is valid: {} leaves into {}",
                benchmark.display(),
                bench.leaf_count(),
                bench.settings.output.display()
            );
        }
        Commands::Datasets { benchmark } => {
            let bench = load_benchmark(&benchmark)
                .with_context(|| format!("loading {}", benchmark.display()))?;
            println!("{}", serde_json::to_string_pretty(&bench.datasets.overview())?);
        }
    }
    Ok(())
}
