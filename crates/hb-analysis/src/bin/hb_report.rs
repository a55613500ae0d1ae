use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;
use hb_analysis::{
    aggregate_over_datasets, aggregate_over_seeds, format_duration, get_dataset_stats, get_other_stats,
    get_run_stats, load_stats, overview, scan_with, target_algorithms, ScanOptions, Transform,
    View,
};
use hb_types::{BudgetAxis, Stage};
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hb-report", version, about = "Aggregate HPO benchmark results")]
struct Cli {
    /// Results root written by hb-bench.
    root: PathBuf,
    /// Target algorithm; defaults to the first one found.
    #[arg(long)]
    target: Option<String>,
    /// Compare on wall-clock seconds instead of evaluations.
    #[arg(long)]
    time_based: bool,
    #[arg(long)]
    max_budget: Option<f64>,
    #[arg(long, default_value_t = 1.0)]
    step_size: f64,
    #[arg(long, default_value_t = View::Live)]
    view: View,
    #[arg(long, default_value_t = Transform::Raw)]
    transform: Transform,
    #[arg(long, default_value_t = Stage::Eval)]
    stage: Stage,
    /// Include the run statistics tables.
    #[arg(long)]
    stats: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let target = match cli.target {
        Some(target) => target,
        None => match target_algorithms(&cli.root)?.into_iter().next() {
            Some(target) => target,
            None => bail!("no target algorithms under {}", cli.root.display()),
        },
    };

    let mut options = ScanOptions::new(&target, BudgetAxis::from_time_based(cli.time_based))
        .with_step_size(cli.step_size);
    options.max_budget = cli.max_budget;

    let table = cli.view.apply(&scan_with(&cli.root, &options)?);
    let curves = aggregate_over_datasets(&aggregate_over_seeds(
        &cli.transform.apply(&table.filter_stage(cli.stage)),
    ));

    let mut report = json!({
        "target": target,
        "view": cli.view.to_string(),
        "transform": cli.transform.to_string(),
        "stage": cli.stage,
        "grid": table.grid,
        "datasets": table.datasets(),
        "overview": overview(&table),
        "curves": curves
            .rows
            .iter()
            .map(|r| json!({ "optimizer": r.optimizer, "virtual": r.is_virtual, "values": r.values }))
            .collect::<Vec<_>>(),
    });

    if cli.stats {
        let records = load_stats(&cli.root, &table)?;
        let per_dataset: serde_json::Map<String, serde_json::Value> = table
            .optimizers()
            .into_iter()
            .map(|o| {
                let rows: Vec<serde_json::Value> = get_dataset_stats(&records, &o)
                    .into_iter()
                    .map(|r| {
                        json!({
                            "dataset": r.dataset,
                            "cpu_time_used": format_duration(r.cpu_time_used),
                            "wallclock_time_used": format_duration(r.wallclock_time_used),
                            "submitted_evaluations": r.submitted_evaluations.round(),
                        })
                    })
                    .collect();
                (o, serde_json::Value::Array(rows))
            })
            .collect();
        report["run_stats"] = json!(get_run_stats(&records));
        report["other_stats"] = json!(get_other_stats(&records));
        report["dataset_stats"] = serde_json::Value::Object(per_dataset);
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
