//! Run-level statistics joined from `stats.json` artifacts.
//!
//! Only non-virtual eval rows have artifacts of their own; virtual curves are
//! reconstructions and never count as runs.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

use hb_data::{load_stats as load_stats_file, RunKey, RunLayout};
use hb_types::{HbResult, Stage, StatsArtifact};
use serde::{Serialize, Serializer};

use crate::table::ResultTable;
use crate::transforms::nan_mean;
use crate::views::eval_dataset_counts;

/// One run's statistics with its identity.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsRecord {
    pub key: RunKey,
    pub stats: StatsArtifact,
}

/// Load the stats of every non-virtual run with an eval row in `table`.
/// A run whose leaf lost a file since the scan fails as incomplete.
pub fn load_stats(root: &Path, table: &ResultTable) -> HbResult<Vec<StatsRecord>> {
    let layout = RunLayout::new(root);
    let keys: BTreeSet<RunKey> = table
        .rows
        .iter()
        .filter(|r| r.stage == Stage::Eval && !r.is_virtual)
        .filter_map(|r| {
            Some(RunKey::new(
                table.target.clone(),
                r.optimizer.clone(),
                r.seed?,
                r.dataset.clone()?,
            ))
        })
        .collect();

    keys.into_iter()
        .map(|key| {
            layout.ensure_complete(&key)?;
            let stats = load_stats_file(&layout.stats_path(&key))?;
            Ok(StatsRecord { key, stats })
        })
        .collect()
}

/// `mean ± std` over runs, with the population deviation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeanStd {
    pub mean: f64,
    pub std: f64,
}

impl MeanStd {
    pub fn from_values(values: &[f64]) -> Self {
        let mean = nan_mean(values.iter().copied());
        let present: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        let std = if present.is_empty() {
            f64::NAN
        } else {
            (present.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / present.len() as f64).sqrt()
        };
        Self { mean, std }
    }
}

impl fmt::Display for MeanStd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} ± {:.2}", self.mean, self.std)
    }
}

impl Serialize for MeanStd {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Render seconds as `H:MM:SS`, rounded to the nearest second.
pub fn format_duration(seconds: f64) -> String {
    if !seconds.is_finite() {
        return "-".to_string();
    }
    let total = seconds.abs().round() as u64;
    let sign = if seconds < 0.0 && total > 0 { "-" } else { "" };
    format!("{sign}{}:{:02}:{:02}", total / 3600, total % 3600 / 60, total % 60)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunStatsRow {
    pub optimizer: String,
    pub runs: usize,
    pub submitted_evaluations: MeanStd,
    pub finished_evaluations: MeanStd,
    pub cpu_time_used: MeanStd,
    pub wallclock_time_used: MeanStd,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetStatsRow {
    pub dataset: String,
    pub cpu_time_used: f64,
    pub wallclock_time_used: f64,
    pub submitted_evaluations: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OtherStatsRow {
    pub optimizer: String,
    pub mean_cost: MeanStd,
    pub incumbent_changes: MeanStd,
    pub configs_evaluated: MeanStd,
}

/// Evaluation counts and time used per optimizer.
pub fn get_run_stats(records: &[StatsRecord]) -> Vec<RunStatsRow> {
    by_optimizer(records)
        .into_iter()
        .map(|(optimizer, runs)| RunStatsRow {
            optimizer: optimizer.to_string(),
            runs: runs.len(),
            submitted_evaluations: column(&runs, |s| s.run.submitted_evaluations as f64),
            finished_evaluations: column(&runs, |s| s.run.finished_evaluations as f64),
            cpu_time_used: column(&runs, |s| s.run.cpu_time_used),
            wallclock_time_used: column(&runs, |s| s.run.wallclock_time_used),
        })
        .collect()
}

/// Per dataset means for one optimizer, slowest first.
pub fn get_dataset_stats(records: &[StatsRecord], optimizer: &str) -> Vec<DatasetStatsRow> {
    let mut datasets: BTreeMap<&str, Vec<&StatsArtifact>> = BTreeMap::new();
    for record in records.iter().filter(|r| r.key.optimizer == optimizer) {
        datasets.entry(&record.key.dataset).or_default().push(&record.stats);
    }

    let mut rows: Vec<DatasetStatsRow> = datasets
        .into_iter()
        .map(|(dataset, runs)| DatasetStatsRow {
            dataset: dataset.to_string(),
            cpu_time_used: nan_mean(runs.iter().map(|s| s.run.cpu_time_used)),
            wallclock_time_used: nan_mean(runs.iter().map(|s| s.run.wallclock_time_used)),
            submitted_evaluations: nan_mean(runs.iter().map(|s| s.run.submitted_evaluations as f64)),
        })
        .collect();
    rows.sort_by(|a, b| b.wallclock_time_used.total_cmp(&a.wallclock_time_used));
    rows
}

/// Mean cost, incumbent changes and evaluated configurations per optimizer.
pub fn get_other_stats(records: &[StatsRecord]) -> Vec<OtherStatsRow> {
    by_optimizer(records)
        .into_iter()
        .map(|(optimizer, runs)| OtherStatsRow {
            optimizer: optimizer.to_string(),
            mean_cost: column(&runs, |s| s.run.mean_cost.unwrap_or(f64::NAN)),
            incumbent_changes: column(&runs, |s| s.run.incumbent_changes as f64),
            configs_evaluated: column(&runs, |s| s.run.configs_evaluated as f64),
        })
        .collect()
}

/// Distinct eval-stage datasets per (optimizer, seed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverviewRow {
    pub optimizer: String,
    pub seed: Option<u64>,
    pub datasets: usize,
}

pub fn overview(table: &ResultTable) -> Vec<OverviewRow> {
    eval_dataset_counts(table)
        .into_iter()
        .map(|((optimizer, seed), datasets)| OverviewRow {
            optimizer,
            seed,
            datasets,
        })
        .collect()
}

fn by_optimizer(records: &[StatsRecord]) -> BTreeMap<&str, Vec<&StatsArtifact>> {
    let mut groups: BTreeMap<&str, Vec<&StatsArtifact>> = BTreeMap::new();
    for record in records {
        groups.entry(&record.key.optimizer).or_default().push(&record.stats);
    }
    groups
}

fn column(runs: &[&StatsArtifact], value: impl Fn(&StatsArtifact) -> f64) -> MeanStd {
    let values: Vec<f64> = runs.iter().map(|s| value(s)).collect();
    MeanStd::from_values(&values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::ResultRow;
    use hb_types::{BudgetAxis, ResampleGrid, RunStats, Trajectory};
    use tempfile::TempDir;

    fn artifact(submitted: u64, wallclock: f64, mean_cost: Option<f64>) -> StatsArtifact {
        StatsArtifact::new(
            RunStats {
                submitted_evaluations: submitted,
                finished_evaluations: submitted,
                incumbent_changes: 2,
                configs_evaluated: submitted,
                mean_cost,
                cpu_time_used: wallclock / 2.0,
                wallclock_time_used: wallclock,
            },
            "61",
            wallclock,
        )
    }

    fn record(optimizer: &str, seed: u64, dataset: &str, stats: StatsArtifact) -> StatsRecord {
        StatsRecord {
            key: RunKey::new("knn", optimizer, seed, dataset),
            stats,
        }
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0.0), "0:00:00");
        assert_eq!(format_duration(59.6), "0:01:00");
        assert_eq!(format_duration(3725.0), "1:02:05");
        assert_eq!(format_duration(90061.0), "25:01:01");
        assert_eq!(format_duration(f64::NAN), "-");
    }

    #[test]
    fn test_mean_std_uses_population_deviation() {
        let single = MeanStd::from_values(&[4.0]);
        assert_eq!(single, MeanStd { mean: 4.0, std: 0.0 });
        let pair = MeanStd::from_values(&[1.0, 3.0, f64::NAN]);
        assert_eq!(pair.to_string(), "2.00 ± 1.00");
    }

    #[test]
    fn test_grouped_stats() {
        let records = vec![
            record("a", 0, "iris", artifact(10, 20.0, Some(0.2))),
            record("a", 1, "iris", artifact(20, 40.0, None)),
            record("a", 0, "wine", artifact(10, 100.0, Some(0.4))),
            record("b", 0, "iris", artifact(5, 5.0, Some(0.1))),
        ];

        let runs = get_run_stats(&records);
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].runs, 3);
        assert!((runs[0].wallclock_time_used.mean - 160.0 / 3.0).abs() < 1e-9);

        let datasets = get_dataset_stats(&records, "a");
        assert_eq!(datasets[0].dataset, "wine");
        assert_eq!(datasets[1].wallclock_time_used, 30.0);
        assert_eq!(datasets[1].submitted_evaluations, 15.0);

        let other = get_other_stats(&records);
        assert_eq!(other[0].mean_cost.to_string(), "0.30 ± 0.10");
        assert_eq!(other[1].incumbent_changes.to_string(), "2.00 ± 0.00");
    }

    #[test]
    fn test_load_stats_skips_virtual_rows() {
        let dir = TempDir::new().unwrap();
        let layout = RunLayout::new(dir.path());
        let key = RunKey::new("knn", "opt_b_x2", 0, "iris");
        layout
            .write_leaf(&key, &Trajectory::default(), &Trajectory::default(), &artifact(4, 1.0, None))
            .unwrap();

        let rows = vec![
            ResultRow::new("opt_b_x1", 0, "iris", Stage::Eval, true, vec![]),
            ResultRow::new("opt_b_x2", 0, "iris", Stage::Eval, false, vec![]),
            ResultRow::new("opt_b_x2", 0, "iris", Stage::Search, false, vec![]),
        ];
        let table = ResultTable::new("knn", ResampleGrid::new(BudgetAxis::Iterations, 0.0), rows);

        let records = load_stats(dir.path(), &table).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].key, key);
        assert_eq!(records[0].stats.run.submitted_evaluations, 4);

        let counts = overview(&table);
        assert_eq!(counts.len(), 2);
        assert!(counts.iter().all(|c| c.datasets == 1));
    }

    #[test]
    fn test_load_stats_reports_a_leaf_gone_incomplete() {
        let dir = TempDir::new().unwrap();
        let layout = RunLayout::new(dir.path());
        let key = RunKey::new("knn", "opt_a", 0, "iris");
        layout
            .write_leaf(&key, &Trajectory::default(), &Trajectory::default(), &artifact(4, 1.0, None))
            .unwrap();
        std::fs::remove_file(layout.stats_path(&key)).unwrap();

        let rows = vec![ResultRow::new("opt_a", 0, "iris", Stage::Eval, false, vec![])];
        let table = ResultTable::new("knn", ResampleGrid::new(BudgetAxis::Iterations, 0.0), rows);
        match load_stats(dir.path(), &table) {
            Err(hb_types::HbError::Artifact(e)) => {
                assert_eq!(e.path(), layout.leaf_dir(&key));
                assert!(e.to_string().contains("stats.json"));
            }
            other => panic!("expected an incomplete run, got {other:?}"),
        }
    }
}
