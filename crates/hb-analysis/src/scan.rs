//! Building a [`ResultTable`] from the results tree.

use std::fs;
use std::path::{Path, PathBuf};

use hb_data::{load_trajectory, RunKey, RunLayout, LEAF_FILES};
use hb_types::{
    expand_virtual_budget, ArtifactError, BudgetAxis, HbResult, OptimizerName, ResampleGrid, Stage,
    Trajectory,
};
use rayon::prelude::*;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::table::{ResultRow, ResultTable};

/// What to scan and on which grid.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanOptions {
    pub target: String,
    pub axis: BudgetAxis,
    /// Derived from the runs when unset.
    pub max_budget: Option<f64>,
    pub step_size: f64,
}

impl ScanOptions {
    pub fn new(target: impl Into<String>, axis: BudgetAxis) -> Self {
        Self {
            target: target.into(),
            axis,
            max_budget: None,
            step_size: 1.0,
        }
    }

    pub fn with_max_budget(mut self, max_budget: f64) -> Self {
        self.max_budget = Some(max_budget);
        self
    }

    pub fn with_step_size(mut self, step_size: f64) -> Self {
        self.step_size = step_size;
        self
    }
}

struct LoadedLeaf {
    key: RunKey,
    optimizer: OptimizerName,
    search: Trajectory,
    eval: Trajectory,
}

/// Scan every complete leaf of `target` below `root`.
pub fn scan(
    root: &Path,
    target: &str,
    axis: BudgetAxis,
    max_budget: Option<f64>,
) -> HbResult<ResultTable> {
    let mut options = ScanOptions::new(target, axis);
    options.max_budget = max_budget;
    scan_with(root, &options)
}

/// Rows are keyed by (variant label, seed, dataset, stage, virtual) and sorted.
///
/// Leaves missing one of their files are skipped; a file that exists but does
/// not parse fails the scan with its path, as does a directory that cannot be
/// read (including a missing target).
pub fn scan_with(root: &Path, options: &ScanOptions) -> HbResult<ResultTable> {
    let layout = RunLayout::new(root);
    let leaves: Vec<RunKey> = complete_leaves(root, &options.target)?;
    let loaded = leaves
        .par_iter()
        .map(|key| load_leaf(&layout, key))
        .collect::<HbResult<Vec<_>>>()?;

    let max_budget = match options.max_budget {
        Some(max_budget) => max_budget,
        None => derived_max_budget(&loaded, options.axis, options.step_size),
    };
    let grid = ResampleGrid::new(options.axis, max_budget).with_step_size(options.step_size);

    let mut rows: Vec<ResultRow> = loaded
        .par_iter()
        .flat_map_iter(|leaf| leaf_rows(leaf, &grid))
        .collect();
    rows.sort_by(|a, b| {
        (&a.optimizer, a.seed, &a.dataset, a.stage).cmp(&(&b.optimizer, b.seed, &b.dataset, b.stage))
    });

    info!(
        "Scanned {} runs of {} into {} rows over {} grid points",
        loaded.len(),
        options.target,
        rows.len(),
        grid.len()
    );
    Ok(ResultTable::new(options.target.clone(), grid, rows))
}

/// Target algorithms with results under `root`, hidden entries skipped.
pub fn target_algorithms(root: &Path) -> HbResult<Vec<String>> {
    let mut targets = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with('.') && entry.file_type()?.is_dir() {
            targets.push(name);
        }
    }
    targets.sort();
    Ok(targets)
}

fn complete_leaves(root: &Path, target: &str) -> HbResult<Vec<RunKey>> {
    let target_dir: PathBuf = root.join(target);
    let mut keys = Vec::new();
    for entry in WalkDir::new(&target_dir).min_depth(3).max_depth(3) {
        let entry = entry.map_err(|e| ArtifactError::ReadFailed {
            path: e.path().unwrap_or(&target_dir).to_path_buf(),
            message: e.to_string(),
        })?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let path = entry.path();
        let Some(key) = RunKey::from_leaf_dir(root, path) else {
            continue;
        };
        if LEAF_FILES.iter().all(|file| path.join(file).is_file()) {
            keys.push(key);
        } else {
            debug!("Skipping incomplete leaf {}", key);
        }
    }
    keys.sort();
    Ok(keys)
}

fn load_leaf(layout: &RunLayout, key: &RunKey) -> HbResult<LoadedLeaf> {
    Ok(LoadedLeaf {
        optimizer: OptimizerName::parse(&key.optimizer),
        search: load_trajectory(&layout.trajectory_path(key, Stage::Search))?,
        eval: load_trajectory(&layout.trajectory_path(key, Stage::Eval))?,
        key: key.clone(),
    })
}

/// Furthest search position over all runs, each divided by its own
/// multiplier, plus one step so the last incumbent lands on the grid.
fn derived_max_budget(leaves: &[LoadedLeaf], axis: BudgetAxis, step_size: f64) -> f64 {
    leaves
        .iter()
        .filter_map(|leaf| {
            let reached = leaf.search.max_position(axis)?;
            Some(reached / f64::from(leaf.optimizer.budget_multiplier()))
        })
        .fold(None, |acc: Option<f64>, p| Some(acc.map_or(p, |a| a.max(p))))
        .map_or(0.0, |max| max + step_size)
}

fn leaf_rows(leaf: &LoadedLeaf, grid: &ResampleGrid) -> Vec<ResultRow> {
    [(Stage::Search, &leaf.search), (Stage::Eval, &leaf.eval)]
        .into_iter()
        .flat_map(|(stage, trajectory)| {
            expand_virtual_budget(trajectory, &leaf.optimizer, grid)
                .into_iter()
                .map(move |curve| {
                    // the real curve keeps its directory name
                    let label = if curve.is_virtual {
                        curve.label
                    } else {
                        leaf.key.optimizer.clone()
                    };
                    ResultRow::new(
                        label,
                        leaf.key.seed,
                        leaf.key.dataset.clone(),
                        stage,
                        curve.is_virtual,
                        curve.values,
                    )
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hb_types::{Configuration, Entry, HbError, RunStats, StatsArtifact};
    use tempfile::TempDir;

    fn trajectory(points: &[(f64, f64)]) -> Trajectory {
        points
            .iter()
            .map(|&(loss, at)| Entry::new(Configuration::new(), loss, at, at / 10.0, [0]))
            .collect()
    }

    fn write(layout: &RunLayout, optimizer: &str, seed: u64, dataset: &str, search: &Trajectory) {
        let key = RunKey::new("knn", optimizer, seed, dataset);
        let stats = StatsArtifact::new(RunStats::default(), dataset, 1.0);
        layout.write_leaf(&key, search, search, &stats).unwrap();
    }

    #[test]
    fn test_scan_expands_virtual_budgets() {
        let dir = TempDir::new().unwrap();
        let layout = RunLayout::new(dir.path());
        write(&layout, "opt_a", 0, "iris", &trajectory(&[(0.5, 1.0), (0.3, 3.0)]));
        write(&layout, "opt_b_x2", 0, "iris", &trajectory(&[(0.4, 1.0), (0.2, 6.0)]));

        let table = scan(dir.path(), "knn", BudgetAxis::Iterations, None).unwrap();
        // max(3 / 1, 6 / 2) + 1
        assert_eq!(table.grid.len(), 4);
        assert_eq!(table.optimizers(), vec!["opt_a", "opt_b_x1", "opt_b_x2"]);
        assert_eq!(table.len(), 6);

        let real: Vec<&ResultRow> = table.find("opt_b_x2", Stage::Search).collect();
        assert!(!real[0].is_virtual);
        assert!(real[0].values[0].is_nan());
        assert_eq!(&real[0].values[1..], &[0.4, 0.4, 0.2]);

        let virtual_row: Vec<&ResultRow> = table.find("opt_b_x1", Stage::Search).collect();
        assert!(virtual_row[0].is_virtual);
        assert!(virtual_row[0].values[0].is_nan());
        assert_eq!(virtual_row[0].values[1], 0.4);
    }

    #[test]
    fn test_incomplete_leaves_are_skipped() {
        let dir = TempDir::new().unwrap();
        let layout = RunLayout::new(dir.path());
        write(&layout, "opt_a", 0, "iris", &trajectory(&[(0.5, 1.0)]));
        write(&layout, "opt_a", 0, "wine", &trajectory(&[(0.5, 1.0)]));
        fs::remove_file(layout.stats_path(&RunKey::new("knn", "opt_a", 0, "wine"))).unwrap();

        let table = scan(dir.path(), "knn", BudgetAxis::Iterations, Some(5.0)).unwrap();
        assert_eq!(table.datasets(), vec!["iris"]);
        assert_eq!(table.grid.len(), 5);
    }

    #[test]
    fn test_malformed_trajectory_names_its_path() {
        let dir = TempDir::new().unwrap();
        let layout = RunLayout::new(dir.path());
        write(&layout, "opt_a", 0, "iris", &trajectory(&[(0.5, 1.0)]));
        let key = RunKey::new("knn", "opt_a", 0, "iris");
        let path = layout.trajectory_path(&key, Stage::Eval);
        fs::write(&path, "[{\"loss\": ").unwrap();

        match scan(dir.path(), "knn", BudgetAxis::Time, None) {
            Err(HbError::Artifact(e)) => assert_eq!(e.path(), path.as_path()),
            other => panic!("expected a malformed artifact, got {other:?}"),
        }
    }

    #[test]
    fn test_real_curve_label_joins_with_its_stats() {
        let dir = TempDir::new().unwrap();
        let layout = RunLayout::new(dir.path());
        for optimizer in ["opt_x1", "opt_x02"] {
            write(&layout, optimizer, 0, "iris", &trajectory(&[(0.5, 1.0)]));
        }

        let table = scan(dir.path(), "knn", BudgetAxis::Iterations, None).unwrap();
        assert_eq!(table.optimizers(), vec!["opt_x02", "opt_x1"]);
        assert!(table.rows.iter().all(|r| !r.is_virtual));

        let records = crate::stats::load_stats(dir.path(), &table).unwrap();
        let joined: Vec<&str> = records.iter().map(|r| r.key.optimizer.as_str()).collect();
        assert_eq!(joined, vec!["opt_x02", "opt_x1"]);
    }

    #[test]
    fn test_missing_target_fails_with_its_path() {
        let dir = TempDir::new().unwrap();
        match scan(dir.path(), "knn", BudgetAxis::Iterations, None) {
            Err(HbError::Artifact(e)) => assert_eq!(e.path(), dir.path().join("knn")),
            other => panic!("expected a read failure, got {other:?}"),
        }
    }

    #[test]
    fn test_target_algorithms_skip_hidden_entries() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("knn")).unwrap();
        fs::create_dir(dir.path().join("svm")).unwrap();
        fs::create_dir(dir.path().join(".cache")).unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();
        assert_eq!(target_algorithms(dir.path()).unwrap(), vec!["knn", "svm"]);
    }
}
