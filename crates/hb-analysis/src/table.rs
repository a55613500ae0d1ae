//! Tabular view of resampled runs.
//!
//! Every pipeline stage takes a table by reference and returns a new one.

use std::collections::BTreeSet;

use hb_types::{ResampleGrid, Stage};
use serde::{Deserialize, Serialize};

/// One resampled curve.
///
/// `seed` and `dataset` become `None` once aggregation collapsed them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    /// Optimizer variant label, e.g. `roar_x2` or its virtual `roar_x1`.
    pub optimizer: String,
    pub seed: Option<u64>,
    pub dataset: Option<String>,
    pub stage: Stage,
    #[serde(rename = "virtual")]
    pub is_virtual: bool,
    /// One value per grid point.
    pub values: Vec<f64>,
}

impl ResultRow {
    pub fn new(
        optimizer: impl Into<String>,
        seed: u64,
        dataset: impl Into<String>,
        stage: Stage,
        is_virtual: bool,
        values: Vec<f64>,
    ) -> Self {
        Self {
            optimizer: optimizer.into(),
            seed: Some(seed),
            dataset: Some(dataset.into()),
            stage,
            is_virtual,
            values,
        }
    }

    pub fn with_values(&self, values: Vec<f64>) -> Self {
        Self {
            values,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultTable {
    pub target: String,
    pub grid: ResampleGrid,
    pub rows: Vec<ResultRow>,
}

impl ResultTable {
    pub fn new(target: impl Into<String>, grid: ResampleGrid, rows: Vec<ResultRow>) -> Self {
        Self {
            target: target.into(),
            grid,
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Same target and grid, different rows.
    pub fn with_rows(&self, rows: Vec<ResultRow>) -> Self {
        Self {
            target: self.target.clone(),
            grid: self.grid,
            rows,
        }
    }

    pub fn filter(&self, keep: impl Fn(&ResultRow) -> bool) -> Self {
        self.with_rows(self.rows.iter().filter(|r| keep(r)).cloned().collect())
    }

    pub fn filter_stage(&self, stage: Stage) -> Self {
        self.filter(|r| r.stage == stage)
    }

    /// Distinct datasets, sorted.
    pub fn datasets(&self) -> Vec<String> {
        self.rows
            .iter()
            .filter_map(|r| r.dataset.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Distinct optimizer labels, sorted.
    pub fn optimizers(&self) -> Vec<String> {
        self.rows
            .iter()
            .map(|r| r.optimizer.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn find(&self, optimizer: &str, stage: Stage) -> impl Iterator<Item = &ResultRow> {
        let optimizer = optimizer.to_string();
        self.rows
            .iter()
            .filter(move |r| r.optimizer == optimizer && r.stage == stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hb_types::BudgetAxis;

    fn table() -> ResultTable {
        ResultTable::new(
            "knn",
            ResampleGrid::new(BudgetAxis::Iterations, 2.0),
            vec![
                ResultRow::new("b", 0, "iris", Stage::Search, false, vec![0.5, 0.4]),
                ResultRow::new("a", 0, "wine", Stage::Eval, false, vec![0.6, 0.5]),
                ResultRow::new("a", 1, "iris", Stage::Eval, false, vec![0.7, 0.2]),
            ],
        )
    }

    #[test]
    fn test_distinct_keys_are_sorted() {
        let table = table();
        assert_eq!(table.datasets(), vec!["iris", "wine"]);
        assert_eq!(table.optimizers(), vec!["a", "b"]);
    }

    #[test]
    fn test_filters_do_not_touch_the_source() {
        let table = table();
        let eval = table.filter_stage(Stage::Eval);
        assert_eq!(eval.len(), 2);
        assert_eq!(table.len(), 3);
        assert_eq!(table.find("a", Stage::Eval).count(), 2);
        assert_eq!(eval.grid, table.grid);
    }
}
