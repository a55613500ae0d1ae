//! Per-column transforms and grouped means.
//!
//! Rank and normalize work within each (dataset, stage) group, one grid
//! column at a time. NaN cells stay NaN and take no part in their column.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use hb_types::{config_error, HbError, Stage};
use serde::{Deserialize, Serialize};

use crate::table::{ResultRow, ResultTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transform {
    #[default]
    Raw,
    Rank,
    Normalize,
}

impl Transform {
    pub fn apply(self, table: &ResultTable) -> ResultTable {
        match self {
            Self::Raw => table.clone(),
            Self::Rank => rank(table),
            Self::Normalize => normalize(table),
        }
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Raw => "raw",
            Self::Rank => "rank",
            Self::Normalize => "normalize",
        })
    }
}

impl FromStr for Transform {
    type Err = HbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "raw" => Ok(Self::Raw),
            "rank" => Ok(Self::Rank),
            "normalize" => Ok(Self::Normalize),
            other => Err(config_error!("unknown transform {other}")),
        }
    }
}

/// Midpoint ranks (1-based, ties share the mean rank) per column.
pub fn rank(table: &ResultTable) -> ResultTable {
    per_dataset_columns(table, ranks)
}

/// z-score per column: `(x - mean) / std` with the sample deviation.
/// Columns with fewer than two values or zero variance become NaN.
pub fn normalize(table: &ResultTable) -> ResultTable {
    per_dataset_columns(table, z_scores)
}

/// Collapse seeds: NaN-ignoring mean per (optimizer, dataset, stage, virtual).
pub fn aggregate_over_seeds(table: &ResultTable) -> ResultTable {
    grouped_mean(table, |row| ResultRow {
        seed: None,
        values: Vec::new(),
        ..row.clone()
    })
}

/// Collapse datasets: NaN-ignoring mean per (optimizer, seed, stage, virtual).
pub fn aggregate_over_datasets(table: &ResultTable) -> ResultTable {
    grouped_mean(table, |row| ResultRow {
        dataset: None,
        values: Vec::new(),
        ..row.clone()
    })
}

fn per_dataset_columns(table: &ResultTable, column_fn: fn(&[f64]) -> Vec<f64>) -> ResultTable {
    let mut groups: BTreeMap<(Option<&str>, Stage), Vec<usize>> = BTreeMap::new();
    for (i, row) in table.rows.iter().enumerate() {
        groups
            .entry((row.dataset.as_deref(), row.stage))
            .or_default()
            .push(i);
    }

    let mut values: Vec<Vec<f64>> = table.rows.iter().map(|r| r.values.clone()).collect();
    for members in groups.values() {
        let width = members
            .iter()
            .map(|&i| table.rows[i].values.len())
            .max()
            .unwrap_or(0);
        for column in 0..width {
            let cells: Vec<f64> = members
                .iter()
                .map(|&i| table.rows[i].values.get(column).copied().unwrap_or(f64::NAN))
                .collect();
            for (&i, value) in members.iter().zip(column_fn(&cells)) {
                if let Some(cell) = values[i].get_mut(column) {
                    *cell = value;
                }
            }
        }
    }

    table.with_rows(
        table
            .rows
            .iter()
            .zip(values)
            .map(|(row, values)| row.with_values(values))
            .collect(),
    )
}

fn ranks(cells: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..cells.len()).filter(|&i| !cells[i].is_nan()).collect();
    order.sort_by(|&a, &b| cells[a].total_cmp(&cells[b]));

    let mut out = vec![f64::NAN; cells.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && cells[order[end]] == cells[order[start]] {
            end += 1;
        }
        // positions start..end hold ranks start+1..=end
        let midpoint = (start + 1 + end) as f64 / 2.0;
        for &i in &order[start..end] {
            out[i] = midpoint;
        }
        start = end;
    }
    out
}

fn z_scores(cells: &[f64]) -> Vec<f64> {
    let present: Vec<f64> = cells.iter().copied().filter(|v| !v.is_nan()).collect();
    let n = present.len() as f64;
    let mean = present.iter().sum::<f64>() / n;
    let std = (present.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt();
    cells
        .iter()
        .map(|v| {
            if v.is_nan() || !(std > 0.0) {
                f64::NAN
            } else {
                (v - mean) / std
            }
        })
        .collect()
}

/// Group rows by the key `key_of` leaves behind and average their values.
fn grouped_mean(table: &ResultTable, key_of: impl Fn(&ResultRow) -> ResultRow) -> ResultTable {
    let mut groups: Vec<(ResultRow, Vec<&[f64]>)> = Vec::new();
    for row in &table.rows {
        let key = key_of(row);
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, members)) => members.push(&row.values),
            None => groups.push((key, vec![&row.values])),
        }
    }

    let mut rows: Vec<ResultRow> = groups
        .into_iter()
        .map(|(key, members)| {
            let width = members.iter().map(|v| v.len()).max().unwrap_or(0);
            let values = (0..width)
                .map(|column| nan_mean(members.iter().filter_map(|v| v.get(column).copied())))
                .collect();
            key.with_values(values)
        })
        .collect();
    rows.sort_by(|a, b| {
        (&a.optimizer, a.seed, &a.dataset, a.stage, a.is_virtual)
            .cmp(&(&b.optimizer, b.seed, &b.dataset, b.stage, b.is_virtual))
    });
    table.with_rows(rows)
}

/// Mean of the non-NaN values, NaN when there are none.
pub fn nan_mean(values: impl IntoIterator<Item = f64>) -> f64 {
    let (sum, count) = values
        .into_iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}
