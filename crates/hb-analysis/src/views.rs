//! Row filters deciding which runs are compared.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use hb_types::{config_error, HbError, Stage};
use serde::{Deserialize, Serialize};

use crate::table::ResultTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum View {
    /// Datasets every (optimizer, seed, stage) group has reached.
    #[default]
    Live,
    /// (optimizer, seed) groups that finished the most datasets.
    Static,
    /// Everything, including incomplete runs.
    Global,
}

impl View {
    pub fn apply(self, table: &ResultTable) -> ResultTable {
        match self {
            Self::Live => live_view(table),
            Self::Static => static_view(table),
            Self::Global => global_view(table),
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Live => "live",
            Self::Static => "static",
            Self::Global => "global",
        })
    }
}

impl FromStr for View {
    type Err = HbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "live" => Ok(Self::Live),
            "static" => Ok(Self::Static),
            "global" => Ok(Self::Global),
            other => Err(config_error!("unknown view {other}")),
        }
    }
}

/// Keep only datasets present in every (optimizer, seed, stage) group.
pub fn live_view(table: &ResultTable) -> ResultTable {
    let mut groups: BTreeMap<(&str, Option<u64>, Stage), BTreeSet<&str>> = BTreeMap::new();
    for row in &table.rows {
        let datasets = groups
            .entry((row.optimizer.as_str(), row.seed, row.stage))
            .or_default();
        if let Some(dataset) = &row.dataset {
            datasets.insert(dataset.as_str());
        }
    }

    let common: BTreeSet<String> = groups
        .into_values()
        .reduce(|acc, datasets| acc.intersection(&datasets).copied().collect())
        .unwrap_or_default()
        .into_iter()
        .map(str::to_string)
        .collect();

    table.filter(|row| row.dataset.as_ref().is_some_and(|d| common.contains(d)))
}

/// Keep the (optimizer, seed) groups whose eval-stage dataset count equals
/// the largest count of any group. Groups without eval rows are dropped.
pub fn static_view(table: &ResultTable) -> ResultTable {
    let counts = eval_dataset_counts(table);
    let Some(max) = counts.values().copied().max() else {
        return table.with_rows(Vec::new());
    };
    table.filter(|row| counts.get(&(row.optimizer.clone(), row.seed)) == Some(&max))
}

pub fn global_view(table: &ResultTable) -> ResultTable {
    table.clone()
}

/// Distinct eval-stage datasets per (optimizer, seed).
pub(crate) fn eval_dataset_counts(table: &ResultTable) -> BTreeMap<(String, Option<u64>), usize> {
    let mut datasets: BTreeMap<(String, Option<u64>), BTreeSet<&str>> = BTreeMap::new();
    for row in table.rows.iter().filter(|r| r.stage == Stage::Eval) {
        let entry = datasets.entry((row.optimizer.clone(), row.seed)).or_default();
        if let Some(dataset) = &row.dataset {
            entry.insert(dataset);
        }
    }
    datasets
        .into_iter()
        .map(|(key, set)| (key, set.len()))
        .collect()
}
