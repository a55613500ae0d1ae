//! Data transformations fitted on the search subset and applied to both subsets.

use std::collections::BTreeMap;

use hb_types::{Dataset, HbResult};
use tracing::{debug, warn};

/// Fits on the search subset and applies the fitted transformation to both
/// subsets, returning new datasets.
pub trait Transformer: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;

    fn transform(&self, search: &Dataset, eval: &Dataset) -> HbResult<(Dataset, Dataset)>;
}

/// Returns unchanged copies.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl Transformer for Passthrough {
    fn name(&self) -> &str {
        "passthrough"
    }

    fn transform(&self, search: &Dataset, eval: &Dataset) -> HbResult<(Dataset, Dataset)> {
        Ok((search.clone(), eval.clone()))
    }
}

/// Replaces missing values with the most frequent value of categorical
/// columns and the median of numeric columns.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleImputer;

impl SimpleImputer {
    /// One fill value per column, computed from `data`.
    pub fn fit(&self, data: &Dataset) -> Vec<f64> {
        (0..data.n_columns())
            .map(|column| {
                let present: Vec<f64> = data.column(column).filter(|v| !v.is_nan()).collect();
                let fill = if data.is_categorical(column) {
                    most_frequent(&present)
                } else {
                    median(&present)
                };
                fill.unwrap_or_else(|| {
                    warn!("Column {} of {} has no values, filling with 0", column, data.name);
                    0.0
                })
            })
            .collect()
    }

    fn apply(data: &Dataset, fills: &[f64]) -> Dataset {
        let mut out = data.clone();
        for row in &mut out.features {
            for (value, fill) in row.iter_mut().zip(fills) {
                if value.is_nan() {
                    *value = *fill;
                }
            }
        }
        out
    }
}

impl Transformer for SimpleImputer {
    fn name(&self) -> &str {
        "simple_imputer"
    }

    fn transform(&self, search: &Dataset, eval: &Dataset) -> HbResult<(Dataset, Dataset)> {
        let fills = self.fit(search);
        debug!("Imputing {} with {:?}", search.name, fills);
        Ok((Self::apply(search, &fills), Self::apply(eval, &fills)))
    }
}

fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    })
}

/// Most frequent value; ties go to the smallest.
fn most_frequent(values: &[f64]) -> Option<f64> {
    let mut counts: BTreeMap<u64, (f64, usize)> = BTreeMap::new();
    for &v in values {
        counts.entry(v.to_bits()).or_insert((v, 0)).1 += 1;
    }
    counts
        .into_values()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.total_cmp(&a.0)))
        .map(|(value, _)| value)
}
