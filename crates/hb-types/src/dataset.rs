use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::errors::{DatasetError, HbResult};

/// A tabular classification dataset.
///
/// Features are stored row-major; a missing cell is `NaN`. Labels are class
/// indices. Every column is listed in exactly one of `categorical` or `numeric`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: String,
    pub name: String,
    pub features: Vec<Vec<f64>>,
    pub labels: Vec<usize>,
    pub categorical: Vec<usize>,
    pub numeric: Vec<usize>,
}

/// Shape summary of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    pub rows: usize,
    pub columns: usize,
    pub classes: usize,
    pub missing: usize,
    pub numeric_columns: usize,
    pub categorical_columns: usize,
}

impl Dataset {
    /// Build a dataset whose columns are all numeric.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        features: Vec<Vec<f64>>,
        labels: Vec<usize>,
    ) -> HbResult<Self> {
        let name = name.into();
        if features.len() != labels.len() {
            return Err(DatasetError::InvalidFormat {
                message: format!(
                    "{name}: {} feature rows but {} labels",
                    features.len(),
                    labels.len()
                ),
            }
            .into());
        }
        let columns = features.first().map_or(0, Vec::len);
        if let Some(row) = features.iter().position(|r| r.len() != columns) {
            return Err(DatasetError::InvalidFormat {
                message: format!("{name}: row {row} has {} columns, expected {columns}", features[row].len()),
            }
            .into());
        }
        Ok(Self {
            id: id.into(),
            name,
            features,
            labels,
            categorical: Vec::new(),
            numeric: (0..columns).collect(),
        })
    }

    /// Mark the given columns as categorical; all others stay numeric.
    pub fn with_categorical(mut self, categorical: impl IntoIterator<Item = usize>) -> HbResult<Self> {
        let columns = self.n_columns();
        let categorical: BTreeSet<usize> = categorical.into_iter().collect();
        if let Some(&column) = categorical.iter().find(|&&c| c >= columns) {
            return Err(DatasetError::InvalidFormat {
                message: format!("{}: no column {column} in {columns} columns", self.name),
            }
            .into());
        }
        self.numeric = (0..columns).filter(|c| !categorical.contains(c)).collect();
        self.categorical = categorical.into_iter().collect();
        Ok(self)
    }

    pub fn n_rows(&self) -> usize {
        self.features.len()
    }

    pub fn n_columns(&self) -> usize {
        self.categorical.len() + self.numeric.len()
    }

    /// Number of distinct classes present in the labels.
    pub fn n_classes(&self) -> usize {
        self.labels.iter().collect::<BTreeSet<_>>().len()
    }

    pub fn n_missing(&self) -> usize {
        self.features
            .iter()
            .flatten()
            .filter(|v| v.is_nan())
            .count()
    }

    pub fn is_categorical(&self, column: usize) -> bool {
        self.categorical.contains(&column)
    }

    /// Values of one column, in row order.
    pub fn column(&self, column: usize) -> impl Iterator<Item = f64> + '_ {
        self.features.iter().map(move |row| row[column])
    }

    /// A new dataset holding the given rows, in the given order.
    pub fn select(&self, indices: &[usize]) -> HbResult<Self> {
        let rows = self.n_rows();
        if let Some(&index) = indices.iter().find(|&&i| i >= rows) {
            return Err(DatasetError::IndexOutOfRange { index, rows }.into());
        }
        Ok(Self {
            id: self.id.clone(),
            name: self.name.clone(),
            features: indices.iter().map(|&i| self.features[i].clone()).collect(),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
            categorical: self.categorical.clone(),
            numeric: self.numeric.clone(),
        })
    }

    pub fn metadata(&self) -> DatasetMetadata {
        DatasetMetadata {
            rows: self.n_rows(),
            columns: self.n_columns(),
            classes: self.n_classes(),
            missing: self.n_missing(),
            numeric_columns: self.numeric.len(),
            categorical_columns: self.categorical.len(),
        }
    }
}
