use std::collections::HashMap;
use std::path::Path;

use csv::ReaderBuilder;
use hb_types::{Dataset, DatasetError, HbResult};

/// Reads a classification dataset from a CSV file with a header row.
///
/// The label column holds class names, mapped to indices in first-seen order.
/// A feature column where every non-empty cell parses as a number is numeric;
/// any other column is categorical and its values are coded in first-seen
/// order. Empty cells are missing (`NaN`).
#[derive(Debug, Clone)]
pub struct CsvLoader {
    label_column: String,
    delimiter: u8,
}

impl CsvLoader {
    pub fn new(label_column: impl Into<String>) -> Self {
        Self {
            label_column: label_column.into(),
            delimiter: b',',
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn load<P: AsRef<Path>>(&self, path: P, id: &str, name: &str) -> HbResult<Dataset> {
        let path = path.as_ref();
        tracing::info!("Loading CSV dataset from: {}", path.display());

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .delimiter(self.delimiter)
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| DatasetError::LoadingFailed {
                message: format!("Failed to open {}: {}", path.display(), e),
            })?;

        let headers = reader
            .headers()
            .map_err(|e| DatasetError::LoadingFailed {
                message: format!("Failed to read header of {}: {}", path.display(), e),
            })?
            .clone();
        let label_index = headers
            .iter()
            .position(|h| h == self.label_column)
            .ok_or_else(|| DatasetError::InvalidFormat {
                message: format!("{}: no label column {:?}", path.display(), self.label_column),
            })?;

        let mut rows: Vec<Vec<String>> = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = record.map_err(|e| DatasetError::InvalidFormat {
                message: format!("CSV parsing error in {} at record {}: {}", path.display(), line + 1, e),
            })?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        let mut class_codes = Coder::default();
        let labels = rows
            .iter()
            .enumerate()
            .map(|(line, row)| match row[label_index].as_str() {
                "" => Err(DatasetError::InvalidFormat {
                    message: format!("{}: record {} has no label", path.display(), line + 1),
                }),
                label => Ok(class_codes.code(label)),
            })
            .collect::<Result<Vec<usize>, _>>()?;

        let feature_columns: Vec<usize> = (0..headers.len()).filter(|&c| c != label_index).collect();
        let mut features = vec![Vec::with_capacity(feature_columns.len()); rows.len()];
        let mut categorical = Vec::new();

        for (position, &column) in feature_columns.iter().enumerate() {
            let cells: Vec<&str> = rows.iter().map(|row| row[column].as_str()).collect();
            let numeric: Option<Vec<f64>> = cells
                .iter()
                .map(|cell| if cell.is_empty() { Some(f64::NAN) } else { cell.parse().ok() })
                .collect();
            let values = match numeric {
                Some(values) => values,
                None => {
                    categorical.push(position);
                    let mut coder = Coder::default();
                    cells
                        .iter()
                        .map(|cell| if cell.is_empty() { f64::NAN } else { coder.code(cell) as f64 })
                        .collect()
                }
            };
            for (row, value) in features.iter_mut().zip(values) {
                row.push(value);
            }
        }

        let dataset = Dataset::new(id, name, features, labels)?.with_categorical(categorical)?;
        tracing::info!(
            "Loaded {} rows, {} columns, {} classes from {}",
            dataset.n_rows(),
            dataset.n_columns(),
            dataset.n_classes(),
            path.display()
        );
        Ok(dataset)
    }
}

/// Assigns consecutive codes to strings in first-seen order.
#[derive(Debug, Default)]
struct Coder {
    codes: HashMap<String, usize>,
}

impl Coder {
    fn code(&mut self, value: &str) -> usize {
        let next = self.codes.len();
        *self.codes.entry(value.to_string()).or_insert(next)
    }
}
