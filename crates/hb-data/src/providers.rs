use std::path::{Path, PathBuf};
use std::sync::Arc;

use hb_types::{Dataset, HbResult};
use serde::{Deserialize, Serialize};

use crate::cache::SnapshotCache;
use crate::loaders::CsvLoader;

/// Source of one benchmark dataset (CSV files, in-memory fixtures, ...).
pub trait DatasetProvider: Send + Sync + std::fmt::Debug {
    /// Stable identifier recorded in run statistics.
    fn id(&self) -> &str;

    /// Name used as the dataset directory in the results tree.
    fn name(&self) -> &str;

    /// Load the dataset. Repeated calls return the same snapshot.
    fn load(&self) -> HbResult<Arc<Dataset>>;

    fn stats(&self) -> HbResult<DatasetStats> {
        Ok(DatasetStats::from_dataset(&*self.load()?))
    }
}

/// Descriptive statistics of a dataset, as shown by the dataset explorer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetStats {
    pub id: String,
    pub name: String,
    pub rows: usize,
    pub columns: usize,
    pub classes: usize,
    pub missing: usize,
    pub numeric: usize,
    pub categorical: usize,
    /// `rows * (columns + classes)`, a rough measure of training cost.
    pub dimension: usize,
}

impl DatasetStats {
    pub fn from_dataset(data: &Dataset) -> Self {
        let meta = data.metadata();
        Self {
            id: data.id.clone(),
            name: data.name.clone(),
            rows: meta.rows,
            columns: meta.columns,
            classes: meta.classes,
            missing: meta.missing,
            numeric: meta.numeric_columns,
            categorical: meta.categorical_columns,
            dimension: meta.rows * (meta.columns + meta.classes),
        }
    }
}

/// Provider over a dataset already held in memory.
#[derive(Debug, Clone)]
pub struct InMemoryProvider {
    data: Arc<Dataset>,
}

impl InMemoryProvider {
    pub fn new(data: Dataset) -> Self {
        Self {
            data: Arc::new(data),
        }
    }
}

impl DatasetProvider for InMemoryProvider {
    fn id(&self) -> &str {
        &self.data.id
    }

    fn name(&self) -> &str {
        &self.data.name
    }

    fn load(&self) -> HbResult<Arc<Dataset>> {
        Ok(Arc::clone(&self.data))
    }
}

/// Provider reading a local CSV file on first use.
#[derive(Debug)]
pub struct CsvProvider {
    id: String,
    name: String,
    path: PathBuf,
    loader: CsvLoader,
    cache: SnapshotCache,
}

impl CsvProvider {
    pub fn new<P: AsRef<Path>>(
        id: impl Into<String>,
        name: impl Into<String>,
        path: P,
        label_column: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            path: path.as_ref().to_path_buf(),
            loader: CsvLoader::new(label_column),
            cache: SnapshotCache::new(),
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.loader = self.loader.with_delimiter(delimiter);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn cache(&self) -> &SnapshotCache {
        &self.cache
    }
}

impl DatasetProvider for CsvProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn load(&self) -> HbResult<Arc<Dataset>> {
        self.cache
            .get_or_load(|| self.loader.load(&self.path, &self.id, &self.name))
    }
}
