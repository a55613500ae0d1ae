use std::sync::Arc;

use hb_types::{HbError, HbResult};
use tracing::warn;

use crate::providers::{DatasetProvider, DatasetStats};

/// The set of datasets a benchmark runs on.
#[derive(Debug, Clone, Default)]
pub struct DatasetCatalog {
    providers: Vec<Arc<dyn DatasetProvider>>,
}

impl DatasetCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_providers(
        providers: impl IntoIterator<Item = Arc<dyn DatasetProvider>>,
    ) -> HbResult<Self> {
        let mut catalog = Self::new();
        for provider in providers {
            catalog.register(provider)?;
        }
        Ok(catalog)
    }

    /// Register a provider. Dataset names must be unique since they name
    /// directories in the results tree.
    pub fn register(&mut self, provider: Arc<dyn DatasetProvider>) -> HbResult<()> {
        if self.providers.iter().any(|p| p.name() == provider.name()) {
            return Err(HbError::Config(format!(
                "dataset {} registered twice",
                provider.name()
            )));
        }
        self.providers.push(provider);
        Ok(())
    }

    pub fn providers(&self) -> &[Arc<dyn DatasetProvider>] {
        &self.providers
    }

    pub fn names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Statistics of every dataset that loads, smallest `dimension` first.
    /// Datasets that fail to load are logged and left out.
    pub fn overview(&self) -> Vec<DatasetStats> {
        let mut stats: Vec<DatasetStats> = self
            .providers
            .iter()
            .filter_map(|p| match p.stats() {
                Ok(stats) => Some(stats),
                Err(e) => {
                    warn!("Skipping dataset {}: {}", p.name(), e);
                    None
                }
            })
            .collect();
        stats.sort_by(|a, b| a.dimension.cmp(&b.dimension).then_with(|| a.name.cmp(&b.name)));
        stats
    }
}
