use std::collections::HashSet;
use std::sync::Arc;

use hb_data::{DatasetCatalog, DatasetProvider, SimpleImputer, Transformer};
use hb_optimizer::Optimizer;
use hb_types::{config_error, BenchmarkSettings, HbResult};

use crate::target::TargetAlgorithm;

/// A complete benchmark: settings plus every collaborator the runner drives.
#[derive(Debug, Clone)]
pub struct Benchmark {
    pub settings: BenchmarkSettings,
    pub targets: Vec<Arc<dyn TargetAlgorithm>>,
    pub datasets: DatasetCatalog,
    pub optimizers: Vec<Arc<dyn Optimizer>>,
    pub transformer: Arc<dyn Transformer>,
}

impl Benchmark {
    pub fn new(settings: BenchmarkSettings) -> Self {
        Self {
            settings,
            targets: Vec::new(),
            datasets: DatasetCatalog::new(),
            optimizers: Vec::new(),
            transformer: Arc::new(SimpleImputer),
        }
    }

    pub fn with_target(mut self, target: Arc<dyn TargetAlgorithm>) -> Self {
        self.targets.push(target);
        self
    }

    pub fn with_dataset(mut self, provider: Arc<dyn DatasetProvider>) -> HbResult<Self> {
        self.datasets.register(provider)?;
        Ok(self)
    }

    pub fn with_optimizer(mut self, optimizer: Arc<dyn Optimizer>) -> Self {
        self.optimizers.push(optimizer);
        self
    }

    pub fn with_transformer(mut self, transformer: Arc<dyn Transformer>) -> Self {
        self.transformer = transformer;
        self
    }

    pub fn validate(&self) -> HbResult<()> {
        self.settings.validate()?;
        if self.targets.is_empty() {
            return Err(config_error!("no target algorithms configured"));
        }
        if self.datasets.is_empty() {
            return Err(config_error!("no datasets configured"));
        }
        if self.optimizers.is_empty() {
            return Err(config_error!("no optimizers configured"));
        }

        let mut names = HashSet::new();
        for target in &self.targets {
            if !names.insert(target.name()) {
                return Err(config_error!("target {} listed twice", target.name()));
            }
            target.search_space().check()?;
        }

        let mut names = HashSet::new();
        for optimizer in &self.optimizers {
            let name = optimizer.name().to_string();
            if !names.insert(name.clone()) {
                return Err(config_error!("optimizer {} listed twice", name));
            }
        }
        Ok(())
    }

    /// Number of leaves in the grid.
    pub fn leaf_count(&self) -> usize {
        self.settings.seeds.len() * self.targets.len() * self.datasets.len() * self.optimizers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::targets::KNearestNeighbors;
    use hb_data::InMemoryProvider;
    use hb_optimizer::SearchOptimizer;
    use hb_types::{Dataset, OptimizerName};

    fn provider(name: &str) -> Arc<dyn DatasetProvider> {
        Arc::new(InMemoryProvider::new(
            Dataset::new(name, name, vec![vec![0.0], vec![1.0]], vec![0, 1]).unwrap(),
        ))
    }

    fn optimizer(name: &str) -> Arc<dyn Optimizer> {
        Arc::new(SearchOptimizer::random(OptimizerName::parse(name)))
    }

    fn benchmark() -> Benchmark {
        Benchmark::new(BenchmarkSettings::new("out").with_seeds([0, 1]))
            .with_target(Arc::new(KNearestNeighbors))
            .with_dataset(provider("a"))
            .unwrap()
            .with_optimizer(optimizer("random"))
    }

    #[test]
    fn test_valid_benchmark() {
        let benchmark = benchmark().with_optimizer(optimizer("random_x2"));
        benchmark.validate().unwrap();
        assert_eq!(benchmark.leaf_count(), 4);
    }

    #[test]
    fn test_duplicate_optimizer_names_are_rejected() {
        let benchmark = benchmark().with_optimizer(optimizer("random"));
        assert!(benchmark.validate().is_err());
    }

    #[test]
    fn test_empty_collaborators_are_rejected() {
        let mut no_targets = benchmark();
        no_targets.targets.clear();
        assert!(no_targets.validate().is_err());

        let no_optimizers = Benchmark::new(BenchmarkSettings::new("out"))
            .with_target(Arc::new(KNearestNeighbors))
            .with_dataset(provider("a"))
            .unwrap();
        assert!(no_optimizers.validate().is_err());

        assert!(benchmark().with_dataset(provider("a")).is_err());
    }
}
