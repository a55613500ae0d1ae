//! Declarative benchmark files.
//!
//! ```json
//! {
//!   "settings": { "budget": 20, "seeds": [0, 1], "output": "results" },
//!   "datasets": [{ "id": "61", "name": "iris", "path": "data/iris.csv", "label": "class" }],
//!   "targets": ["knn"],
//!   "optimizers": [
//!     { "name": "random" },
//!     { "name": "random", "budget_multiplier": 2 },
//!     { "name": "grid", "strategy": { "kind": "grid", "steps": 4 } }
//!   ],
//!   "transformer": "simple_imputer"
//! }
//! ```
//!
//! Relative paths are resolved against the directory holding the file.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hb_data::{CsvProvider, Passthrough, SimpleImputer, Transformer};
use hb_optimizer::{SearchOptimizer, StrategyKind};
use hb_types::{config_error, BenchmarkSettings, HbResult, OptimizerName};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::benchmark::Benchmark;
use crate::targets;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSpec {
    pub id: String,
    pub name: String,
    pub path: PathBuf,
    /// Header of the label column.
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<char>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerSpec {
    /// Directory name, optionally carrying an `_x<k>` suffix.
    pub name: String,
    #[serde(default)]
    pub strategy: StrategyKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_multiplier: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_repeats: Option<usize>,
}

impl OptimizerSpec {
    /// Reconcile the name suffix with the explicit multiplier.
    pub fn resolve_name(&self) -> HbResult<OptimizerName> {
        let parsed = OptimizerName::parse(&self.name);
        let multiplier = match self.budget_multiplier {
            None => parsed.budget_multiplier(),
            Some(k) if parsed.budget_multiplier() == 1 || parsed.budget_multiplier() == k => k,
            Some(k) => {
                return Err(config_error!(
                    "optimizer {} has suffix multiplier {} but budget_multiplier {}",
                    self.name,
                    parsed.budget_multiplier(),
                    k
                ))
            }
        };
        OptimizerName::new(parsed.base(), multiplier)
    }

    pub fn build(&self) -> HbResult<SearchOptimizer> {
        let optimizer = SearchOptimizer::new(self.resolve_name()?, self.strategy);
        Ok(match self.max_repeats {
            Some(0) => return Err(config_error!("max_repeats of {} must be positive", self.name)),
            Some(n) => optimizer.with_max_repeats(n),
            None => optimizer,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformerKind {
    Passthrough,
    #[default]
    SimpleImputer,
}

impl TransformerKind {
    pub fn build(self) -> Arc<dyn Transformer> {
        match self {
            Self::Passthrough => Arc::new(Passthrough),
            Self::SimpleImputer => Arc::new(SimpleImputer),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkFile {
    #[serde(default)]
    pub settings: BenchmarkSettings,
    pub datasets: Vec<DatasetSpec>,
    pub targets: Vec<String>,
    pub optimizers: Vec<OptimizerSpec>,
    #[serde(default)]
    pub transformer: TransformerKind,
}

impl BenchmarkFile {
    pub fn load(path: &Path) -> HbResult<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| config_error!("cannot read {}: {}", path.display(), e))?;
        serde_json::from_str(&text).map_err(|e| config_error!("{}: {}", path.display(), e))
    }

    /// Build the benchmark, resolving relative paths against `base_dir`.
    pub fn into_benchmark(self, base_dir: &Path) -> HbResult<Benchmark> {
        let mut settings = self.settings;
        settings.output = resolve(base_dir, &settings.output);
        let mut benchmark =
            Benchmark::new(settings).with_transformer(self.transformer.build());

        for spec in self.datasets {
            let mut provider =
                CsvProvider::new(spec.id, spec.name, resolve(base_dir, &spec.path), spec.label);
            if let Some(delimiter) = spec.delimiter {
                let byte = u8::try_from(delimiter)
                    .ok()
                    .filter(u8::is_ascii)
                    .ok_or_else(|| config_error!("delimiter {delimiter:?} is not ASCII"))?;
                provider = provider.with_delimiter(byte);
            }
            benchmark = benchmark.with_dataset(Arc::new(provider))?;
        }

        for name in &self.targets {
            let target =
                targets::by_name(name).ok_or_else(|| config_error!("unknown target algorithm {name}"))?;
            benchmark = benchmark.with_target(target);
        }

        for spec in &self.optimizers {
            benchmark = benchmark.with_optimizer(Arc::new(spec.build()?));
        }

        debug!(
            "Loaded benchmark with {} datasets, {} targets, {} optimizers",
            benchmark.datasets.len(),
            benchmark.targets.len(),
            benchmark.optimizers.len()
        );
        Ok(benchmark)
    }
}

/// Load and resolve a benchmark file in one go.
pub fn load_benchmark(path: &Path) -> HbResult<Benchmark> {
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    BenchmarkFile::load(path)?.into_benchmark(base_dir)
}

fn resolve(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}
