// Experiment orchestrator
// Walks seed -> target -> dataset -> optimizer -> split, running the search and
// evaluation stages for every leaf that is not already on disk.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use hb_data::{split_dataset, DatasetProvider, LeafStatus, RunKey, RunLayout};
use hb_optimizer::{Optimizer, SearchContext};
use hb_types::{BudgetAxis, CorruptPolicy, Dataset, HbResult, Stage, StatsArtifact};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::benchmark::Benchmark;
use crate::evaluation::{replay_trajectory, CrossValidatedEvaluator};
use crate::progress::{LogProgress, ProgressLevel, ProgressSink};
use crate::target::TargetAlgorithm;

/// What one invocation of the runner did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Leaves run and written by this invocation.
    pub executed: Vec<String>,
    /// Leaves found complete on disk.
    pub skipped: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// Search/eval pairs of one dataset after the transformer ran.
type PreparedSplits = Vec<(Dataset, Dataset)>;

pub struct BenchmarkRunner<'a> {
    benchmark: &'a Benchmark,
    layout: RunLayout,
    progress: &'a dyn ProgressSink,
}

impl<'a> BenchmarkRunner<'a> {
    pub fn new(benchmark: &'a Benchmark) -> Self {
        Self {
            benchmark,
            layout: RunLayout::new(&benchmark.settings.output),
            progress: &LogProgress,
        }
    }

    pub fn with_progress(mut self, progress: &'a dyn ProgressSink) -> Self {
        self.progress = progress;
        self
    }

    pub fn layout(&self) -> &RunLayout {
        &self.layout
    }

    /// Run every leaf of the grid that is not complete yet.
    ///
    /// Completeness is checked per (seed, target, dataset, optimizer) before
    /// any data is loaded, so a finished grid costs one directory walk.
    pub fn run(&self) -> HbResult<RunSummary> {
        self.benchmark.validate()?;
        let settings = &self.benchmark.settings;
        let started_at = Utc::now();
        let mut executed = Vec::new();
        let mut skipped = Vec::new();

        info!(
            "Running benchmark into {} ({} leaves)",
            settings.output.display(),
            self.benchmark.leaf_count()
        );

        let seeds = &settings.seeds;
        let targets = &self.benchmark.targets;
        let providers = self.benchmark.datasets.providers();
        let optimizers = &self.benchmark.optimizers;

        self.progress.reset(ProgressLevel::Seeds, "Seeds", seeds.len());
        for (i, &seed) in seeds.iter().enumerate() {
            self.progress
                .reset(ProgressLevel::Targets, &format!("Seed {seed}"), targets.len());
            for (j, target) in targets.iter().enumerate() {
                self.progress
                    .reset(ProgressLevel::Datasets, target.name(), providers.len());
                for (k, provider) in providers.iter().enumerate() {
                    self.progress
                        .reset(ProgressLevel::Optimizers, provider.name(), optimizers.len());
                    let mut prepared: Option<PreparedSplits> = None;

                    for (l, optimizer) in optimizers.iter().enumerate() {
                        let key = RunKey::new(
                            target.name(),
                            optimizer.name().to_string(),
                            seed,
                            provider.name(),
                        );
                        if self.should_skip(&key)? {
                            debug!("Skipping complete leaf {}", key);
                            skipped.push(key.to_string());
                        } else {
                            if prepared.is_none() {
                                prepared = Some(self.prepare(provider.as_ref())?);
                            }
                            let splits = prepared.as_deref().unwrap_or_default();
                            self.run_leaf(&key, target, optimizer, splits)?;
                            executed.push(key.to_string());
                        }
                        self.progress
                            .advance(ProgressLevel::Optimizers, l + 1, optimizers.len());
                    }
                    self.progress
                        .advance(ProgressLevel::Datasets, k + 1, providers.len());
                }
                self.progress
                    .advance(ProgressLevel::Targets, j + 1, targets.len());
            }
            self.progress.advance(ProgressLevel::Seeds, i + 1, seeds.len());
        }

        let summary = RunSummary {
            executed,
            skipped,
            started_at,
            finished_at: Utc::now(),
        };
        info!(
            "Benchmark finished: {} leaves executed, {} skipped in {}s",
            summary.executed.len(),
            summary.skipped.len(),
            summary.duration().num_seconds()
        );
        Ok(summary)
    }

    fn should_skip(&self, key: &RunKey) -> HbResult<bool> {
        match self.layout.status(key) {
            LeafStatus::Complete => Ok(true),
            LeafStatus::Corrupt(e) => match self.benchmark.settings.on_corrupt {
                CorruptPolicy::Fail => Err(e.into()),
                CorruptPolicy::Rerun => {
                    warn!("Rerunning {} after corrupt artifact: {}", key, e);
                    Ok(false)
                }
            },
            LeafStatus::Incomplete { missing } => {
                debug!("Leaf {} is missing {:?}", key, missing);
                Ok(false)
            }
            LeafStatus::Missing => Ok(false),
        }
    }

    /// Load, split and transform one dataset.
    fn prepare(&self, provider: &dyn DatasetProvider) -> HbResult<PreparedSplits> {
        let settings = &self.benchmark.settings;
        let data = provider.load()?;
        let policy = &settings.search_eval_splits;
        if policy.n_splits > 1 {
            warn!(
                "{} search/eval splits share one artifact path; later splits overwrite earlier ones",
                policy.n_splits
            );
        }
        split_dataset(policy, &data)?
            .iter()
            .map(|(search, eval)| self.benchmark.transformer.transform(search, eval))
            .collect()
    }

    fn run_leaf(
        &self,
        key: &RunKey,
        target: &Arc<dyn TargetAlgorithm>,
        optimizer: &Arc<dyn Optimizer>,
        splits: &[(Dataset, Dataset)],
    ) -> HbResult<()> {
        let settings = &self.benchmark.settings;
        let space = target.search_space();
        let budget = settings.budget();
        let expected = match budget.axis {
            BudgetAxis::Iterations => budget.scaled(optimizer.name().budget_multiplier()).amount as usize,
            BudgetAxis::Time => 0,
        };

        info!("Running {}", key);
        self.progress
            .reset(ProgressLevel::Splits, &key.to_string(), splits.len());
        for (i, (search, eval)) in splits.iter().enumerate() {
            self.progress
                .reset(ProgressLevel::Stage, Stage::Search.as_str(), Stage::ALL.len());
            self.progress
                .reset(ProgressLevel::Evaluations, "Evaluations", expected);

            let evaluator = CrossValidatedEvaluator::new(
                target.as_ref(),
                &space,
                search,
                &settings.train_test_splits,
                settings.scoring,
                self.progress,
            )?
            .with_expected_evaluations(expected);
            let ctx = SearchContext {
                seed: key.seed,
                budget,
                space: &space,
                deterministic: target.deterministic(),
                dataset: &key.dataset,
            };

            let started = Instant::now();
            let outcome = optimizer.search(&evaluator, &ctx)?;
            let search_seconds = started.elapsed().as_secs_f64();
            self.progress.advance(ProgressLevel::Stage, 1, Stage::ALL.len());

            self.progress
                .reset(ProgressLevel::Stage, Stage::Eval.as_str(), Stage::ALL.len());
            let replayed = replay_trajectory(
                target.as_ref(),
                search,
                eval,
                settings.scoring,
                key.seed,
                &outcome.trajectory,
            )?;
            self.progress.advance(ProgressLevel::Stage, 2, Stage::ALL.len());

            let stats = StatsArtifact::new(outcome.stats, search.id.clone(), search_seconds);
            let dir = self
                .layout
                .write_leaf(key, &outcome.trajectory, &replayed, &stats)?;
            debug!(
                "Split {} of {}: {} incumbents written to {}",
                i + 1,
                key,
                outcome.trajectory.len(),
                dir.display()
            );
            self.progress.advance(ProgressLevel::Splits, i + 1, splits.len());
        }
        Ok(())
    }
}
