//! Sampling-based optimizer with seed racing for non-deterministic targets.

use std::collections::BTreeSet;
use std::time::Instant;

use hb_types::{Budget, BudgetAxis, Configuration, HbResult, OptimizerName};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use crate::optimizer::{ConfigEvaluator, Optimizer, SearchContext, SearchOutcome};
use crate::search::StrategyKind;
use crate::trial::{RunHistory, TrialOutcome};

const DEFAULT_MAX_REPEATS: usize = 5;

/// Proposes candidates from a [`StrategyKind`], starting with the default
/// configuration, and keeps the best one found as incumbent.
///
/// For non-deterministic targets each configuration is evaluated under up to
/// `max_repeats` seeds: the incumbent gains one seed per round, and a
/// challenger is raced over the incumbent's seeds and dropped as soon as it
/// falls behind.
#[derive(Debug, Clone)]
pub struct SearchOptimizer {
    name: OptimizerName,
    strategy: StrategyKind,
    max_repeats: usize,
}

impl SearchOptimizer {
    pub fn new(name: OptimizerName, strategy: StrategyKind) -> Self {
        Self {
            name,
            strategy,
            max_repeats: DEFAULT_MAX_REPEATS,
        }
    }

    pub fn random(name: OptimizerName) -> Self {
        Self::new(name, StrategyKind::Random)
    }

    pub fn grid(name: OptimizerName, steps: usize) -> Self {
        Self::new(name, StrategyKind::Grid { steps })
    }

    pub fn with_max_repeats(mut self, max_repeats: usize) -> Self {
        self.max_repeats = max_repeats.max(1);
        self
    }

    pub fn strategy(&self) -> StrategyKind {
        self.strategy
    }
}

impl Optimizer for SearchOptimizer {
    fn name(&self) -> &OptimizerName {
        &self.name
    }

    fn search(
        &self,
        evaluator: &dyn ConfigEvaluator,
        ctx: &SearchContext<'_>,
    ) -> HbResult<SearchOutcome> {
        ctx.space.check()?;
        let budget = ctx.budget.scaled(self.name.budget_multiplier());
        budget.validate()?;

        let repeats = if ctx.deterministic { 1 } else { self.max_repeats };
        let mut run = SearchRun::new(evaluator, budget, instance_seeds(ctx.seed, repeats));
        let mut rng = ChaCha8Rng::seed_from_u64(ctx.seed);
        let mut strategy = self.strategy.build(ctx.space);
        let mut pending = Some(ctx.space.default_configuration());

        info!(
            "Starting {} search on {} (seed {}, budget {} {})",
            self.name, ctx.dataset, ctx.seed, budget.amount, budget.axis
        );

        while !run.exhausted() {
            let Some(candidate) = pending.take().or_else(|| strategy.suggest(&mut rng)) else {
                debug!("Strategy {} has no candidates left", strategy.name());
                break;
            };

            run.intensify_incumbent();
            if run.exhausted() {
                break;
            }

            let challenger = run.history.config_id(&candidate);
            run.race(challenger);
            if let Some(cost) = run.history.cost(challenger) {
                strategy.report(&candidate, cost);
            }
        }

        let stats = run.history.stats(run.elapsed());
        info!(
            "Finished {} search on {}: {} evaluations, {} incumbent changes",
            self.name, ctx.dataset, stats.submitted_evaluations, stats.incumbent_changes
        );
        Ok(SearchOutcome {
            trajectory: run.history.trajectory(),
            stats,
        })
    }
}

/// Seeds used for repeated evaluations: the run seed first, then draws from it.
fn instance_seeds(seed: u64, repeats: usize) -> Vec<u64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed ^ 0x5eed);
    std::iter::once(seed)
        .chain((1..repeats).map(|_| u64::from(rng.gen::<u32>())))
        .collect()
}

struct SearchRun<'a> {
    evaluator: &'a dyn ConfigEvaluator,
    budget: Budget,
    seeds: Vec<u64>,
    started: Instant,
    history: RunHistory,
}

impl<'a> SearchRun<'a> {
    fn new(evaluator: &'a dyn ConfigEvaluator, budget: Budget, seeds: Vec<u64>) -> Self {
        Self {
            evaluator,
            budget,
            seeds,
            started: Instant::now(),
            history: RunHistory::new(),
        }
    }

    fn elapsed(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    fn exhausted(&self) -> bool {
        match self.budget.axis {
            BudgetAxis::Iterations => self.history.submitted() as f64 >= self.budget.amount,
            BudgetAxis::Time => self.elapsed() >= self.budget.amount,
        }
    }

    fn evaluate(&mut self, config_id: usize, seed: u64) {
        let config: Configuration = self.history.configuration(config_id).clone();
        let start = Instant::now();
        let outcome = match self.evaluator.evaluate(&config, seed) {
            Ok(loss) if loss.is_finite() => TrialOutcome::Finished { loss },
            Ok(loss) => {
                warn!("Evaluation returned non-finite loss {} for {:?}", loss, config);
                TrialOutcome::Crashed {
                    message: format!("non-finite loss {loss}"),
                }
            }
            Err(e) => {
                warn!("Evaluation failed for {:?}: {}", config, e);
                TrialOutcome::Crashed {
                    message: e.to_string(),
                }
            }
        };
        let duration = start.elapsed().as_secs_f64();
        let finished_at = self.elapsed();
        let trial = self.history.record(config_id, seed, outcome, finished_at, duration);
        debug!("Trial {} finished: {:?}", trial.number, trial.outcome);
    }

    /// Give the incumbent one more seed, up to the repeat limit.
    fn intensify_incumbent(&mut self) {
        let Some(incumbent) = self.history.incumbent() else {
            return;
        };
        let next = self
            .seeds
            .iter()
            .copied()
            .find(|s| !self.history.seeds(incumbent).contains(s));
        if let Some(seed) = next {
            self.evaluate(incumbent, seed);
        }
    }

    /// Evaluate `challenger` on the incumbent's seeds, stopping once it falls
    /// behind, and promote it if it beats the incumbent on all of them.
    fn race(&mut self, challenger: usize) {
        let incumbent = self.history.incumbent();
        let race_seeds: Vec<u64> = match incumbent {
            Some(id) if id != challenger => self.history.seeds(id).iter().copied().collect(),
            _ => vec![self.seeds[0]],
        };

        let mut seen = BTreeSet::new();
        for seed in race_seeds {
            seen.insert(seed);
            if self.history.seeds(challenger).contains(&seed) {
                continue;
            }
            if self.exhausted() {
                return;
            }
            self.evaluate(challenger, seed);

            if let Some(incumbent) = incumbent.filter(|&id| id != challenger) {
                let behind = match (
                    self.history.cost_on(challenger, &seen),
                    self.history.cost_on(incumbent, &seen),
                ) {
                    (Some(challenger_cost), Some(incumbent_cost)) => challenger_cost > incumbent_cost,
                    (None, _) => true,
                    (Some(_), None) => false,
                };
                if behind {
                    return;
                }
            }
        }
        let at_time = self.elapsed();
        self.history.update_best(challenger, at_time);
    }
}
