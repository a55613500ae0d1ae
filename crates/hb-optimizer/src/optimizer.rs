//! Capability interfaces between the orchestrator and a search loop.

use hb_types::{
    Budget, Configuration, EvaluationError, HbResult, OptimizerName, RunStats, SearchSpace,
    Trajectory,
};

/// Scores one configuration under one seed. Lower is better.
///
/// Errors are returned to the optimizer, which decides whether to retry,
/// skip, or give up.
pub trait ConfigEvaluator {
    fn evaluate(&self, config: &Configuration, seed: u64) -> Result<f64, EvaluationError>;
}

impl<F> ConfigEvaluator for F
where
    F: Fn(&Configuration, u64) -> Result<f64, EvaluationError>,
{
    fn evaluate(&self, config: &Configuration, seed: u64) -> Result<f64, EvaluationError> {
        self(config, seed)
    }
}

/// Everything a search loop needs to know about the run it performs.
#[derive(Debug, Clone, Copy)]
pub struct SearchContext<'a> {
    pub seed: u64,
    /// Nominal budget; the optimizer applies its own multiplier.
    pub budget: Budget,
    pub space: &'a SearchSpace,
    /// Whether the target gives the same loss for a configuration under any seed.
    pub deterministic: bool,
    pub dataset: &'a str,
}

/// What a finished search hands back.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub trajectory: Trajectory,
    pub stats: RunStats,
}

/// A hyperparameter optimizer.
pub trait Optimizer: Send + Sync + std::fmt::Debug {
    /// Directory name plus budget multiplier.
    fn name(&self) -> &OptimizerName;

    /// Run the search loop until the budget is spent. Blocks until done.
    fn search(
        &self,
        evaluator: &dyn ConfigEvaluator,
        ctx: &SearchContext<'_>,
    ) -> HbResult<SearchOutcome>;
}
