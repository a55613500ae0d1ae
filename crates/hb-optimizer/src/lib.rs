//! # hb-optimizer
//!
//! Hyperparameter optimizers for HyperBench.
//!
//! Provides the optimizer and configuration-evaluator interfaces the benchmark
//! orchestrator drives, trial and incumbent tracking, and a sampling-based
//! optimizer (random or grid candidates) that produces trajectories and run
//! statistics.

mod optimizer;
mod sampling;
mod search;
mod trial;

pub use optimizer::{ConfigEvaluator, Optimizer, SearchContext, SearchOutcome};
pub use sampling::SearchOptimizer;
pub use search::{GridSearch, RandomSearch, SearchStrategy, StrategyKind};
pub use trial::{RunHistory, Trial, TrialOutcome};
