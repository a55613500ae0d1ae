// HPO benchmark engine
// Target algorithms, cross-validated evaluation, replay and the resumable
// experiment orchestrator.

pub mod benchmark;
pub mod config;
pub mod evaluation;
pub mod progress;
pub mod runner;
pub mod target;
pub mod targets;

pub use benchmark::Benchmark;
pub use config::{load_benchmark, BenchmarkFile, DatasetSpec, OptimizerSpec, TransformerKind};
pub use evaluation::{replay_trajectory, CrossValidatedEvaluator};
pub use progress::{
    ChannelProgress, LogProgress, NoProgress, ProgressEvent, ProgressLevel, ProgressSink,
    RecordingProgress,
};
pub use runner::{BenchmarkRunner, RunSummary};
pub use target::{fit_and_score, Estimator, TargetAlgorithm};
pub use targets::KNearestNeighbors;
