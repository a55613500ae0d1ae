//! Aggregation of benchmark results.
//!
//! Provides:
//! - Scanning a results tree into a table of resampled curves, with virtual
//!   budget expansion for multiplied optimizers
//! - Live, static and global views over partially finished benchmarks
//! - Rank and normalize transforms and NaN-aware grouped means
//! - Run statistics joined from `stats.json` artifacts

pub mod scan;
pub mod stats;
pub mod table;
pub mod transforms;
pub mod views;

pub use scan::{scan, scan_with, target_algorithms, ScanOptions};
pub use stats::{
    format_duration, get_dataset_stats, get_other_stats, get_run_stats, load_stats, overview,
    DatasetStatsRow, MeanStd, OtherStatsRow, OverviewRow, RunStatsRow, StatsRecord,
};
pub use table::{ResultRow, ResultTable};
pub use transforms::{
    aggregate_over_datasets, aggregate_over_seeds, nan_mean, normalize, rank, Transform,
};
pub use views::{global_view, live_view, static_view, View};
