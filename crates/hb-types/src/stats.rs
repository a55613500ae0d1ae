use serde::{Deserialize, Serialize};

/// Optimizer-internal statistics for one search run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub submitted_evaluations: u64,
    pub finished_evaluations: u64,
    pub incumbent_changes: u64,
    pub configs_evaluated: u64,
    /// Mean loss over finished evaluations, `None` when nothing finished.
    pub mean_cost: Option<f64>,
    pub cpu_time_used: f64,
    pub wallclock_time_used: f64,
}

/// Contents of a leaf's `stats.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsArtifact {
    #[serde(flatten)]
    pub run: RunStats,
    pub dataset_id: String,
    /// Measured duration of the search stage.
    pub search_wallclock_seconds: f64,
}

impl StatsArtifact {
    pub fn new(run: RunStats, dataset_id: impl Into<String>, search_wallclock_seconds: f64) -> Self {
        Self {
            run,
            dataset_id: dataset_id.into(),
            search_wallclock_seconds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_artifact_is_flat() {
        let artifact = StatsArtifact::new(
            RunStats {
                submitted_evaluations: 12,
                finished_evaluations: 11,
                incumbent_changes: 3,
                configs_evaluated: 10,
                mean_cost: Some(0.25),
                cpu_time_used: 1.5,
                wallclock_time_used: 1.75,
            },
            "61",
            2.0,
        );
        let json = serde_json::to_value(&artifact).unwrap();
        assert_eq!(json["submitted_evaluations"], 12);
        assert_eq!(json["dataset_id"], "61");
        assert_eq!(json["search_wallclock_seconds"], 2.0);

        let back: StatsArtifact = serde_json::from_value(json).unwrap();
        assert_eq!(back, artifact);
    }

    #[test]
    fn test_missing_mean_cost_is_null() {
        let json = serde_json::to_value(RunStats::default()).unwrap();
        assert!(json["mean_cost"].is_null());
    }
}
