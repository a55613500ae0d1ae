//! Trial tracking and incumbent bookkeeping for a single search run.

use std::collections::{BTreeSet, HashMap};

use hb_types::{Configuration, Entry, RunStats, Trajectory};
use serde::{Deserialize, Serialize};

/// How a single evaluation ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TrialOutcome {
    Finished { loss: f64 },
    Crashed { message: String },
}

/// One evaluation of one configuration under one seed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    pub number: usize,
    pub config_id: usize,
    pub seed: u64,
    pub outcome: TrialOutcome,
    /// Seconds since the search started when the trial finished.
    pub finished_at: f64,
    pub duration: f64,
}

impl Trial {
    pub fn loss(&self) -> Option<f64> {
        match self.outcome {
            TrialOutcome::Finished { loss } => Some(loss),
            TrialOutcome::Crashed { .. } => None,
        }
    }
}

#[derive(Debug, Clone)]
struct ConfigRecord {
    configuration: Configuration,
    seeds: BTreeSet<u64>,
    losses: Vec<f64>,
}

impl ConfigRecord {
    fn cost(&self) -> Option<f64> {
        if self.losses.is_empty() {
            None
        } else {
            Some(self.losses.iter().sum::<f64>() / self.losses.len() as f64)
        }
    }
}

/// An incumbent change, recorded when it happened.
#[derive(Debug, Clone, PartialEq)]
struct IncumbentChange {
    config_id: usize,
    cost: f64,
    at_iteration: usize,
    at_time: f64,
}

/// Everything observed during one search: trials, per-configuration seeds
/// and costs, and the incumbent history.
#[derive(Debug, Clone, Default)]
pub struct RunHistory {
    trials: Vec<Trial>,
    configs: Vec<ConfigRecord>,
    index: HashMap<String, usize>,
    incumbent: Option<usize>,
    changes: Vec<IncumbentChange>,
}

impl RunHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identifier of `config`, registering it on first sight.
    pub fn config_id(&mut self, config: &Configuration) -> usize {
        let key = config_key(config);
        if let Some(&id) = self.index.get(&key) {
            return id;
        }
        let id = self.configs.len();
        self.configs.push(ConfigRecord {
            configuration: config.clone(),
            seeds: BTreeSet::new(),
            losses: Vec::new(),
        });
        self.index.insert(key, id);
        id
    }

    /// Record a trial. Crashed trials count as submitted but add no cost.
    pub fn record(
        &mut self,
        config_id: usize,
        seed: u64,
        outcome: TrialOutcome,
        finished_at: f64,
        duration: f64,
    ) -> &Trial {
        let record = &mut self.configs[config_id];
        record.seeds.insert(seed);
        if let TrialOutcome::Finished { loss } = outcome {
            record.losses.push(loss);
        }
        self.trials.push(Trial {
            number: self.trials.len() + 1,
            config_id,
            seed,
            outcome,
            finished_at,
            duration,
        });
        &self.trials[self.trials.len() - 1]
    }

    pub fn trials(&self) -> &[Trial] {
        &self.trials
    }

    pub fn submitted(&self) -> usize {
        self.trials.len()
    }

    pub fn configuration(&self, config_id: usize) -> &Configuration {
        &self.configs[config_id].configuration
    }

    /// Mean loss of a configuration over its finished trials.
    pub fn cost(&self, config_id: usize) -> Option<f64> {
        self.configs[config_id].cost()
    }

    /// Seeds a configuration has been evaluated under.
    pub fn seeds(&self, config_id: usize) -> &BTreeSet<u64> {
        &self.configs[config_id].seeds
    }

    /// Mean loss of `config_id` restricted to the trials run under `seeds`.
    pub fn cost_on(&self, config_id: usize, seeds: &BTreeSet<u64>) -> Option<f64> {
        let losses: Vec<f64> = self
            .trials
            .iter()
            .filter(|t| t.config_id == config_id && seeds.contains(&t.seed))
            .filter_map(Trial::loss)
            .collect();
        if losses.is_empty() {
            None
        } else {
            Some(losses.iter().sum::<f64>() / losses.len() as f64)
        }
    }

    pub fn incumbent(&self) -> Option<usize> {
        self.incumbent
    }

    /// Make `config_id` the incumbent if its cost beats the current one.
    /// Returns whether the incumbent changed.
    pub fn update_best(&mut self, config_id: usize, at_time: f64) -> bool {
        let Some(cost) = self.cost(config_id) else {
            return false;
        };
        let improves = match self.incumbent {
            None => true,
            Some(current) if current == config_id => false,
            Some(current) => self.cost(current).map_or(true, |best| cost < best),
        };
        if improves {
            self.incumbent = Some(config_id);
            self.changes.push(IncumbentChange {
                config_id,
                cost,
                at_iteration: self.submitted(),
                at_time,
            });
        }
        improves
    }

    /// Incumbent changes as trajectory entries. Each entry carries every seed
    /// its configuration was evaluated under by the end of the run.
    pub fn trajectory(&self) -> Trajectory {
        self.changes
            .iter()
            .map(|change| {
                let record = &self.configs[change.config_id];
                Entry::new(
                    record.configuration.clone(),
                    change.cost,
                    change.at_iteration as f64,
                    change.at_time,
                    record.seeds.iter().copied(),
                )
            })
            .collect()
    }

    pub fn stats(&self, wallclock_time_used: f64) -> RunStats {
        let losses: Vec<f64> = self.trials.iter().filter_map(Trial::loss).collect();
        RunStats {
            submitted_evaluations: self.trials.len() as u64,
            finished_evaluations: losses.len() as u64,
            incumbent_changes: self.changes.len() as u64,
            configs_evaluated: self.configs.len() as u64,
            mean_cost: if losses.is_empty() {
                None
            } else {
                Some(losses.iter().sum::<f64>() / losses.len() as f64)
            },
            cpu_time_used: self.trials.iter().map(|t| t.duration).sum(),
            wallclock_time_used,
        }
    }
}

/// Canonical key of a configuration; entries are name-ordered.
fn config_key(config: &Configuration) -> String {
    config
        .iter()
        .map(|(name, value)| format!("{name}={value:?}"))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use hb_types::ParameterValue;

    fn config(x: i64) -> Configuration {
        let mut config = Configuration::new();
        config.insert("x".into(), ParameterValue::Int(x));
        config
    }

    fn finished(loss: f64) -> TrialOutcome {
        TrialOutcome::Finished { loss }
    }

    #[test]
    fn test_config_ids_are_stable() {
        let mut history = RunHistory::new();
        let a = history.config_id(&config(1));
        let b = history.config_id(&config(2));
        assert_ne!(a, b);
        assert_eq!(history.config_id(&config(1)), a);
    }

    #[test]
    fn test_update_best_only_on_strict_improvement() {
        let mut history = RunHistory::new();
        let a = history.config_id(&config(1));
        history.record(a, 0, finished(0.5), 0.1, 0.1);
        assert!(history.update_best(a, 0.1));

        let b = history.config_id(&config(2));
        history.record(b, 0, finished(0.5), 0.2, 0.1);
        assert!(!history.update_best(b, 0.2));

        let c = history.config_id(&config(3));
        history.record(c, 0, finished(0.25), 0.3, 0.1);
        assert!(history.update_best(c, 0.3));
        assert_eq!(history.incumbent(), Some(c));

        let trajectory = history.trajectory();
        assert_eq!(trajectory.len(), 2);
        assert_eq!(trajectory.entries()[0].at_iteration, 1.0);
        assert_eq!(trajectory.entries()[1].at_iteration, 3.0);
        assert_eq!(trajectory.entries()[1].loss, 0.25);
    }

    #[test]
    fn test_crashed_trials_count_as_submitted_only() {
        let mut history = RunHistory::new();
        let a = history.config_id(&config(1));
        history.record(a, 0, TrialOutcome::Crashed { message: "boom".into() }, 0.1, 0.1);
        assert!(!history.update_best(a, 0.1));
        history.record(a, 1, finished(0.4), 0.3, 0.2);

        let stats = history.stats(0.5);
        assert_eq!(stats.submitted_evaluations, 2);
        assert_eq!(stats.finished_evaluations, 1);
        assert_eq!(stats.configs_evaluated, 1);
        assert_eq!(stats.mean_cost, Some(0.4));
        assert!((stats.cpu_time_used - 0.3).abs() < 1e-12);
        assert_eq!(stats.wallclock_time_used, 0.5);
    }

    #[test]
    fn test_trajectory_reports_final_seed_sets() {
        let mut history = RunHistory::new();
        let a = history.config_id(&config(1));
        history.record(a, 11, finished(0.4), 0.1, 0.1);
        history.update_best(a, 0.1);
        history.record(a, 12, finished(0.2), 0.2, 0.1);

        let binding = history.trajectory();
        let entry = &binding.entries()[0];
        assert_eq!(entry.seeds, BTreeSet::from([11, 12]));
        assert_eq!(history.cost_on(a, &BTreeSet::from([11])), Some(0.4));
    }
}
