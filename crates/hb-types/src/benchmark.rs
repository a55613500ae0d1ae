//! Benchmark-wide settings shared by the orchestrator and the analysis side.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::budget::{Budget, BudgetAxis};
use crate::errors::{HbError, HbResult};

/// Which of a leaf's two trajectories a row or file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Search,
    Eval,
}

impl Stage {
    pub const ALL: [Stage; 2] = [Stage::Search, Stage::Eval];

    pub fn file_name(self) -> &'static str {
        match self {
            Self::Search => "search.json",
            Self::Eval => "eval.json",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Eval => "eval",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = HbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "search" => Ok(Self::Search),
            "eval" => Ok(Self::Eval),
            other => Err(HbError::Validation(format!("unknown stage {other}"))),
        }
    }
}

/// Score function applied to predictions. Higher is better, range [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scorer {
    #[default]
    Accuracy,
    BalancedAccuracy,
}

impl Scorer {
    pub fn name(self) -> &'static str {
        match self {
            Self::Accuracy => "accuracy",
            Self::BalancedAccuracy => "balanced_accuracy",
        }
    }

    /// Score `predicted` against `truth`. Empty input scores 0.
    pub fn score(self, truth: &[usize], predicted: &[usize]) -> f64 {
        let n = truth.len().min(predicted.len());
        if n == 0 {
            return 0.0;
        }
        match self {
            Self::Accuracy => {
                let hits = truth.iter().zip(predicted).filter(|(t, p)| t == p).count();
                hits as f64 / n as f64
            }
            Self::BalancedAccuracy => {
                let classes = truth.iter().copied().max().map_or(0, |m| m + 1);
                let mut support = vec![0usize; classes];
                let mut hits = vec![0usize; classes];
                for (&t, &p) in truth.iter().zip(predicted) {
                    support[t] += 1;
                    if t == p {
                        hits[t] += 1;
                    }
                }
                let recalls: Vec<f64> = support
                    .iter()
                    .zip(&hits)
                    .filter(|(s, _)| **s > 0)
                    .map(|(s, h)| *h as f64 / *s as f64)
                    .collect();
                recalls.iter().sum::<f64>() / recalls.len() as f64
            }
        }
    }
}

impl fmt::Display for Scorer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Scorer {
    type Err = HbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "accuracy" => Ok(Self::Accuracy),
            "balanced_accuracy" => Ok(Self::BalancedAccuracy),
            other => Err(HbError::Config(format!("unknown scorer {other}"))),
        }
    }
}

/// Seeded shuffle-split policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitPolicy {
    pub n_splits: usize,
    /// Fraction of rows held out in each split.
    pub test_size: f64,
    pub random_state: u64,
    /// Keep class proportions in both subsets.
    #[serde(default)]
    pub stratified: bool,
}

impl SplitPolicy {
    pub fn shuffle(n_splits: usize, test_size: f64, random_state: u64) -> Self {
        Self {
            n_splits,
            test_size,
            random_state,
            stratified: false,
        }
    }

    pub fn stratified(n_splits: usize, test_size: f64, random_state: u64) -> Self {
        Self {
            stratified: true,
            ..Self::shuffle(n_splits, test_size, random_state)
        }
    }

    pub fn validate(&self) -> HbResult<()> {
        if self.n_splits == 0 {
            return Err(HbError::Config("split policy needs at least one split".into()));
        }
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(HbError::Config(format!(
                "test_size must lie in (0, 1), got {}",
                self.test_size
            )));
        }
        Ok(())
    }
}

/// What the orchestrator does with a leaf whose artifacts exist but do not parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorruptPolicy {
    /// Abort the run, naming the offending file.
    #[default]
    Fail,
    /// Treat the leaf as not done and run it again.
    Rerun,
}

/// Benchmark-wide settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkSettings {
    /// Evaluations, or seconds when `time_based` is set.
    pub budget: f64,
    pub time_based: bool,
    pub scoring: Scorer,
    pub output: PathBuf,
    pub seeds: Vec<u64>,
    pub search_eval_splits: SplitPolicy,
    pub train_test_splits: SplitPolicy,
    pub on_corrupt: CorruptPolicy,
}

impl Default for BenchmarkSettings {
    fn default() -> Self {
        Self {
            budget: 50.0,
            time_based: false,
            scoring: Scorer::Accuracy,
            output: PathBuf::from("results"),
            seeds: vec![0],
            search_eval_splits: SplitPolicy::stratified(1, 0.25, 0),
            train_test_splits: SplitPolicy::shuffle(3, 0.10, 0),
            on_corrupt: CorruptPolicy::Fail,
        }
    }
}

impl BenchmarkSettings {
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            ..Self::default()
        }
    }

    pub fn with_iterations(mut self, count: u64) -> Self {
        self.budget = count as f64;
        self.time_based = false;
        self
    }

    pub fn with_time_limit(mut self, seconds: f64) -> Self {
        self.budget = seconds;
        self.time_based = true;
        self
    }

    pub fn with_seeds(mut self, seeds: impl IntoIterator<Item = u64>) -> Self {
        self.seeds = seeds.into_iter().collect();
        self
    }

    pub fn with_scoring(mut self, scoring: Scorer) -> Self {
        self.scoring = scoring;
        self
    }

    pub fn with_search_eval_splits(mut self, policy: SplitPolicy) -> Self {
        self.search_eval_splits = policy;
        self
    }

    pub fn with_train_test_splits(mut self, policy: SplitPolicy) -> Self {
        self.train_test_splits = policy;
        self
    }

    pub fn with_corrupt_policy(mut self, policy: CorruptPolicy) -> Self {
        self.on_corrupt = policy;
        self
    }

    pub fn axis(&self) -> BudgetAxis {
        BudgetAxis::from_time_based(self.time_based)
    }

    /// Nominal budget before any optimizer multiplier.
    pub fn budget(&self) -> Budget {
        Budget {
            amount: self.budget,
            axis: self.axis(),
        }
    }

    pub fn validate(&self) -> HbResult<()> {
        self.budget().validate()?;
        if self.seeds.is_empty() {
            return Err(HbError::Config("at least one seed is required".into()));
        }
        let mut seen = std::collections::HashSet::new();
        if let Some(seed) = self.seeds.iter().find(|s| !seen.insert(**s)) {
            return Err(HbError::Config(format!("seed {seed} is listed twice")));
        }
        self.search_eval_splits.validate()?;
        self.train_test_splits.validate()?;
        Ok(())
    }
}
