// Configuration evaluation and trajectory replay

use std::sync::atomic::{AtomicUsize, Ordering};

use hb_data::split_dataset;
use hb_optimizer::ConfigEvaluator;
use hb_types::{
    Configuration, Dataset, EvaluationError, HbResult, Scorer, SearchSpace, SplitPolicy,
    Trajectory,
};
use rayon::prelude::*;
use tracing::debug;

use crate::progress::{ProgressLevel, ProgressSink};
use crate::target::{fit_and_score, TargetAlgorithm};

/// Cross-validated loss of a configuration on the search subset.
///
/// The folds are drawn once, up front, so every configuration sees the same
/// folds. Folds are fitted in parallel.
pub struct CrossValidatedEvaluator<'a> {
    target: &'a dyn TargetAlgorithm,
    space: &'a SearchSpace,
    folds: Vec<(Dataset, Dataset)>,
    scorer: Scorer,
    progress: &'a dyn ProgressSink,
    expected: usize,
    evaluations: AtomicUsize,
}

impl<'a> CrossValidatedEvaluator<'a> {
    pub fn new(
        target: &'a dyn TargetAlgorithm,
        space: &'a SearchSpace,
        data: &Dataset,
        folds: &SplitPolicy,
        scorer: Scorer,
        progress: &'a dyn ProgressSink,
    ) -> HbResult<Self> {
        Ok(Self {
            target,
            space,
            folds: split_dataset(folds, data)?,
            scorer,
            progress,
            expected: 0,
            evaluations: AtomicUsize::new(0),
        })
    }

    /// Total shown by the evaluation progress level; 0 when unknown.
    pub fn with_expected_evaluations(mut self, expected: usize) -> Self {
        self.expected = expected;
        self
    }

    pub fn evaluations(&self) -> usize {
        self.evaluations.load(Ordering::Relaxed)
    }
}

impl ConfigEvaluator for CrossValidatedEvaluator<'_> {
    fn evaluate(&self, config: &Configuration, seed: u64) -> Result<f64, EvaluationError> {
        self.space
            .validate(config)
            .map_err(|e| EvaluationError::InvalidConfiguration {
                message: e.to_string(),
            })?;

        let losses = self
            .folds
            .par_iter()
            .map(|(train, test)| fit_and_score(self.target, seed, config, train, test, self.scorer))
            .collect::<Result<Vec<f64>, _>>()?;
        let loss = losses.iter().sum::<f64>() / losses.len() as f64;

        let done = self.evaluations.fetch_add(1, Ordering::Relaxed) + 1;
        self.progress.advance(ProgressLevel::Evaluations, done, self.expected);
        debug!("Evaluated {:?} under seed {}: loss {:.4}", config, seed, loss);
        Ok(loss)
    }
}

/// Re-score every incumbent of a search trajectory on held-out data.
///
/// Each entry is refitted on the whole search subset under every seed it was
/// evaluated with during search, and scored on `eval`. The mean loss replaces
/// the search loss; iteration and time stay as recorded. Entries without
/// recorded seeds are refitted under `leaf_seed`.
pub fn replay_trajectory(
    target: &dyn TargetAlgorithm,
    search: &Dataset,
    eval: &Dataset,
    scorer: Scorer,
    leaf_seed: u64,
    trajectory: &Trajectory,
) -> HbResult<Trajectory> {
    let mut losses = Vec::with_capacity(trajectory.len());
    for entry in trajectory.entries() {
        let seeds: Vec<u64> = if entry.seeds.is_empty() {
            vec![leaf_seed]
        } else {
            entry.seeds.iter().copied().collect()
        };
        let total = seeds
            .iter()
            .map(|&seed| fit_and_score(target, seed, &entry.configuration, search, eval, scorer))
            .sum::<Result<f64, _>>()?;
        losses.push(total / seeds.len() as f64);
    }
    Ok(trajectory.with_losses(&losses))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::RecordingProgress;
    use crate::target::Estimator;
    use hb_types::{DatasetMetadata, Entry, ParameterValue};

    /// Predicts `class` for every row, or fails when `class` is 99.
    #[derive(Debug)]
    struct ConstantTarget;

    struct Constant(usize);

    impl Estimator for Constant {
        fn fit(&mut self, _data: &Dataset) -> Result<(), EvaluationError> {
            Ok(())
        }

        fn predict(&self, data: &Dataset) -> Result<Vec<usize>, EvaluationError> {
            Ok(vec![self.0; data.n_rows()])
        }
    }

    impl TargetAlgorithm for ConstantTarget {
        fn name(&self) -> &str {
            "constant"
        }

        fn deterministic(&self) -> bool {
            true
        }

        fn search_space(&self) -> SearchSpace {
            SearchSpace::new().add_int("class", 0, 99, 0)
        }

        fn initialize(
            &self,
            _seed: u64,
            config: &Configuration,
            _metadata: &DatasetMetadata,
        ) -> Result<Box<dyn Estimator>, EvaluationError> {
            match config.get("class").and_then(ParameterValue::as_i64) {
                Some(99) => Err(EvaluationError::Estimator {
                    message: "unsupported".into(),
                }),
                Some(class) => Ok(Box::new(Constant(class as usize))),
                None => Err(EvaluationError::InvalidConfiguration {
                    message: "class missing".into(),
                }),
            }
        }
    }

    fn data() -> Dataset {
        let labels: Vec<usize> = (0..20).map(|i| usize::from(i % 4 == 0)).collect();
        let features = (0..20).map(|i| vec![i as f64]).collect();
        Dataset::new("1", "quarter", features, labels).unwrap()
    }

    fn config(class: i64) -> Configuration {
        let mut config = Configuration::new();
        config.insert("class".into(), ParameterValue::Int(class));
        config
    }

    #[test]
    fn test_cross_validated_loss_and_progress() {
        let target = ConstantTarget;
        let space = target.search_space();
        let progress = RecordingProgress::new();
        let evaluator = CrossValidatedEvaluator::new(
            &target,
            &space,
            &data(),
            &SplitPolicy::stratified(3, 0.2, 0),
            Scorer::Accuracy,
            &progress,
        )
        .unwrap();

        // stratified folds hold one positive in four rows
        assert!((evaluator.evaluate(&config(0), 0).unwrap() - 0.25).abs() < 1e-12);
        assert!((evaluator.evaluate(&config(1), 0).unwrap() - 0.75).abs() < 1e-12);
        assert_eq!(evaluator.evaluations(), 2);
        assert_eq!(progress.advances(ProgressLevel::Evaluations), 2);
    }

    #[test]
    fn test_evaluator_errors_reach_the_caller() {
        let target = ConstantTarget;
        let space = target.search_space();
        let evaluator = CrossValidatedEvaluator::new(
            &target,
            &space,
            &data(),
            &SplitPolicy::shuffle(2, 0.25, 0),
            Scorer::Accuracy,
            &crate::progress::NoProgress,
        )
        .unwrap();

        assert!(matches!(
            evaluator.evaluate(&config(99), 0),
            Err(EvaluationError::Estimator { .. })
        ));
        assert!(matches!(
            evaluator.evaluate(&config(100), 0),
            Err(EvaluationError::InvalidConfiguration { .. })
        ));
        assert_eq!(evaluator.evaluations(), 0);
    }

    #[test]
    fn test_replay_replaces_losses_only() {
        let search = Trajectory::new(vec![
            Entry::new(config(1), 0.9, 1.0, 0.1, [3, 4]),
            Entry::new(config(0), 0.3, 4.0, 0.7, []),
        ]);
        let data = data();
        let replayed =
            replay_trajectory(&ConstantTarget, &data, &data, Scorer::Accuracy, 7, &search).unwrap();

        assert_eq!(replayed.len(), 2);
        assert!((replayed.entries()[0].loss - 0.75).abs() < 1e-12);
        assert!((replayed.entries()[1].loss - 0.25).abs() < 1e-12);
        assert_eq!(replayed.entries()[1].at_iteration, 4.0);
        assert_eq!(replayed.entries()[0].seeds, search.entries()[0].seeds);
    }
}
