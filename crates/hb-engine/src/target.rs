// Target algorithm interfaces
// A target algorithm turns a configuration into a fit-able estimator and
// describes the space its configurations come from.

use hb_types::{Configuration, Dataset, DatasetMetadata, EvaluationError, Scorer, SearchSpace};

/// A classifier produced from one configuration.
pub trait Estimator: Send {
    fn fit(&mut self, data: &Dataset) -> Result<(), EvaluationError>;

    /// Predicted class index for every row of `data`.
    fn predict(&self, data: &Dataset) -> Result<Vec<usize>, EvaluationError>;
}

/// A machine-learning algorithm whose hyperparameters are being optimized.
pub trait TargetAlgorithm: Send + Sync + std::fmt::Debug {
    /// Directory name in the results tree.
    fn name(&self) -> &str;

    /// True when fitting gives the same model regardless of the seed.
    fn deterministic(&self) -> bool;

    fn search_space(&self) -> SearchSpace;

    fn initialize(
        &self,
        seed: u64,
        config: &Configuration,
        metadata: &DatasetMetadata,
    ) -> Result<Box<dyn Estimator>, EvaluationError>;
}

/// Fit on `train`, predict `test`, and return the loss `1 - score`.
pub fn fit_and_score(
    target: &dyn TargetAlgorithm,
    seed: u64,
    config: &Configuration,
    train: &Dataset,
    test: &Dataset,
    scorer: Scorer,
) -> Result<f64, EvaluationError> {
    let mut estimator = target.initialize(seed, config, &train.metadata())?;
    estimator.fit(train)?;
    let predicted = estimator.predict(test)?;
    if predicted.len() != test.n_rows() {
        return Err(EvaluationError::Estimator {
            message: format!(
                "{} predicted {} rows for {} test rows",
                target.name(),
                predicted.len(),
                test.n_rows()
            ),
        });
    }
    Ok(1.0 - scorer.score(&test.labels, &predicted))
}
