use std::cmp::Ordering;

use hb_types::{
    Configuration, Dataset, DatasetMetadata, EvaluationError, ParameterValue, SearchSpace,
};

use crate::target::{Estimator, TargetAlgorithm};

/// k-nearest-neighbours classifier.
///
/// Numeric columns are standardised with the training mean and deviation;
/// categorical columns contribute 0 when equal and 1 otherwise. `p` is only
/// active for the Minkowski metric.
#[derive(Debug, Default, Clone, Copy)]
pub struct KNearestNeighbors;

impl KNearestNeighbors {
    pub const NAME: &'static str = "knn";
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Metric {
    Minkowski(f64),
    Chebyshev,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Weights {
    Uniform,
    Distance,
}

fn invalid(message: impl Into<String>) -> EvaluationError {
    EvaluationError::InvalidConfiguration {
        message: message.into(),
    }
}

impl TargetAlgorithm for KNearestNeighbors {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn deterministic(&self) -> bool {
        true
    }

    fn search_space(&self) -> SearchSpace {
        SearchSpace::new()
            .add_log_int("n_neighbors", 1, 50, 5)
            .add_choice(
                "weights",
                vec!["uniform".into(), "distance".into()],
                "uniform",
            )
            .add_choice(
                "metric",
                vec!["minkowski".into(), "chebyshev".into()],
                "minkowski",
            )
            .add_int("p", 1, 2, 2)
            .add_condition("p", "metric", "minkowski")
    }

    fn initialize(
        &self,
        _seed: u64,
        config: &Configuration,
        _metadata: &DatasetMetadata,
    ) -> Result<Box<dyn Estimator>, EvaluationError> {
        let k = config
            .get("n_neighbors")
            .and_then(ParameterValue::as_i64)
            .filter(|k| *k >= 1)
            .ok_or_else(|| invalid("n_neighbors must be a positive integer"))?;
        let weights = match config.get("weights").and_then(ParameterValue::as_str) {
            Some("uniform") | None => Weights::Uniform,
            Some("distance") => Weights::Distance,
            Some(other) => return Err(invalid(format!("unknown weights {other}"))),
        };
        let metric = match config.get("metric").and_then(ParameterValue::as_str) {
            Some("minkowski") | None => {
                let p = config.get("p").and_then(ParameterValue::as_f64).unwrap_or(2.0);
                if p < 1.0 {
                    return Err(invalid("p must be at least 1"));
                }
                Metric::Minkowski(p)
            }
            Some("chebyshev") => Metric::Chebyshev,
            Some(other) => return Err(invalid(format!("unknown metric {other}"))),
        };

        Ok(Box::new(KnnModel {
            k: k as usize,
            weights,
            metric,
            train: None,
        }))
    }
}

struct Fitted {
    rows: Vec<Vec<f64>>,
    labels: Vec<usize>,
    categorical: Vec<bool>,
    mean: Vec<f64>,
    scale: Vec<f64>,
}

struct KnnModel {
    k: usize,
    weights: Weights,
    metric: Metric,
    train: Option<Fitted>,
}

impl Fitted {
    fn standardise(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .enumerate()
            .map(|(c, v)| if self.categorical[c] { *v } else { (v - self.mean[c]) / self.scale[c] })
            .collect()
    }

    fn distance(&self, metric: Metric, a: &[f64], b: &[f64]) -> f64 {
        let diffs = a.iter().zip(b).enumerate().map(|(c, (x, y))| {
            if x.is_nan() || y.is_nan() {
                0.0
            } else if self.categorical[c] {
                if x == y {
                    0.0
                } else {
                    1.0
                }
            } else {
                (x - y).abs()
            }
        });
        match metric {
            Metric::Chebyshev => diffs.fold(0.0, f64::max),
            Metric::Minkowski(p) => diffs.map(|d| d.powf(p)).sum::<f64>().powf(1.0 / p),
        }
    }
}

impl Estimator for KnnModel {
    fn fit(&mut self, data: &Dataset) -> Result<(), EvaluationError> {
        if data.n_rows() == 0 {
            return Err(EvaluationError::Estimator {
                message: "cannot fit on an empty dataset".into(),
            });
        }
        let columns = data.n_columns();
        let categorical: Vec<bool> = (0..columns).map(|c| data.is_categorical(c)).collect();
        let mut mean = vec![0.0; columns];
        let mut scale = vec![1.0; columns];
        for c in data.numeric.iter().copied() {
            let values: Vec<f64> = data.column(c).filter(|v| !v.is_nan()).collect();
            if values.is_empty() {
                continue;
            }
            let m = values.iter().sum::<f64>() / values.len() as f64;
            let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
            mean[c] = m;
            if var > 0.0 {
                scale[c] = var.sqrt();
            }
        }

        let mut fitted = Fitted {
            rows: Vec::new(),
            labels: data.labels.clone(),
            categorical,
            mean,
            scale,
        };
        fitted.rows = data.features.iter().map(|row| fitted.standardise(row)).collect();
        self.train = Some(fitted);
        Ok(())
    }

    fn predict(&self, data: &Dataset) -> Result<Vec<usize>, EvaluationError> {
        let train = self.train.as_ref().ok_or_else(|| EvaluationError::Estimator {
            message: "predict called before fit".into(),
        })?;
        let k = self.k.min(train.rows.len());
        let classes = train.labels.iter().copied().max().map_or(0, |m| m + 1);

        Ok(data
            .features
            .iter()
            .map(|row| {
                let query = train.standardise(row);
                let mut neighbours: Vec<(f64, usize)> = train
                    .rows
                    .iter()
                    .zip(&train.labels)
                    .map(|(x, &label)| (train.distance(self.metric, &query, x), label))
                    .collect();
                neighbours.sort_by(|a, b| a.0.total_cmp(&b.0));

                let mut votes = vec![0.0; classes];
                for &(distance, label) in &neighbours[..k] {
                    votes[label] += match self.weights {
                        Weights::Uniform => 1.0,
                        Weights::Distance if distance == 0.0 => 1e12,
                        Weights::Distance => 1.0 / distance,
                    };
                }
                // ties go to the lowest class index
                votes
                    .iter()
                    .enumerate()
                    .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(Ordering::Equal).then(b.0.cmp(&a.0)))
                    .map_or(0, |(class, _)| class)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blobs() -> Dataset {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for i in 0..10 {
            let jitter = i as f64 * 0.01;
            features.push(vec![0.0 + jitter, 0.0, 1.0]);
            labels.push(0);
            features.push(vec![5.0 + jitter, 5.0, 2.0]);
            labels.push(1);
        }
        Dataset::new("1", "blobs", features, labels)
            .unwrap()
            .with_categorical([2])
            .unwrap()
    }

    fn fit(config: &Configuration) -> Box<dyn Estimator> {
        let data = blobs();
        let mut model = KNearestNeighbors
            .initialize(0, config, &data.metadata())
            .unwrap();
        model.fit(&data).unwrap();
        model
    }

    #[test]
    fn test_default_configuration_separates_blobs() {
        let config = KNearestNeighbors.search_space().default_configuration();
        let model = fit(&config);
        let predicted = model.predict(&blobs()).unwrap();
        assert_eq!(predicted, blobs().labels);
    }

    #[test]
    fn test_p_is_conditional_on_metric() {
        let space = KNearestNeighbors.search_space();
        space.check().unwrap();

        let mut config = space.default_configuration();
        assert!(config.contains_key("p"));
        config.insert("metric".into(), "chebyshev".into());
        assert!(space.validate(&config).is_err());
        config.remove("p");
        space.validate(&config).unwrap();

        let model = fit(&config);
        assert_eq!(model.predict(&blobs()).unwrap(), blobs().labels);
    }

    #[test]
    fn test_distance_weights_and_large_k() {
        let mut config = KNearestNeighbors.search_space().default_configuration();
        config.insert("weights".into(), "distance".into());
        config.insert("n_neighbors".into(), ParameterValue::Int(50));
        let model = fit(&config);
        assert_eq!(model.predict(&blobs()).unwrap(), blobs().labels);
    }

    #[test]
    fn test_invalid_configuration() {
        let mut config = KNearestNeighbors.search_space().default_configuration();
        config.insert("n_neighbors".into(), ParameterValue::Int(0));
        let meta = blobs().metadata();
        assert!(KNearestNeighbors.initialize(0, &config, &meta).is_err());
    }

    #[test]
    fn test_predict_before_fit_fails() {
        let config = KNearestNeighbors.search_space().default_configuration();
        let model = KNearestNeighbors
            .initialize(0, &config, &blobs().metadata())
            .unwrap();
        assert!(model.predict(&blobs()).is_err());
    }
}
