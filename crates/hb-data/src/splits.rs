//! Seeded shuffle splits, optionally stratified by class.

use std::collections::BTreeMap;

use hb_types::{Dataset, DatasetError, HbResult, SplitPolicy};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Row indices of one train/test partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Generate `policy.n_splits` disjoint train/test partitions of `labels.len()` rows.
///
/// The same policy and labels always produce the same splits.
pub fn shuffle_splits(policy: &SplitPolicy, labels: &[usize], dataset: &str) -> HbResult<Vec<Split>> {
    policy.validate()?;
    let mut rng = ChaCha8Rng::seed_from_u64(policy.random_state);

    let splits: Vec<Split> = (0..policy.n_splits)
        .map(|_| {
            if policy.stratified {
                stratified_split(labels, policy.test_size, &mut rng)
            } else {
                plain_split(labels.len(), policy.test_size, &mut rng)
            }
        })
        .collect();

    if splits.iter().any(|s| s.train.is_empty() || s.test.is_empty()) {
        return Err(DatasetError::EmptySplit {
            dataset: dataset.to_string(),
        }
        .into());
    }
    Ok(splits)
}

/// Materialize each split as a (train, test) pair of datasets.
pub fn split_dataset(policy: &SplitPolicy, data: &Dataset) -> HbResult<Vec<(Dataset, Dataset)>> {
    shuffle_splits(policy, &data.labels, &data.name)?
        .iter()
        .map(|split| Ok((data.select(&split.train)?, data.select(&split.test)?)))
        .collect()
}

fn test_count(rows: usize, test_size: f64) -> usize {
    ((rows as f64) * test_size).ceil() as usize
}

fn plain_split(rows: usize, test_size: f64, rng: &mut ChaCha8Rng) -> Split {
    let mut indices: Vec<usize> = (0..rows).collect();
    indices.shuffle(rng);
    let n_test = test_count(rows, test_size).min(rows);
    let train = indices.split_off(n_test);
    Split {
        train,
        test: indices,
    }
}

fn stratified_split(labels: &[usize], test_size: f64, rng: &mut ChaCha8Rng) -> Split {
    let mut by_class: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (row, &label) in labels.iter().enumerate() {
        by_class.entry(label).or_default().push(row);
    }

    let mut train = Vec::with_capacity(labels.len());
    let mut test = Vec::new();
    for (_, mut rows) in by_class {
        rows.shuffle(rng);
        // keep at least one row of every class on the train side
        let n_test = (((rows.len() as f64) * test_size).round() as usize).min(rows.len() - 1);
        test.extend_from_slice(&rows[..n_test]);
        train.extend_from_slice(&rows[n_test..]);
    }
    train.shuffle(rng);
    test.shuffle(rng);
    Split { train, test }
}
