//! Built-in target algorithms.

use std::sync::Arc;

use crate::target::TargetAlgorithm;

pub mod knn;

pub use knn::KNearestNeighbors;

/// Names accepted by [`by_name`].
pub const BUILTIN_TARGETS: &[&str] = &[KNearestNeighbors::NAME];

/// Look up a built-in target algorithm by its results-tree name.
pub fn by_name(name: &str) -> Option<Arc<dyn TargetAlgorithm>> {
    match name {
        KNearestNeighbors::NAME => Some(Arc::new(KNearestNeighbors)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        for name in BUILTIN_TARGETS {
            assert_eq!(by_name(name).map(|t| t.name().to_string()).as_deref(), Some(*name));
        }
        assert!(by_name("xgboost").is_none());
    }
}
