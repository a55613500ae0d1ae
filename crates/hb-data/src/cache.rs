use std::sync::Arc;

use hb_types::{Dataset, HbResult};
use parking_lot::{Mutex, RwLock};

/// Load-once holder for an immutable dataset snapshot.
///
/// Owned by a single provider. The first successful load is kept and every
/// later call returns the same `Arc`. A failed load leaves the slot empty.
#[derive(Debug, Default)]
pub struct SnapshotCache {
    slot: Mutex<Option<Arc<Dataset>>>,
    stats: RwLock<CacheStats>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_load<F>(&self, load: F) -> HbResult<Arc<Dataset>>
    where
        F: FnOnce() -> HbResult<Dataset>,
    {
        // held across the load so concurrent callers wait for one load
        let mut slot = self.slot.lock();
        if let Some(data) = slot.as_ref() {
            self.stats.write().hits += 1;
            return Ok(Arc::clone(data));
        }

        self.stats.write().misses += 1;
        let data = Arc::new(load()?);
        *slot = Some(Arc::clone(&data));
        Ok(data)
    }

    pub fn is_loaded(&self) -> bool {
        self.slot.lock().is_some()
    }

    pub fn clear(&self) {
        *self.slot.lock() = None;
        *self.stats.write() = CacheStats::default();
    }

    pub fn get_stats(&self) -> CacheStats {
        self.stats.read().clone()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        if self.hits + self.misses == 0 {
            0.0
        } else {
            self.hits as f64 / (self.hits + self.misses) as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hb_types::HbError;

    fn toy() -> HbResult<Dataset> {
        Dataset::new("1", "toy", vec![vec![0.0], vec![1.0]], vec![0, 1])
    }

    #[test]
    fn test_cache_loads_once() {
        let cache = SnapshotCache::new();
        let mut loads = 0;

        let first = cache
            .get_or_load(|| {
                loads += 1;
                toy()
            })
            .unwrap();
        let second = cache.get_or_load(|| panic!("loaded twice")).unwrap();

        assert_eq!(loads, 1);
        assert!(Arc::ptr_eq(&first, &second));
        let stats = cache.get_stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hit_rate(), 0.5);
    }

    #[test]
    fn test_failed_load_is_not_cached() {
        let cache = SnapshotCache::new();
        assert!(cache
            .get_or_load(|| Err(HbError::Internal("offline".into())))
            .is_err());
        assert!(!cache.is_loaded());
        cache.get_or_load(toy).unwrap();
        assert!(cache.is_loaded());

        cache.clear();
        assert!(!cache.is_loaded());
        assert_eq!(cache.get_stats(), CacheStats::default());
    }
}
