//! Per-style model cache
//!
//! Repeated requests for the same style should not pay checkpoint I/O and
//! reconciliation again. The cache is an explicit, injected dependency
//! owned by the pipeline: keyed by style name, process lifetime, never
//! invalidated (checkpoint files are treated as immutable once deployed).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::models::TransformerNet;

/// Cache of initialized models keyed by style name
pub trait ModelCache: Send + Sync {
    /// Look up a previously loaded model
    fn get(&self, style: &str) -> Option<Arc<TransformerNet>>;

    /// Store a loaded model under a style name
    fn insert(&self, style: &str, model: Arc<TransformerNet>);
}

/// In-memory cache with process lifetime
#[derive(Default)]
pub struct InMemoryCache {
    entries: Mutex<HashMap<String, Arc<TransformerNet>>>,
}

impl InMemoryCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached models
    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache lock poisoned").len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ModelCache for InMemoryCache {
    fn get(&self, style: &str) -> Option<Arc<TransformerNet>> {
        self.entries
            .lock()
            .expect("cache lock poisoned")
            .get(style)
            .cloned()
    }

    fn insert(&self, style: &str, model: Arc<TransformerNet>) {
        self.entries
            .lock()
            .expect("cache lock poisoned")
            .insert(style.to_string(), model);
    }
}

/// Cache that never retains anything; every load starts from disk
#[derive(Default)]
pub struct NoopCache;

impl ModelCache for NoopCache {
    fn get(&self, _style: &str) -> Option<Arc<TransformerNet>> {
        None
    }

    fn insert(&self, _style: &str, _model: Arc<TransformerNet>) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    fn model() -> Arc<TransformerNet> {
        Arc::new(TransformerNet::new(&Device::Cpu).unwrap())
    }

    #[test]
    fn test_in_memory_cache_roundtrip() {
        let cache = InMemoryCache::new();
        assert!(cache.get("mosaic").is_none());

        let m = model();
        cache.insert("mosaic", Arc::clone(&m));
        assert!(Arc::ptr_eq(&cache.get("mosaic").unwrap(), &m));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_in_memory_cache_is_keyed_by_style() {
        let cache = InMemoryCache::new();
        cache.insert("mosaic", model());
        assert!(cache.get("udnie").is_none());
    }

    #[test]
    fn test_noop_cache_retains_nothing() {
        let cache = NoopCache;
        cache.insert("mosaic", model());
        assert!(cache.get("mosaic").is_none());
    }
}
