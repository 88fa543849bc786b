//! Query result caching

use arrow::record_batch::RecordBatch;
use ahash::AHashMap;

/// LRU cache of query results keyed by rendered SQL and parameters
pub(crate) struct QueryCache {
    entries: AHashMap<String, RecordBatch>,
    /// Least recently used first
    access_order: Vec<String>,
    capacity: usize,
}

impl QueryCache {
    /// Create a new cache; a capacity of zero disables caching
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            entries: AHashMap::new(),
            access_order: Vec::new(),
            capacity,
        }
    }

    pub(crate) fn get(&mut self, key: &str) -> Option<RecordBatch> {
        let batch = self.entries.get(key)?.clone();
        self.touch(key);
        Some(batch)
    }

    pub(crate) fn put(&mut self, key: String, batch: RecordBatch) {
        if self.capacity == 0 {
            return;
        }

        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            if !self.access_order.is_empty() {
                let evicted = self.access_order.remove(0);
                self.entries.remove(&evicted);
            }
        }

        self.entries.insert(key.clone(), batch);
        self.touch(&key);
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    fn touch(&mut self, key: &str) {
        self.access_order.retain(|k| k != key);
        self.access_order.push(key.to_string());
    }
}
