//! Bounded table of the latest metrics per resource
//!
//! Holds at most `capacity` URLs. Writing a new URL into a full table evicts
//! the URL written longest ago; rewriting a URL moves it to the back.
//!
//! Each write takes a fresh generation number. The write order is a map from
//! generation to URL, so moving a URL to the back is a logarithmic remove
//! plus insert.

use super::ResourceMetrics;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Default number of URLs kept
pub const DEFAULT_TABLE_CAPACITY: usize = 1024;

#[derive(Default)]
struct Inner {
    /// URL -> (generation of its last write, record)
    entries: HashMap<String, (u64, ResourceMetrics)>,
    /// Generation -> URL, oldest first
    order: BTreeMap<u64, String>,
    next_generation: u64,
}

/// Shared, bounded URL -> latest metrics table
#[derive(Clone)]
pub struct MetricTable {
    inner: Arc<RwLock<Inner>>,
    capacity: usize,
}

impl MetricTable {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TABLE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
            capacity: capacity.max(1),
        }
    }

    /// Store `metrics` as the latest record for its URL
    pub fn insert(&self, metrics: ResourceMetrics) {
        let mut inner = self.inner.write();
        let generation = inner.next_generation;
        inner.next_generation += 1;
        let url = metrics.url.clone();

        match inner.entries.insert(url.clone(), (generation, metrics)) {
            Some((previous, _)) => {
                inner.order.remove(&previous);
            }
            None if inner.entries.len() > self.capacity => {
                if let Some((_, oldest)) = inner.order.pop_first() {
                    inner.entries.remove(&oldest);
                    log::debug!("metric table full, evicted {}", oldest);
                }
            }
            None => {}
        }
        inner.order.insert(generation, url);
    }

    pub fn get(&self, url: &str) -> Option<ResourceMetrics> {
        self.inner.read().entries.get(url).map(|(_, m)| m.clone())
    }

    /// Copy of every record, oldest write first
    pub fn snapshot(&self) -> Vec<ResourceMetrics> {
        let inner = self.inner.read();
        inner
            .order
            .values()
            .filter_map(|url| inner.entries.get(url).map(|(_, m)| m.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for MetricTable {
    fn default() -> Self {
        Self::new()
    }
}
