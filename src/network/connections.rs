//! Active connection accounting

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Shared count of requests currently being served
#[derive(Debug, Clone, Default)]
pub struct ConnectionCounter {
    active: Arc<AtomicI64>,
}

impl ConnectionCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one connection until the returned guard is dropped
    pub fn enter(&self) -> ConnectionGuard {
        self.active.fetch_add(1, Ordering::AcqRel);
        ConnectionGuard {
            active: Arc::clone(&self.active),
        }
    }

    pub fn active(&self) -> i64 {
        self.active.load(Ordering::Acquire)
    }
}

/// Decrements the counter on drop
#[derive(Debug)]
pub struct ConnectionGuard {
    active: Arc<AtomicI64>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
    }
}
