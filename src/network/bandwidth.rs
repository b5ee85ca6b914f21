//! Bandwidth manager
//!
//! A fixed-capacity gate on concurrent outbound fetches. `try_acquire` never
//! waits; `acquire` parks until a slot is released.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Default number of concurrent fetch slots
pub const DEFAULT_MAX_CONCURRENT: usize = 8;

/// Counting gate over outbound fetch slots
#[derive(Debug)]
pub struct BandwidthManager {
    capacity: usize,
    in_use: AtomicUsize,
    released: Notify,
}

impl BandwidthManager {
    /// Create a gate with `max_concurrent` slots (at least one)
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            capacity: max_concurrent.max(1),
            in_use: AtomicUsize::new(0),
            released: Notify::new(),
        }
    }

    /// Reserve a slot if one is free; never blocks
    pub fn try_acquire(&self) -> bool {
        self.in_use
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                (used < self.capacity).then_some(used + 1)
            })
            .is_ok()
    }

    /// Return a slot taken with `try_acquire`
    ///
    /// Releasing with nothing outstanding does nothing.
    pub fn release(&self) {
        let released = self
            .in_use
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| used.checked_sub(1))
            .is_ok();
        if released {
            self.released.notify_one();
        }
    }

    /// RAII form of `try_acquire`
    pub fn try_slot(self: &Arc<Self>) -> Option<Slot> {
        self.try_acquire().then(|| Slot {
            manager: Arc::clone(self),
        })
    }

    /// Wait until a slot is free and take it
    pub async fn acquire(self: &Arc<Self>) -> Slot {
        loop {
            let released = self.released.notified();
            if let Some(slot) = self.try_slot() {
                return slot;
            }
            released.await;
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::Acquire)
    }

    pub fn available(&self) -> usize {
        self.capacity - self.in_use()
    }
}

impl Default for BandwidthManager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENT)
    }
}

/// A held slot, released on drop
#[derive(Debug)]
pub struct Slot {
    manager: Arc<BandwidthManager>,
}

impl Drop for Slot {
    fn drop(&mut self) {
        self.manager.release();
    }
}
