//! Storage key layout for metric records
//!
//! Keys are `<kind>_<subject>_<nanos>` with the nanosecond part zero-padded
//! to 20 digits, so key order within one subject is chronological.

use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};

pub const METRICS_PREFIX: &str = "metrics_";
pub const REQUEST_PREFIX: &str = "request_";
pub const RESOURCE_PREFIX: &str = "resource_";

const STAMP_WIDTH: usize = 20;

/// Issues strictly increasing nanosecond stamps across threads
#[derive(Debug, Default)]
pub struct KeyClock {
    last: AtomicU64,
}

impl KeyClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wall-clock nanoseconds, bumped past the previous stamp when needed
    pub fn next(&self) -> u64 {
        let now = Utc::now()
            .timestamp_nanos_opt()
            .and_then(|n| u64::try_from(n).ok())
            .unwrap_or(0);
        let prev = self
            .last
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        now.max(prev + 1)
    }

    pub fn snapshot_key(&self) -> String {
        format!("{METRICS_PREFIX}{:0width$}", self.next(), width = STAMP_WIDTH)
    }

    pub fn resource_key(&self, url: &str) -> String {
        format!("{}{:0width$}", resource_subject(url), self.next(), width = STAMP_WIDTH)
    }

    pub fn request_key(&self, path: &str) -> String {
        format!("{REQUEST_PREFIX}{path}_{:0width$}", self.next(), width = STAMP_WIDTH)
    }
}

/// Prefix shared by every record of one resource URL
pub fn resource_subject(url: &str) -> String {
    format!("{RESOURCE_PREFIX}{url}_")
}

/// Whether `key` is `subject` followed by exactly one stamp
///
/// Guards against `resource_a_` also matching `resource_a_b_<stamp>`.
pub fn is_stamped(key: &str, subject: &str) -> bool {
    key.strip_prefix(subject)
        .is_some_and(|rest| rest.len() == STAMP_WIDTH && rest.bytes().all(|b| b.is_ascii_digit()))
}

/// The nanosecond stamp ending `key`, if it has one
pub fn stamp_of(key: &str) -> Option<u64> {
    let (_, stamp) = key.rsplit_once('_')?;
    if stamp.len() != STAMP_WIDTH {
        return None;
    }
    stamp.parse().ok()
}
