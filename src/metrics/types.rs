//! Metric records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Outcome of one fetch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceMetrics {
    pub url: String,
    /// Milliseconds from request start to body received
    pub load_time: u64,
    /// Declared Content-Length, or -1 when the server sent none
    pub size: i64,
    #[serde(alias = "type", default)]
    pub content_type: String,
    #[serde(default)]
    pub cache_hit: bool,
    pub timestamp: DateTime<Utc>,
}

impl ResourceMetrics {
    /// Build a record for a fetch that just completed
    pub fn completed(
        url: impl Into<String>,
        elapsed: Duration,
        content_length: Option<u64>,
        content_type: Option<&str>,
        cache_hit: bool,
    ) -> Self {
        Self {
            url: url.into(),
            load_time: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            size: content_length
                .and_then(|len| i64::try_from(len).ok())
                .unwrap_or(-1),
            content_type: content_type.unwrap_or_default().to_string(),
            cache_hit,
            timestamp: Utc::now(),
        }
    }
}

/// Point-in-time aggregate of host and fetch activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowserMetrics {
    #[serde(rename = "memory_usage")]
    pub memory_usage_pct: f64,
    #[serde(rename = "cpu_usage")]
    pub cpu_usage_pct: f64,
    /// Tracked background tasks still running
    pub cache_size: i64,
    pub active_connections: i64,
    pub resource_metrics: Vec<ResourceMetrics>,
    pub sampled_at: DateTime<Utc>,
}
