//! Metric recorder
//!
//! Persists resource, request and snapshot records into the durable store and
//! assembles `BrowserMetrics` from the host probe and live counters.

use super::keys::{self, KeyClock, METRICS_PREFIX, REQUEST_PREFIX};
use super::system::{HostProbe, SysinfoProbe};
use super::{BrowserMetrics, MetricTable, ResourceMetrics};
use crate::network::ConnectionCounter;
use crate::storage::KvStore;
use crate::utils::StorageError;
use chrono::Utc;
use parking_lot::Mutex;
use tokio_util::task::TaskTracker;

/// Records kept per resource URL unless configured otherwise
pub const DEFAULT_RESOURCE_RETENTION: usize = 32;
/// Snapshots kept unless configured otherwise (one hour at the default interval)
pub const DEFAULT_SNAPSHOT_RETENTION: usize = 720;
/// Request log rows kept unless configured otherwise
pub const DEFAULT_REQUEST_RETENTION: usize = 10_000;

/// The request log may overshoot its retention by `keep / REQUEST_SLACK` rows
/// before it is pruned back
const REQUEST_SLACK: usize = 8;

/// Builds and persists metric records
pub struct MetricRecorder {
    store: KvStore,
    table: MetricTable,
    keys: KeyClock,
    probe: Mutex<Box<dyn HostProbe + Send>>,
    connections: ConnectionCounter,
    tasks: TaskTracker,
    resource_retention: Option<usize>,
    snapshot_retention: Option<usize>,
    request_retention: Option<usize>,
}

impl MetricRecorder {
    /// Create a recorder reading task and connection counts from the given handles
    pub fn new(store: KvStore, tasks: TaskTracker, connections: ConnectionCounter) -> Self {
        Self {
            store,
            table: MetricTable::new(),
            keys: KeyClock::new(),
            probe: Mutex::new(Box::new(SysinfoProbe::new())),
            connections,
            tasks,
            resource_retention: Some(DEFAULT_RESOURCE_RETENTION),
            snapshot_retention: Some(DEFAULT_SNAPSHOT_RETENTION),
            request_retention: Some(DEFAULT_REQUEST_RETENTION),
        }
    }

    pub fn with_table(mut self, table: MetricTable) -> Self {
        self.table = table;
        self
    }

    pub fn with_probe(mut self, probe: impl HostProbe + Send + 'static) -> Self {
        self.probe = Mutex::new(Box::new(probe));
        self
    }

    /// Records kept per URL; `None` keeps everything
    pub fn with_resource_retention(mut self, keep: Option<usize>) -> Self {
        self.resource_retention = keep;
        self
    }

    /// Snapshots kept; `None` keeps everything
    pub fn with_snapshot_retention(mut self, keep: Option<usize>) -> Self {
        self.snapshot_retention = keep;
        self
    }

    /// Request log rows kept across all paths; `None` keeps everything
    pub fn with_request_retention(mut self, keep: Option<usize>) -> Self {
        self.request_retention = keep;
        self
    }

    /// Persist one resource fetch outcome and publish it to the metric table
    pub async fn record_resource(&self, metrics: ResourceMetrics) -> Result<String, StorageError> {
        self.table.insert(metrics.clone());

        let key = self.keys.resource_key(&metrics.url);
        let subject = keys::resource_subject(&metrics.url);
        let value = serde_json::to_vec(&metrics)?;
        let retention = self.resource_retention;

        let stored = key.clone();
        self.store
            .run(move |store| {
                store.put(&key, &value)?;
                if let Some(keep) = retention {
                    prune(store, &subject, keep)?;
                }
                Ok(())
            })
            .await?;

        log::debug!("recorded {} ({} ms)", metrics.url, metrics.load_time);
        Ok(stored)
    }

    /// Persist one aggregate snapshot
    pub async fn record_snapshot(&self, metrics: BrowserMetrics) -> Result<String, StorageError> {
        let key = self.keys.snapshot_key();
        let value = serde_json::to_vec(&metrics)?;
        let retention = self.snapshot_retention;

        let stored = key.clone();
        self.store
            .run(move |store| {
                store.put(&key, &value)?;
                if let Some(keep) = retention {
                    prune(store, METRICS_PREFIX, keep)?;
                }
                Ok(())
            })
            .await?;
        Ok(stored)
    }

    /// Append one served request to the request log
    ///
    /// With retention set, the oldest requests are dropped once the log grows
    /// past it by more than the slack.
    pub async fn record_request(&self, metrics: ResourceMetrics) -> Result<String, StorageError> {
        let key = self.keys.request_key(&metrics.url);
        let value = serde_json::to_vec(&metrics)?;
        let retention = self.request_retention;

        let stored = key.clone();
        self.store
            .run(move |store| {
                store.put(&key, &value)?;
                if let Some(keep) = retention {
                    if store.count_prefix(REQUEST_PREFIX)? > keep + keep / REQUEST_SLACK {
                        let dropped = prune_requests(store, keep)?;
                        log::debug!("pruned {} request log rows", dropped);
                    }
                }
                Ok(())
            })
            .await?;
        Ok(stored)
    }

    /// Current host utilization, activity counters and latest resource records
    ///
    /// Unavailable host readings are reported as 0.
    pub fn sample_system(&self) -> BrowserMetrics {
        let (memory, cpu) = {
            let mut probe = self.probe.lock();
            (
                probe.memory_used_pct().unwrap_or(0.0),
                probe.cpu_used_pct().unwrap_or(0.0),
            )
        };

        BrowserMetrics {
            memory_usage_pct: memory,
            cpu_usage_pct: cpu,
            cache_size: i64::try_from(self.tasks.len()).unwrap_or(i64::MAX),
            active_connections: self.connections.active(),
            resource_metrics: self.table.snapshot(),
            sampled_at: Utc::now(),
        }
    }

    /// Every stored record for `url`, oldest first
    pub async fn resource_history(&self, url: &str) -> Result<Vec<ResourceMetrics>, StorageError> {
        let subject = keys::resource_subject(url);
        self.store
            .run(move |store| {
                store
                    .scan_prefix(&subject)?
                    .into_iter()
                    .filter(|(key, _)| keys::is_stamped(key, &subject))
                    .map(|(_, value)| serde_json::from_slice(&value).map_err(StorageError::from))
                    .collect::<Result<Vec<ResourceMetrics>, _>>()
            })
            .await
    }

    /// Most recent stored record for `url`
    pub async fn latest_resource(&self, url: &str) -> Result<Option<ResourceMetrics>, StorageError> {
        Ok(self.resource_history(url).await?.pop())
    }

    /// Up to `limit` most recent snapshots, oldest first
    pub async fn snapshots(&self, limit: usize) -> Result<Vec<BrowserMetrics>, StorageError> {
        self.store
            .run(move |store| {
                let entries = store.scan_prefix(METRICS_PREFIX)?;
                let skip = entries.len().saturating_sub(limit);
                entries
                    .into_iter()
                    .skip(skip)
                    .map(|(_, value)| serde_json::from_slice(&value).map_err(StorageError::from))
                    .collect::<Result<Vec<BrowserMetrics>, _>>()
            })
            .await
    }

    pub async fn request_log_len(&self) -> Result<usize, StorageError> {
        self.store.run(|store| store.count_prefix(REQUEST_PREFIX)).await
    }

    /// Apply snapshot retention now, returning how many snapshots were dropped
    pub async fn compact_snapshots(&self) -> Result<usize, StorageError> {
        match self.snapshot_retention {
            Some(keep) => self.store.run(move |store| prune(store, METRICS_PREFIX, keep)).await,
            None => Ok(0),
        }
    }

    pub fn table(&self) -> &MetricTable {
        &self.table
    }
}

/// Drop all but the newest `keep` stamped records under `subject`
fn prune(store: &KvStore, subject: &str, keep: usize) -> Result<usize, StorageError> {
    let stamped: Vec<String> = store
        .keys_with_prefix(subject)?
        .into_iter()
        .filter(|key| keys::is_stamped(key, subject))
        .collect();
    if stamped.len() <= keep {
        return Ok(0);
    }
    store.delete_keys(&stamped[..stamped.len() - keep])
}

/// Drop all but the newest `keep` requests across every path
///
/// Keys sort by path first, so age comes from the trailing stamp.
fn prune_requests(store: &KvStore, keep: usize) -> Result<usize, StorageError> {
    let mut stamped: Vec<(u64, String)> = store
        .keys_with_prefix(REQUEST_PREFIX)?
        .into_iter()
        .filter_map(|key| keys::stamp_of(&key).map(|stamp| (stamp, key)))
        .collect();
    if stamped.len() <= keep {
        return Ok(0);
    }
    stamped.sort_unstable();
    let excess = stamped.len() - keep;
    let oldest: Vec<String> = stamped.into_iter().take(excess).map(|(_, key)| key).collect();
    store.delete_keys(&oldest)
}
