//! Application context
//!
//! Wires the store, caches, recorder and orchestrator together and hands
//! cheap clones to the HTTP layer.

use crate::config::ServerConfig;
use crate::metrics::{MetricRecorder, MetricTable};
use crate::network::{BandwidthManager, ConnectionCounter, HotCache, NetworkClient};
use crate::prefetch::PrefetchOrchestrator;
use crate::storage::{KvStore, Library};
use crate::utils::Result;
use std::sync::Arc;
use tokio_util::task::TaskTracker;

/// Shared services for request handlers and background tasks
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub store: KvStore,
    pub recorder: Arc<MetricRecorder>,
    pub orchestrator: Arc<PrefetchOrchestrator>,
    pub connections: ConnectionCounter,
    pub library: Library,
}

impl AppContext {
    /// Open the configured store and build every service on top of it
    pub fn build(config: ServerConfig) -> Result<Self> {
        let store = match &config.db_path {
            Some(path) => {
                log::info!("opening store at {}", path.display());
                KvStore::open(path)?
            }
            None => {
                log::info!("using in-memory store");
                KvStore::in_memory()?
            }
        };
        Self::with_store(config, store)
    }

    /// Build services on an already opened store
    pub fn with_store(config: ServerConfig, store: KvStore) -> Result<Self> {
        let tasks = TaskTracker::new();
        let connections = ConnectionCounter::new();

        let recorder = Arc::new(
            MetricRecorder::new(store.clone(), tasks.clone(), connections.clone())
                .with_table(MetricTable::with_capacity(config.metric_table_capacity))
                .with_resource_retention(config.resource_retention)
                .with_snapshot_retention(config.snapshot_retention)
                .with_request_retention(config.request_retention),
        );

        let client = NetworkClient::new(config.fetch_timeout)?.with_max_body(config.max_resource_bytes);
        let hot_cache = HotCache::with_limits(config.hot_cache_ttl, config.hot_cache_max_bytes);
        let mut orchestrator = PrefetchOrchestrator::new(client, hot_cache, Arc::clone(&recorder), tasks)
            .with_slot_timeout(config.fetch_timeout);
        if config.gate_fetches {
            log::info!("gating resource fetches at {} concurrent", config.max_concurrent_fetches);
            orchestrator = orchestrator.with_gate(Arc::new(BandwidthManager::new(config.max_concurrent_fetches)));
        }

        Ok(Self {
            config: Arc::new(config),
            library: Library::new(store.clone()),
            store,
            recorder,
            orchestrator: Arc::new(orchestrator),
            connections,
        })
    }

    pub fn hot_cache(&self) -> &HotCache {
        self.orchestrator.hot_cache()
    }
}
