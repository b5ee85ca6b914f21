//! Prefetch orchestrator
//!
//! Fetches a page, discovers its sub-resources and fans out one tracked task
//! per resource. Each task fetches (or serves from the hot cache) and records
//! a `ResourceMetrics`. Resource failures never fail the page call.

use super::ResourceDiscoverer;
use crate::metrics::{MetricRecorder, ResourceMetrics};
use crate::network::{BandwidthManager, CachedResource, HotCache, NetworkClient};
use crate::utils::FetchError;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::task::TaskTracker;
use url::Url;

/// Outcome of the page-level part of a prefetch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrefetchReport {
    pub page_url: String,
    /// Distinct references found in the document
    pub discovered: usize,
    /// Resource fetches launched after resolution
    pub scheduled: usize,
}

/// Everything one resource task needs, cloned into the task
#[derive(Clone)]
struct ResourceFetcher {
    client: NetworkClient,
    hot_cache: HotCache,
    recorder: Arc<MetricRecorder>,
    gate: Option<Arc<BandwidthManager>>,
    slot_timeout: Duration,
}

impl ResourceFetcher {
    async fn fetch_and_record(self, url: Url) {
        let slot = match &self.gate {
            Some(gate) => match tokio::time::timeout(self.slot_timeout, gate.acquire()).await {
                Ok(slot) => Some(slot),
                Err(_) => {
                    log::warn!("no fetch slot for {} within {:?}, skipping", url, self.slot_timeout);
                    return;
                }
            },
            None => None,
        };

        let start = Instant::now();
        let key = url.to_string();
        let metrics = match self.hot_cache.get(&key).await {
            Some(cached) => ResourceMetrics::completed(
                key,
                start.elapsed(),
                cached.content_length,
                cached.content_type.as_deref(),
                true,
            ),
            None => match self.client.fetch_url(url).await {
                Ok(response) => {
                    let elapsed = start.elapsed();
                    let content_type = response.content_type().map(str::to_string);
                    let content_length = response.content_length();
                    if response.is_truncated() {
                        log::debug!("{} is over the body limit, recording without caching", key);
                    } else {
                        self.hot_cache.insert(key.clone(), CachedResource::from(response)).await;
                    }
                    ResourceMetrics::completed(key, elapsed, content_length, content_type.as_deref(), false)
                }
                Err(e) => {
                    log::debug!("prefetch of {} abandoned: {}", key, e);
                    return;
                }
            },
        };
        drop(slot);

        if let Err(e) = self.recorder.record_resource(metrics).await {
            log::warn!("failed to record prefetch metrics: {}", e);
        }
    }

    async fn preload(&self, url: Url) -> Result<(), FetchError> {
        let key = url.to_string();
        let response = self.client.fetch_url(url).await?;
        if response.is_truncated() {
            log::warn!("not preloading {}: body over {} bytes", key, self.client.max_body());
            return Ok(());
        }
        self.hot_cache.insert(key, CachedResource::from(response)).await;
        Ok(())
    }
}

/// Drives page prefetches and owns their background tasks
pub struct PrefetchOrchestrator {
    fetcher: ResourceFetcher,
    discoverer: ResourceDiscoverer,
    tasks: TaskTracker,
}

impl PrefetchOrchestrator {
    /// Create an orchestrator whose tasks are tracked by `tasks`
    ///
    /// Resource fetches are ungated until `with_gate` is called.
    pub fn new(
        client: NetworkClient,
        hot_cache: HotCache,
        recorder: Arc<MetricRecorder>,
        tasks: TaskTracker,
    ) -> Self {
        Self {
            fetcher: ResourceFetcher {
                client,
                hot_cache,
                recorder,
                gate: None,
                slot_timeout: crate::network::DEFAULT_FETCH_TIMEOUT,
            },
            discoverer: ResourceDiscoverer::new(),
            tasks,
        }
    }

    /// Route every resource fetch through `gate`
    pub fn with_gate(mut self, gate: Arc<BandwidthManager>) -> Self {
        self.fetcher.gate = Some(gate);
        self
    }

    /// How long a gated resource waits for a slot before it is abandoned
    pub fn with_slot_timeout(mut self, timeout: Duration) -> Self {
        self.fetcher.slot_timeout = timeout;
        self
    }

    /// Fetch `page_url`, discover its resources and launch their fetches
    ///
    /// Returns once the page is fetched and parsed; resource fetches keep
    /// running in the background.
    pub async fn prefetch(&self, page_url: &str) -> Result<PrefetchReport, FetchError> {
        let page = Url::parse(page_url)
            .map_err(|e| FetchError::InvalidUrl(format!("{page_url}: {e}")))?;
        let response = self.fetcher.client.fetch_url(page).await?;
        if response.is_truncated() {
            log::debug!(
                "{} is over the body limit, discovering from its first {} bytes",
                page_url,
                response.body().len()
            );
        }
        let references = self.discoverer.discover(response.body())?;

        let resources = ResourceDiscoverer::resolve(response.url(), &references);
        for url in &resources {
            let fetcher = self.fetcher.clone();
            let url = url.clone();
            self.tasks.spawn(fetcher.fetch_and_record(url));
        }

        log::info!(
            "prefetching {} resources for {} ({} discovered)",
            resources.len(),
            page_url,
            references.len()
        );
        Ok(PrefetchReport {
            page_url: page_url.to_string(),
            discovered: references.len(),
            scheduled: resources.len(),
        })
    }

    /// Run `prefetch` as a tracked background task
    pub fn spawn_prefetch(self: &Arc<Self>, page_url: String) {
        let this = Arc::clone(self);
        self.tasks.spawn(async move {
            if let Err(e) = this.prefetch(&page_url).await {
                log::warn!("prefetch of {} failed: {}", page_url, e);
            }
        });
    }

    /// Prefetch several pages concurrently
    pub async fn prefetch_all(&self, urls: &[&str]) -> Vec<Result<PrefetchReport, FetchError>> {
        let futures: Vec<_> = urls.iter().map(|url| self.prefetch(url)).collect();
        futures::future::join_all(futures).await
    }

    /// Fetch a single URL into the hot cache without recording metrics
    pub async fn preload(&self, url: &str) -> Result<(), FetchError> {
        let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{url}: {e}")))?;
        self.fetcher.preload(parsed).await
    }

    /// Run `preload` as a tracked background task
    pub fn spawn_preload(&self, url: Url) {
        let fetcher = self.fetcher.clone();
        self.tasks.spawn(async move {
            let target = url.to_string();
            if let Err(e) = fetcher.preload(url).await {
                log::warn!("preload of {} failed: {}", target, e);
            }
        });
    }

    /// Tracked tasks still running
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Wait for every tracked task, giving up after `timeout`
    ///
    /// Returns whether all tasks finished. New tasks may be spawned again
    /// afterwards.
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.tasks.close();
        let drained = tokio::time::timeout(timeout, self.tasks.wait()).await.is_ok();
        self.tasks.reopen();
        drained
    }

    pub fn gate(&self) -> Option<&Arc<BandwidthManager>> {
        self.fetcher.gate.as_ref()
    }

    pub fn hot_cache(&self) -> &HotCache {
        &self.fetcher.hot_cache
    }
}
