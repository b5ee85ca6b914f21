//! Route handlers

use super::ApiError;
use crate::context::AppContext;
use crate::metrics::BrowserMetrics;
use crate::storage::{Bookmark, HistoryEntry, HistoryStats, Library};
use crate::utils::StorageError;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use url::Url;

#[derive(Debug, Deserialize)]
pub struct PrefetchRequest {
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct PreloadQuery {
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VisitRequest {
    #[serde(default)]
    pub url: String,
    pub title: Option<String>,
}

/// Aggregates over the in-memory metric table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceSummary {
    pub tracked_resources: usize,
    pub average_load_time_ms: f64,
    pub cache_hit_ratio: f64,
    /// Sum of known sizes; unknown sizes are skipped
    pub total_bytes: u64,
    pub hot_cache_entries: u64,
    /// Bytes held by the hot cache, counted against its budget
    pub hot_cache_bytes: u64,
    pub in_flight: usize,
}

/// Accept a non-empty absolute http(s) URL
fn page_url(raw: &str) -> Result<Url, ApiError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ApiError::bad_request("url is required"));
    }
    let url = Url::parse(raw).map_err(|e| ApiError::bad_request(format!("invalid url {raw:?}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ApiError::bad_request(format!("unsupported scheme {:?}", url.scheme())));
    }
    Ok(url)
}

/// Run a library call off the async workers
async fn with_library<T, F>(library: &Library, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&Library) -> Result<T, StorageError> + Send + 'static,
{
    let library = library.clone();
    tokio::task::spawn_blocking(move || f(&library))
        .await
        .map_err(|e| StorageError::Task(e.to_string()))?
        .map_err(ApiError::from)
}

pub async fn prefetch(
    State(ctx): State<AppContext>,
    payload: Result<Json<PrefetchRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(request) = payload?;
    let url = page_url(&request.url)?;

    ctx.orchestrator.spawn_prefetch(url.to_string());
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "status": "prefetching", "url": url.as_str() })),
    ))
}

pub async fn metrics(State(ctx): State<AppContext>) -> Json<BrowserMetrics> {
    Json(ctx.recorder.sample_system())
}

pub async fn optimize(State(ctx): State<AppContext>) -> Result<Json<Value>, ApiError> {
    let hot_cache_entries = ctx.hot_cache().run_maintenance().await;
    let evicted = ctx.recorder.compact_snapshots().await?;
    log::info!("optimize: dropped {} snapshots, {} hot entries remain", evicted, hot_cache_entries);
    Ok(Json(json!({
        "status": "optimized",
        "evicted": evicted,
        "hot_cache_entries": hot_cache_entries,
    })))
}

pub async fn preload(
    State(ctx): State<AppContext>,
    query: Result<Query<PreloadQuery>, QueryRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Query(query) = query?;
    let url = page_url(query.url.as_deref().unwrap_or_default())?;

    let body = json!({ "status": "preloading", "url": url.as_str() });
    ctx.orchestrator.spawn_preload(url);
    Ok((StatusCode::ACCEPTED, Json(body)))
}

pub async fn sync_bookmarks(
    State(ctx): State<AppContext>,
    payload: Result<Json<Vec<Bookmark>>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(bookmarks) = payload?;
    let count = with_library(&ctx.library, move |library| library.sync_bookmarks(&bookmarks)).await?;
    Ok(Json(json!({ "status": "synced", "count": count })))
}

pub async fn list_bookmarks(State(ctx): State<AppContext>) -> Result<Json<Vec<Bookmark>>, ApiError> {
    with_library(&ctx.library, Library::bookmarks).await.map(Json)
}

pub async fn clear_bookmarks(State(ctx): State<AppContext>) -> Result<Json<Value>, ApiError> {
    let count = with_library(&ctx.library, Library::clear_bookmarks).await?;
    Ok(Json(json!({ "status": "cleared", "count": count })))
}

pub async fn add_history(
    State(ctx): State<AppContext>,
    payload: Result<Json<VisitRequest>, JsonRejection>,
) -> Result<Json<HistoryEntry>, ApiError> {
    let Json(visit) = payload?;
    if visit.url.trim().is_empty() {
        return Err(ApiError::bad_request("url is required"));
    }
    with_library(&ctx.library, move |library| {
        library.record_visit(visit.url.trim(), visit.title.as_deref())
    })
    .await
    .map(Json)
}

pub async fn clear_history(State(ctx): State<AppContext>) -> Result<Json<Value>, ApiError> {
    let count = with_library(&ctx.library, Library::clear_history).await?;
    Ok(Json(json!({ "status": "cleared", "count": count })))
}

pub async fn history_stats(State(ctx): State<AppContext>) -> Result<Json<HistoryStats>, ApiError> {
    with_library(&ctx.library, Library::history_stats).await.map(Json)
}

pub async fn performance(State(ctx): State<AppContext>) -> Json<PerformanceSummary> {
    let resources = ctx.recorder.table().snapshot();
    let tracked = resources.len();
    let (total_load, hits, total_bytes) = resources.iter().fold((0u64, 0usize, 0u64), |(load, hits, bytes), m| {
        (
            load.saturating_add(m.load_time),
            hits + usize::from(m.cache_hit),
            bytes.saturating_add(u64::try_from(m.size).unwrap_or(0)),
        )
    });
    let ratio = |n: f64| if tracked == 0 { 0.0 } else { n / tracked as f64 };

    Json(PerformanceSummary {
        tracked_resources: tracked,
        average_load_time_ms: ratio(total_load as f64),
        cache_hit_ratio: ratio(hits as f64),
        total_bytes,
        hot_cache_entries: ctx.hot_cache().entry_count(),
        hot_cache_bytes: ctx.hot_cache().weighted_size(),
        in_flight: ctx.orchestrator.in_flight(),
    })
}
