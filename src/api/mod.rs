//! HTTP API
//!
//! | Route | Handler |
//! |---|---|
//! | `POST /api/prefetch` | start a background page prefetch |
//! | `GET /api/metrics` | current `BrowserMetrics` |
//! | `POST /api/optimize` | hot cache maintenance and snapshot retention |
//! | `POST /api/cache/preload?url=` | warm the hot cache with one URL |
//! | `POST /api/bookmarks/sync`, `GET`/`DELETE /api/bookmarks` | bookmarks |
//! | `POST`/`DELETE /api/history`, `GET /api/history/stats` | history |
//! | `GET /api/performance` | aggregates over recent fetches |

mod error;
mod handlers;
mod middleware;

pub use error::ApiError;
pub use handlers::PerformanceSummary;

use crate::context::AppContext;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

/// Build the router with request accounting applied to every route
pub fn router(ctx: AppContext) -> Router {
    Router::new()
        .route("/api/prefetch", post(handlers::prefetch))
        .route("/api/metrics", get(handlers::metrics))
        .route("/api/optimize", post(handlers::optimize))
        .route("/api/cache/preload", post(handlers::preload))
        .route("/api/bookmarks/sync", post(handlers::sync_bookmarks))
        .route(
            "/api/bookmarks",
            get(handlers::list_bookmarks).delete(handlers::clear_bookmarks),
        )
        .route(
            "/api/history",
            post(handlers::add_history).delete(handlers::clear_history),
        )
        .route("/api/history/stats", get(handlers::history_stats))
        .route("/api/performance", get(handlers::performance))
        .layer(DefaultBodyLimit::max(ctx.config.body_limit))
        .layer(axum::middleware::from_fn_with_state(
            ctx.clone(),
            middleware::track_request,
        ))
        .with_state(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::metrics::keys::REQUEST_PREFIX;
    use crate::network::USER_AGENT;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn context() -> AppContext {
        AppContext::build(ServerConfig::default()).unwrap()
    }

    fn json_request(method: Method, uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn empty_request(method: Method, uri: &str) -> Request<Body> {
        Request::builder().method(method).uri(uri).body(Body::empty()).unwrap()
    }

    async fn call(ctx: &AppContext, request: Request<Body>) -> (StatusCode, Value) {
        let response = router(ctx.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    #[tokio::test]
    async fn test_prefetch_rejects_empty_url() {
        let ctx = context();
        let (status, body) = call(&ctx, json_request(Method::POST, "/api/prefetch", r#"{"url":""}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("url"));
        assert_eq!(ctx.orchestrator.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_prefetch_rejects_malformed_json() {
        let ctx = context();
        for payload in ["{not json", r#"{"url": 5}"#, "[]"] {
            let (status, body) = call(&ctx, json_request(Method::POST, "/api/prefetch", payload)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "payload {payload}");
            assert!(body["error"].is_string());
        }
        assert_eq!(ctx.orchestrator.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_prefetch_rejects_missing_content_type() {
        let ctx = context();
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/prefetch")
            .body(Body::from(r#"{"url":"http://example.com/"}"#))
            .unwrap();
        let (status, _) = call(&ctx, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(ctx.orchestrator.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_prefetch_accepted() {
        let ctx = context();
        let (status, body) = call(
            &ctx,
            json_request(Method::POST, "/api/prefetch", r#"{"url":"http://127.0.0.1:1/"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body, json!({ "status": "prefetching", "url": "http://127.0.0.1:1/" }));
        assert!(ctx.orchestrator.drain(std::time::Duration::from_secs(10)).await);
    }

    #[tokio::test]
    async fn test_server_header_and_request_log() {
        let ctx = context();
        let response = router(ctx.clone())
            .oneshot(empty_request(Method::GET, "/api/metrics"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::SERVER], USER_AGENT);

        let keys = ctx.store.keys_with_prefix(REQUEST_PREFIX).unwrap();
        assert_eq!(keys.len(), 1);
        assert!(keys[0].starts_with("request_/api/metrics_"));
        assert_eq!(ctx.connections.active(), 0);
    }

    #[tokio::test]
    async fn test_metrics_shape() {
        let ctx = context();
        let (status, body) = call(&ctx, empty_request(Method::GET, "/api/metrics")).await;
        assert_eq!(status, StatusCode::OK);
        for field in ["memory_usage", "cpu_usage", "cache_size", "active_connections", "resource_metrics"] {
            assert!(body.get(field).is_some(), "missing {field}");
        }
        // The metrics request itself is in flight while sampled
        assert_eq!(body["active_connections"], 1);
    }

    #[tokio::test]
    async fn test_preload_requires_url() {
        let ctx = context();
        let (status, _) = call(&ctx, empty_request(Method::POST, "/api/cache/preload")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = call(&ctx, empty_request(Method::POST, "/api/cache/preload?url=")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(ctx.orchestrator.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_optimize() {
        let ctx = context();
        let (status, body) = call(&ctx, empty_request(Method::POST, "/api/optimize")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "optimized");
        assert_eq!(body["evicted"], 0);
    }

    #[tokio::test]
    async fn test_bookmarks_roundtrip() {
        let ctx = context();
        let payload = r#"[{"url":"https://a.example/","title":"A"},{"url":"https://b.example/"}]"#;
        let (status, body) = call(&ctx, json_request(Method::POST, "/api/bookmarks/sync", payload)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "synced", "count": 2 }));

        let (_, listed) = call(&ctx, empty_request(Method::GET, "/api/bookmarks")).await;
        assert_eq!(listed.as_array().unwrap().len(), 2);

        let (_, cleared) = call(&ctx, empty_request(Method::DELETE, "/api/bookmarks")).await;
        assert_eq!(cleared["count"], 2);
    }

    #[tokio::test]
    async fn test_history_and_stats() {
        let ctx = context();
        for _ in 0..2 {
            let (status, _) = call(
                &ctx,
                json_request(Method::POST, "/api/history", r#"{"url":"https://a.example/","title":"A"}"#),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }
        let (status, _) = call(&ctx, json_request(Method::POST, "/api/history", r#"{"url":" "}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, stats) = call(&ctx, empty_request(Method::GET, "/api/history/stats")).await;
        assert_eq!(stats["total_entries"], 1);
        assert_eq!(stats["total_visits"], 2);
        assert_eq!(stats["most_visited"], "https://a.example/");
        // Three earlier requests were logged before this one ran
        assert_eq!(stats["request_log_entries"], 3);
    }

    #[tokio::test]
    async fn test_performance_empty() {
        let ctx = context();
        let (status, body) = call(&ctx, empty_request(Method::GET, "/api/performance")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tracked_resources"], 0);
        assert_eq!(body["cache_hit_ratio"], 0.0);
        assert_eq!(body["hot_cache_bytes"], 0);
        assert_eq!(body["in_flight"], 0);
    }
}
