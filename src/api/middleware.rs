//! Per-request accounting
//!
//! Every request is counted as an active connection while it runs, tagged
//! with the `Server` header and appended to the request log.

use crate::context::AppContext;
use crate::metrics::ResourceMetrics;
use crate::network::USER_AGENT;
use axum::body::HttpBody;
use axum::extract::{Request, State};
use axum::http::header::{CONTENT_TYPE, SERVER};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use std::time::Instant;

pub async fn track_request(State(ctx): State<AppContext>, request: Request, next: Next) -> Response {
    let _connection = ctx.connections.enter();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let mut response = next.run(request).await;
    let elapsed = start.elapsed();
    response
        .headers_mut()
        .insert(SERVER, HeaderValue::from_static(USER_AGENT));

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok());
    let record = ResourceMetrics::completed(
        path.as_str(),
        elapsed,
        response.body().size_hint().exact(),
        content_type,
        false,
    );
    if let Err(e) = ctx.recorder.record_request(record).await {
        log::warn!("failed to log request {}: {}", path, e);
    }

    log::debug!("{} {} -> {} in {:?}", method, path, response.status(), elapsed);
    response
}
