//! HTTP client implementation

use super::Response;
use crate::utils::FetchError;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use std::time::Duration;
use url::Url;

/// User agent sent with every fetch
pub const USER_AGENT: &str = concat!("Binix/", env!("CARGO_PKG_VERSION"));

/// Default bound on a single fetch, connect through body
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Default cap on how much of one body is read (16 MiB)
pub const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// HTTP client with connection pooling
///
/// Cheap to clone; clones share the underlying pool.
#[derive(Debug, Clone)]
pub struct NetworkClient {
    client: reqwest::Client,
    max_body: usize,
}

impl NetworkClient {
    /// Create a client whose requests give up after `timeout`
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FetchError::network("<client>", e))?;
        Ok(Self {
            client,
            max_body: DEFAULT_MAX_BODY_BYTES,
        })
    }

    /// Stop reading bodies after `bytes`
    pub fn with_max_body(mut self, bytes: usize) -> Self {
        self.max_body = bytes;
        self
    }

    pub fn max_body(&self) -> usize {
        self.max_body
    }

    /// Fetch `url`, which must be an absolute http(s) URL
    pub async fn fetch(&self, url: &str) -> Result<Response, FetchError> {
        let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{url}: {e}")))?;
        self.fetch_url(parsed).await
    }

    /// Fetch an already parsed URL and read its body
    ///
    /// Bodies over the client's limit come back truncated: empty when the
    /// declared length is already too large, cut at the limit otherwise.
    pub async fn fetch_url(&self, url: Url) -> Result<Response, FetchError> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl(url.to_string()));
        }

        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| FetchError::network(url.as_str(), describe(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let headers = response.headers();
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let content_length: Option<u64> = headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok());
        let final_url = response.url().clone();

        let limit = self.max_body;
        if let Some(len) = content_length.filter(|&len| len > limit as u64) {
            log::debug!("{} declares {} bytes, over the {} byte limit", url, len, limit);
            return Ok(Response::new(final_url, status.as_u16(), Vec::new())
                .with_headers(content_type, content_length)
                .truncated());
        }

        let mut body = Vec::with_capacity(content_length.map_or(0, |len| len as usize));
        let mut truncated = false;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| FetchError::network(url.as_str(), describe(&e)))?
        {
            let room = limit - body.len();
            if chunk.len() > room {
                body.extend_from_slice(&chunk[..room]);
                truncated = true;
                break;
            }
            body.extend_from_slice(&chunk);
        }

        let response = Response::new(final_url, status.as_u16(), body).with_headers(content_type, content_length);
        if truncated {
            log::debug!("{} exceeded the {} byte limit while streaming", url, limit);
            return Ok(response.truncated());
        }
        Ok(response)
    }
}

fn describe(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "timed out".to_string()
    } else {
        err.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> NetworkClient {
        NetworkClient::new(Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_reads_headers_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/style.css"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("body{}", "text/css"))
            .expect(1)
            .mount(&server)
            .await;

        let response = client()
            .fetch(&format!("{}/style.css", server.uri()))
            .await
            .unwrap();
        assert!(response.is_success());
        assert_eq!(response.content_type(), Some("text/css"));
        assert_eq!(response.body(), b"body{}");
    }

    #[tokio::test]
    async fn test_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = client().fetch(&format!("{}/missing", server.uri())).await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        let err = client().fetch("http://127.0.0.1:1/").await.unwrap_err();
        assert!(err.is_network(), "unexpected error: {err:?}");
    }

    #[tokio::test]
    async fn test_rejects_relative_and_non_http() {
        assert!(matches!(client().fetch("a.png").await, Err(FetchError::InvalidUrl(_))));
        assert!(matches!(
            client().fetch("ftp://example.com/file").await,
            Err(FetchError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_declared_oversize_body_is_not_read() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/big.png"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(vec![7u8; 4096], "image/png"))
            .mount(&server)
            .await;

        let client = client().with_max_body(1024);
        let response = client.fetch(&format!("{}/big.png", server.uri())).await.unwrap();
        assert!(response.is_truncated());
        assert!(response.body().is_empty());
        assert_eq!(response.content_length(), Some(4096));
        assert_eq!(response.content_type(), Some("image/png"));
    }

    #[tokio::test]
    async fn test_body_at_limit_is_complete() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(vec![7u8; 1024], "image/png"))
            .mount(&server)
            .await;

        let response = client().with_max_body(1024).fetch(&server.uri()).await.unwrap();
        assert!(!response.is_truncated());
        assert_eq!(response.body().len(), 1024);
    }

    #[tokio::test]
    async fn test_undeclared_oversize_body_is_cut_at_limit() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        // Chunked transfer, so no Content-Length to reject up front
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await.unwrap();

            let mut reply = b"HTTP/1.1 200 OK\r\ncontent-type: application/octet-stream\r\ntransfer-encoding: chunked\r\n\r\n".to_vec();
            for _ in 0..8 {
                reply.extend_from_slice(b"200\r\n");
                reply.extend_from_slice(&[1u8; 512]);
                reply.extend_from_slice(b"\r\n");
            }
            reply.extend_from_slice(b"0\r\n\r\n");
            let _ = socket.write_all(&reply).await;
        });

        let response = client()
            .with_max_body(1000)
            .fetch(&format!("http://{addr}/stream"))
            .await
            .unwrap();
        assert!(response.is_truncated());
        assert_eq!(response.body().len(), 1000);
        assert_eq!(response.content_length(), None);
    }

    #[tokio::test]
    async fn test_timeout_is_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let client = NetworkClient::new(Duration::from_millis(100)).unwrap();
        let err = client.fetch(&server.uri()).await.unwrap_err();
        assert!(err.is_network());
    }
}
