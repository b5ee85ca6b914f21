//! Fetched response

use url::Url;

/// A received HTTP response
///
/// The body is complete unless `is_truncated` says otherwise, in which case
/// it holds at most the client's body limit.
#[derive(Debug, Clone)]
pub struct Response {
    url: Url,
    status: u16,
    content_type: Option<String>,
    content_length: Option<u64>,
    body: Vec<u8>,
    truncated: bool,
}

impl Response {
    /// Create a new response
    pub fn new(url: Url, status: u16, body: Vec<u8>) -> Self {
        Self {
            url,
            status,
            content_type: None,
            content_length: None,
            body,
            truncated: false,
        }
    }

    /// Mark the body as cut short at the size limit
    pub fn truncated(mut self) -> Self {
        self.truncated = true;
        self
    }

    /// Attach the declared media type and length
    pub fn with_headers(mut self, content_type: Option<String>, content_length: Option<u64>) -> Self {
        self.content_type = content_type;
        self.content_length = content_length;
        self
    }

    /// Final URL after redirects
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Get the status code
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Check if the response was successful (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Declared Content-Type, if any
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Declared Content-Length, if any
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    /// Whether the origin sent more than the client was willing to read
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_body(self) -> Vec<u8> {
        self.body
    }
}
