//! Error types for the Binix acceleration backend

use thiserror::Error;

/// Main error type for backend operations
#[derive(Debug, Error)]
pub enum AccelError {
    /// Fetching a page or resource failed
    #[error("Network error: {0}")]
    Network(#[from] FetchError),
    /// A request body could not be decoded
    #[error("Parse error: {0}")]
    Parse(String),
    /// Durable store failure
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    /// Bad input or configuration value
    #[error("Configuration error: {0}")]
    Config(String),
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while fetching a page or one of its resources
#[derive(Debug, Error)]
pub enum FetchError {
    /// The URL could not be parsed or is not http(s)
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    /// Connection, TLS or timeout failure
    #[error("request to {url} failed: {reason}")]
    Network { url: String, reason: String },
    /// The server answered with a non-success status
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    /// The document could not be decoded
    #[error("failed to parse document: {0}")]
    Parse(String),
}

impl FetchError {
    /// Build a network error for `url`
    pub fn network(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::Network {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this is a connection-level failure
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. })
    }
}

/// Durable store errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
    /// The blocking task running the store call did not complete
    #[error("store task failed: {0}")]
    Task(String),
}

/// Convenience Result type for backend operations
pub type Result<T> = std::result::Result<T, AccelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_converts() {
        let err: AccelError = FetchError::network("http://x/p", "connection refused").into();
        assert!(matches!(err, AccelError::Network(ref e) if e.is_network()));
        assert_eq!(
            err.to_string(),
            "Network error: request to http://x/p failed: connection refused"
        );
    }

    #[test]
    fn test_status_display() {
        let err = FetchError::Status {
            url: "http://x/p".to_string(),
            status: 404,
        };
        assert_eq!(err.to_string(), "http://x/p returned HTTP 404");
        assert!(!err.is_network());
    }
}
