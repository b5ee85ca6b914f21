//! HTTP error mapping

use crate::utils::{AccelError, StorageError};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// An error rendered as `{"error": message}` with a matching status
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<AccelError> for ApiError {
    fn from(err: AccelError) -> Self {
        let status = match &err {
            AccelError::Config(_) | AccelError::Parse(_) => StatusCode::BAD_REQUEST,
            AccelError::Network(_) => StatusCode::BAD_GATEWAY,
            AccelError::Storage(_) | AccelError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            log::error!("request failed: {}", err);
        }
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        AccelError::from(err).into()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        AccelError::Parse(rejection.body_text()).into()
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        AccelError::Parse(rejection.body_text()).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::FetchError;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AccelError::Config("x".into()), StatusCode::BAD_REQUEST),
            (AccelError::Parse("x".into()), StatusCode::BAD_REQUEST),
            (
                AccelError::Network(FetchError::network("http://x/", "refused")),
                StatusCode::BAD_GATEWAY,
            ),
            (
                AccelError::Storage(StorageError::Task("join".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                AccelError::Io(std::io::Error::other("disk")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status(), expected);
        }
    }
}
