//! API error type and the mappings from the service-layer errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use desk_enrich::EnrichError;
use desk_search::SearchError;
use desk_storage::StorageError;
use serde::Serialize;
use thiserror::Error;

/// Result type for handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// An error that renders as `{ "error": message }` with an HTTP status.
#[derive(Debug, Clone, Serialize, Error)]
pub struct ApiError {
    #[serde(skip)]
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// 422 Unprocessable Entity, for anything the caller can fix.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message)
    }

    /// 404 Not Found. The message should name the entity and id.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// 500 Internal Server Error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// 502 Bad Gateway, for upstream provider failures.
    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, message)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "[{}] {}", self.status, self.message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.message }));
        (self.status, body).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { .. } => Self::not_found(err.to_string()),
            StorageError::InvalidInput(_) => Self::validation(err.to_string()),
            _ => Self::internal(err.to_string()),
        }
    }
}

impl From<SearchError> for ApiError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::InvalidQuery(_) | SearchError::InvalidMode(_) => {
                Self::validation(err.to_string())
            }
            SearchError::Provider(_) => Self::bad_gateway(err.to_string()),
            SearchError::Storage(err) => err.into(),
        }
    }
}

impl From<EnrichError> for ApiError {
    fn from(err: EnrichError) -> Self {
        match err {
            EnrichError::InvalidInput(_) => Self::validation(err.to_string()),
            EnrichError::Storage(err) => err.into(),
            EnrichError::Embedding(_)
            | EnrichError::Extraction(_)
            | EnrichError::ExtractorUnavailable => Self::bad_gateway(err.to_string()),
        }
    }
}
