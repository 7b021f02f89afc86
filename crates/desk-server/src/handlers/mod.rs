//! Request handlers, split by entity.

pub mod members;
pub mod stocks;

use axum::Json;
use serde::Deserialize;

use desk_search::SearchMode;

use crate::error::ApiResult;

/// Query parameters shared by both search endpoints.
#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub mode: Option<String>,
}

impl SearchParams {
    /// `mode` defaults to hybrid; an unknown value is a validation error.
    pub(crate) fn mode(&self) -> ApiResult<SearchMode> {
        match self.mode.as_deref() {
            Some(raw) => Ok(raw.parse()?),
            None => Ok(SearchMode::default()),
        }
    }

    pub(crate) fn query(&self) -> &str {
        self.q.as_deref().unwrap_or_default()
    }
}

/// GET /health
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_mode_defaults_to_hybrid() {
        let params = SearchParams {
            q: Some("energy".into()),
            mode: None,
        };
        assert_eq!(params.mode().unwrap(), SearchMode::Hybrid);
    }

    #[test]
    fn test_unknown_mode_is_a_validation_error() {
        let params = SearchParams {
            q: Some("energy".into()),
            mode: Some("fuzzy".into()),
        };
        let error = params.mode().unwrap_err();
        assert_eq!(error.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(error.message.contains("fuzzy"));
    }

    #[test]
    fn test_missing_query_reads_as_empty() {
        let params = SearchParams {
            q: None,
            mode: None,
        };
        assert_eq!(params.query(), "");
    }
}
