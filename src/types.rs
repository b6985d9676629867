// Shared type definitions and the search error taxonomy

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

/// Errors that can occur during a search pipeline invocation
///
/// Every step fails fast: the first error aborts the remaining pipeline
/// and crosses the service boundary as a structured `{kind, message}`
/// failure, never a panic.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Embedding service error: {0}")]
    EmbeddingService(String),

    #[error("Match error: {0}")]
    Match(String),

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl SearchError {
    /// Stable machine-readable kind for API consumers
    pub fn kind(&self) -> &'static str {
        match self {
            SearchError::EmbeddingService(_) => "embedding_service_error",
            SearchError::Match(_) => "match_error",
            SearchError::Fetch(_) => "fetch_error",
            SearchError::Validation(_) => "validation_error",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            SearchError::Validation(_) => StatusCode::BAD_REQUEST,
            SearchError::EmbeddingService(_) => StatusCode::BAD_GATEWAY,
            SearchError::Match(_) | SearchError::Fetch(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for SearchError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(serde_json::json!({
            "error": {
                "kind": self.kind(),
                "message": self.to_string(),
            }
        }));
        (status, body).into_response()
    }
}

/// Application-level errors for the HTTP surface outside the search pipeline
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Search(#[from] SearchError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Search(err) => err.into_response(),
            AppError::NotFound(msg) => error_response(StatusCode::NOT_FOUND, "not_found", &msg),
            AppError::InvalidRequest(msg) => {
                error_response(StatusCode::BAD_REQUEST, "invalid_request", &msg)
            }
            AppError::Database(err) => {
                tracing::error!(error = %err, "database error");
                error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "database_error",
                    "internal database error",
                )
            }
        }
    }
}

fn error_response(status: StatusCode, kind: &str, message: &str) -> Response {
    let body = Json(serde_json::json!({
        "error": { "kind": kind, "message": message }
    }));
    (status, body).into_response()
}

pub type SearchResult<T> = std::result::Result<T, SearchError>;
pub type AppResult<T> = std::result::Result<T, AppError>;
