//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service and its mapping
//! onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use interview_core::ports::{AuthError, PortError};
use serde_json::json;
use tracing::error;

use crate::adapters::StoreError;
use crate::config::ConfigError;
use crate::engine::EngineError;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Token issuance or validation failed.
    #[error("Token error: {0}")]
    Auth(#[from] AuthError),

    /// Represents an error from the store adapter.
    #[error("Store Error: {0}")]
    Store(#[from] StoreError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InvalidInput(message) => ApiError::BadRequest(message),
            EngineError::Port(port) => ApiError::Port(port),
        }
    }
}

impl ApiError {
    /// Attaches the session id to a not-found port error so the response can
    /// carry it.
    pub fn for_session(self, session_id: &str) -> Self {
        match self {
            ApiError::Port(PortError::NotFound(_)) => ApiError::SessionNotFound(session_id.to_string()),
            other => other,
        }
    }
}

fn error_body(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => error_body(StatusCode::BAD_REQUEST, message),
            ApiError::SessionNotFound(id) => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "Session not found", "id": id })),
            )
                .into_response(),
            ApiError::Port(PortError::NotFound(message)) => error_body(StatusCode::NOT_FOUND, message),
            ApiError::Port(PortError::Conflict(message)) => error_body(StatusCode::CONFLICT, message),
            ApiError::Unauthorized
            | ApiError::Port(PortError::Unauthorized)
            | ApiError::Auth(
                AuthError::Malformed(_)
                | AuthError::BadSignature
                | AuthError::BadAlgorithm
                | AuthError::Expired
                | AuthError::NotYetValid,
            ) => StatusCode::UNAUTHORIZED.into_response(),
            ApiError::Forbidden => StatusCode::FORBIDDEN.into_response(),
            other => {
                error!(error = %other, "Request failed");
                error_body(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn not_found_carries_the_session_id() {
        let err = ApiError::Port(PortError::NotFound("x".into())).for_session("abc");
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(response).await,
            json!({ "error": "Session not found", "id": "abc" })
        );
    }

    #[tokio::test]
    async fn token_failures_are_unauthorized_with_empty_body() {
        let response = ApiError::Auth(AuthError::Expired).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.is_empty());
    }

    #[tokio::test]
    async fn unconfigured_secret_is_a_server_error() {
        let response = ApiError::Auth(AuthError::Config).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn engine_errors_map_to_request_errors() {
        let err: ApiError = EngineError::InvalidInput("duration".into()).into();
        assert!(matches!(err, ApiError::BadRequest(_)));
        let err: ApiError = EngineError::Port(PortError::Conflict("done".into())).into();
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }
}
