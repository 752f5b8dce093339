use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use packer_core::{AuditError, PackingError, StockError};

/// JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// An error returned by a handler, rendered as `{ "error": ... }`.
#[derive(Debug)]
pub struct ApiError {
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

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message)
    }

    /// Error for a record named in the request body: the URL exists, so a
    /// missing record makes the body invalid rather than the route.
    pub fn from_body(err: impl Into<ApiError>) -> Self {
        let mut err = err.into();
        if err.status == StatusCode::NOT_FOUND {
            err.status = StatusCode::UNPROCESSABLE_ENTITY;
        }
        err
    }
}

impl From<StockError> for ApiError {
    fn from(err: StockError) -> Self {
        let status = match &err {
            StockError::NotFound { .. } => StatusCode::NOT_FOUND,
            StockError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            StockError::InvalidState { .. } | StockError::Conflict(_) => StatusCode::CONFLICT,
            StockError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl From<PackingError> for ApiError {
    fn from(err: PackingError) -> Self {
        match err {
            PackingError::Stock(e) => e.into(),
            other => Self::unprocessable(other.to_string()),
        }
    }
}

impl From<AuditError> for ApiError {
    fn from(err: AuditError) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to query audit events: {}", err),
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}
