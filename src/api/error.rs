//! API error types and HTTP response mapping

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

use crate::evaluator::EvalError;
use crate::snapshot::StateError;
use crate::utils::busy::GateError;

/// JSON error response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable message
    pub error: String,
    /// Stable machine-readable code
    pub code: String,
}

/// Errors returned by API handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    InvalidRequest(#[from] StateError),

    #[error("Process '{0}' is not allowed on this node")]
    Forbidden(String),

    #[error("{0}")]
    Evaluation(EvalError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Evaluation(EvalError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Evaluation(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable code for this error
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidRequest(_) => "INVALID_REQUEST",
            ApiError::Forbidden(_) => "PROCESS_FORBIDDEN",
            ApiError::Evaluation(EvalError::NotFound(_)) => "PROCESS_NOT_FOUND",
            ApiError::Evaluation(_) => "EVALUATION_FAILED",
            ApiError::Internal(_) => "INTERNAL",
        }
    }
}

impl From<GateError<EvalError>> for ApiError {
    fn from(error: GateError<EvalError>) -> Self {
        match error {
            GateError::Failed(e) => ApiError::Evaluation(e),
            GateError::Panicked(message) => ApiError::Internal(message),
            GateError::Cancelled => ApiError::Internal("evaluation cancelled".to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "Request failed");
        }

        let body = ErrorBody {
            error: self.to_string(),
            code: self.code().to_string(),
        };
        (status, Json(body)).into_response()
    }
}
