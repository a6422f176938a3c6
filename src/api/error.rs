use axum::{Json, http::StatusCode, response::IntoResponse};
use thiserror::Error;

use super::models::ErrorResponse;
use super::validation::RequestValidationError;
use crate::executor::{ExecuteError, MediaKind};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("cluster secret missing or invalid")]
    Unauthorized,
    #[error("{0}")]
    BadRequest(String),
    #[error("payload too large: {0} bytes")]
    PayloadTooLarge(usize),
    #[error("{kind} download failed")]
    DownloadFailed {
        kind: MediaKind,
        details: Option<String>,
    },
    #[error("no live workers registered")]
    NoWorkers,
    #[error("worker unreachable: {0}")]
    Upstream(String),
    #[error("worker is shutting down")]
    ShuttingDown,
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::DownloadFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::NoWorkers => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized => "UNAUTHORIZED",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            ApiError::DownloadFailed { .. } => "DOWNLOAD_FAILED",
            ApiError::NoWorkers => "NO_WORKERS",
            ApiError::Upstream(_) => "WORKER_UNREACHABLE",
            ApiError::ShuttingDown => "SHUTTING_DOWN",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();
        let details = match self {
            ApiError::DownloadFailed { details, .. } => details,
            _ => None,
        };

        let body = ErrorResponse {
            code,
            message,
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(value: serde_json::Error) -> Self {
        ApiError::BadRequest(format!("invalid JSON body: {value}"))
    }
}

impl From<RequestValidationError> for ApiError {
    fn from(value: RequestValidationError) -> Self {
        ApiError::BadRequest(value.to_string())
    }
}

impl From<ExecuteError> for ApiError {
    fn from(value: ExecuteError) -> Self {
        match value {
            ExecuteError::DownloadFailed {
                kind, diagnostics, ..
            } => ApiError::DownloadFailed {
                kind,
                details: diagnostics,
            },
            ExecuteError::Closed => ApiError::ShuttingDown,
        }
    }
}
