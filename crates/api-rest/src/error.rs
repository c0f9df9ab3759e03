//! Mapping of pipeline failures onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use pdoc_core::DocumentError;
use serde::Serialize;
use std::time::Duration;
use utoipa::ToSchema;

/// Error body returned by every failing endpoint.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorRes {
    /// Pipeline stage the failure belongs to (`lookup`, `assembly`, `render`, `upload`,
    /// `download`, `configuration`) or `request` for problems with the request itself.
    pub stage: String,
    /// Machine-readable failure kind, e.g. `patient_not_found`.
    pub error: String,
    pub message: String,
}

/// Failure of a REST request.
#[derive(Debug)]
pub enum ApiError {
    /// The query or path could not be used as given.
    BadRequest(String),
    /// The document pipeline failed.
    Document(DocumentError),
    /// The request did not finish within the configured timeout.
    Timeout(Duration),
    /// The blocking task panicked or was cancelled.
    Internal(String),
}

impl From<DocumentError> for ApiError {
    fn from(err: DocumentError) -> Self {
        ApiError::Document(err)
    }
}

/// HTTP status for a pipeline failure.
pub fn status_for(err: &DocumentError) -> StatusCode {
    match err {
        DocumentError::PatientNotFound(_) | DocumentError::ArtifactNotFound { .. } => {
            StatusCode::NOT_FOUND
        }
        DocumentError::MissingIdentifier(_)
        | DocumentError::InvalidRecord(_)
        | DocumentError::ConflictingUnit { .. }
        | DocumentError::MalformedTimestamp { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        DocumentError::Source(_)
        | DocumentError::Scratch(_)
        | DocumentError::StorageUploadFailure { .. }
        | DocumentError::StorageRead(_) => StatusCode::BAD_GATEWAY,
        DocumentError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        DocumentError::Rendering(_) | DocumentError::InvalidConfig(_) | DocumentError::Catalog(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                ErrorRes {
                    stage: "request".into(),
                    error: "bad_request".into(),
                    message,
                },
            ),
            ApiError::Document(err) => (
                status_for(&err),
                ErrorRes {
                    stage: err.stage().to_string(),
                    error: err.kind().into(),
                    message: err.to_string(),
                },
            ),
            ApiError::Timeout(limit) => (
                StatusCode::GATEWAY_TIMEOUT,
                ErrorRes {
                    stage: "request".into(),
                    error: "timeout".into(),
                    message: format!("request did not complete within {}s", limit.as_secs_f64()),
                },
            ),
            ApiError::Internal(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorRes {
                    stage: "request".into(),
                    error: "internal".into(),
                    message,
                },
            ),
        };
        (status, Json(body)).into_response()
    }
}
