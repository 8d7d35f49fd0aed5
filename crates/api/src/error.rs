//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use common::{OperationResult, RunId};
use saga::{SagaError, StepError};

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// A run with the same workflow id is still in flight.
    Conflict(String),
    /// A run that the caller waited on finished unsuccessfully.
    RunFailed {
        workflow_id: String,
        run_id: RunId,
        error: SagaError,
        result: OperationResult,
    },
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, error_body(msg)),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, error_body(msg)),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, error_body(msg)),
            ApiError::RunFailed {
                workflow_id,
                run_id,
                error,
                result,
            } => {
                let status = saga_error_status(&error);
                let body = serde_json::json!({
                    "error": error.to_string(),
                    "workflow_id": workflow_id,
                    "run_id": run_id.to_string(),
                    "result": result,
                });
                (status, body)
            }
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, error_body(msg))
            }
        };

        (status, axum::Json(body)).into_response()
    }
}

fn error_body(message: String) -> serde_json::Value {
    serde_json::json!({ "error": message })
}

/// Precondition failures are the caller's fault; everything else is ours.
fn saga_error_status(err: &SagaError) -> StatusCode {
    match err.cause() {
        Some(StepError::MissingResourceId { .. }) => StatusCode::UNPROCESSABLE_ENTITY,
        Some(StepError::Timeout { .. })
        | Some(StepError::ScheduleTimeout { .. })
        | Some(StepError::DeadlineExceeded { .. }) => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
