//! Mapping of workflow failures onto HTTP responses.

use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sf_catalog::TransitionError;
use sf_workflow::{StoreError, WorkflowError};

use crate::api_types::{ErrorResponse, GateRefusedResponse};

#[derive(Debug)]
pub enum ApiError {
    /// Missing or malformed `x-user-id`.
    Unauthenticated(String),
    /// Request body or query could not be interpreted.
    BadRequest(String),
    Workflow(WorkflowError),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Unauthenticated(m) => write!(f, "unauthenticated: {m}"),
            ApiError::BadRequest(m) => write!(f, "bad request: {m}"),
            ApiError::Workflow(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<WorkflowError> for ApiError {
    fn from(e: WorkflowError) -> Self {
        ApiError::Workflow(e)
    }
}

fn body(status: StatusCode, code: &str, error: String, details: Option<serde_json::Value>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error,
            code: code.to_string(),
            details,
        }),
    )
        .into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let msg = self.to_string();
        let e = match self {
            ApiError::Unauthenticated(_) => {
                return body(StatusCode::UNAUTHORIZED, "UNAUTHENTICATED", msg, None)
            }
            ApiError::BadRequest(_) => return body(StatusCode::BAD_REQUEST, "BAD_REQUEST", msg, None),
            ApiError::Workflow(e) => e,
        };

        match e {
            WorkflowError::Validation(v) => body(
                StatusCode::UNPROCESSABLE_ENTITY,
                "VALIDATION_ERROR",
                msg,
                serde_json::to_value(&v.rows).ok(),
            ),
            WorkflowError::AccessDenied(denied) => (
                StatusCode::FORBIDDEN,
                Json(GateRefusedResponse {
                    error: format!("GATE_REFUSED: {msg}"),
                    gate: denied.required.as_str().to_string(),
                }),
            )
                .into_response(),
            WorkflowError::SupplierNotApproved { .. } => (
                StatusCode::FORBIDDEN,
                Json(GateRefusedResponse {
                    error: format!("GATE_REFUSED: {msg}"),
                    gate: "approved_supplier".to_string(),
                }),
            )
                .into_response(),
            WorkflowError::Transition(TransitionError::Invalid { .. }) => {
                body(StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR", msg, None)
            }
            WorkflowError::Transition(TransitionError::Illegal { .. }) => {
                body(StatusCode::CONFLICT, "ILLEGAL_TRANSITION", msg, None)
            }
            WorkflowError::Order(_) => body(StatusCode::CONFLICT, "ORDER_REFUSED", msg, None),
            WorkflowError::Store(StoreError::NotFound { .. }) => {
                body(StatusCode::NOT_FOUND, "NOT_FOUND", msg, None)
            }
            WorkflowError::Store(StoreError::Conflict { .. }) => {
                body(StatusCode::CONFLICT, "CONFLICT", msg, None)
            }
            WorkflowError::Store(StoreError::Duplicate(_)) => {
                body(StatusCode::CONFLICT, "DUPLICATE", msg, None)
            }
            WorkflowError::Store(StoreError::Backend(_)) => {
                tracing::error!(error = %msg, "store failure");
                body(StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR", msg, None)
            }
        }
    }
}
