//! Response shaping.
//!
//! # Responsibilities
//! - Map relay outcomes to HTTP status codes
//! - Render every error as `{"error": message}`, plus attempt context when known
//!
//! # Design Decisions
//! - Caller mistakes (malformed input, insufficient balance) are 400
//! - Chain, revert and internal failures are 500
//! - Messages never carry key material; they come from typed errors only

use alloy::primitives::TxHash;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::relay::attempt::{AttemptSummary, RelayState};
use crate::relay::error::{RelayError, ValidationError};
use crate::relay::request::AttemptId;

pub const SUBMITTED_MESSAGE: &str = "Transaction submitted to blockchain";

/// Body of a successful or still-running submission.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitResponse {
    pub status: &'static str,
    pub attempt_id: AttemptId,
    pub state: RelayState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permit_tx_hash: Option<TxHash>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_tx_hash: Option<TxHash>,
    pub message: &'static str,
}

/// Status and body for a submission, whatever state it reached.
pub fn submit_outcome(summary: AttemptSummary) -> Response {
    if let Some(error) = &summary.error {
        let status = if error.kind.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        return ApiError {
            status,
            message: error.message.clone(),
            attempt_id: Some(summary.attempt_id),
            state: Some(summary.state),
        }
        .into_response();
    }

    let (status, label) = if summary.state.is_success() {
        (StatusCode::OK, "success")
    } else {
        (StatusCode::ACCEPTED, "pending")
    };
    let body = SubmitResponse {
        status: label,
        attempt_id: summary.attempt_id,
        state: summary.state,
        permit_tx_hash: summary.permit_tx_hash,
        transfer_tx_hash: summary.transfer_tx_hash,
        message: SUBMITTED_MESSAGE,
    };
    (status, Json(body)).into_response()
}

#[derive(Debug, Clone, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    attempt_id: Option<AttemptId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<RelayState>,
}

/// An error response.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub attempt_id: Option<AttemptId>,
    pub state: Option<RelayState>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            attempt_id: None,
            state: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        if err.kind().is_client_error() {
            Self::bad_request(err.to_string())
        } else {
            Self::internal(err.to_string())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.message,
            attempt_id: self.attempt_id,
            state: self.state,
        };
        (self.status, Json(body)).into_response()
    }
}
