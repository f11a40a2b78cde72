//! Route handlers.
//!
//! Each handler parses at the boundary, delegates to [`RelayService`], and
//! shapes the response. No relay logic lives here.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::http::request::RequestIdExt;
use crate::http::response::{submit_outcome, ApiError};
use crate::http::server::AppState;
use crate::relay::request::{AttemptId, RelayRequest, RelayRequestBody};

/// Read the body straight off the bytes; numeric fields keep their raw text.
fn parse_body(body: &Bytes) -> Result<RelayRequest, ApiError> {
    let body: RelayRequestBody = serde_json::from_slice(body)
        .map_err(|e| ApiError::bad_request(format!("Invalid JSON body: {e}")))?;
    Ok(body.parse()?)
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Response {
    let report = state.service.health().await;
    if report.chain_reachable {
        Json(json!({
            "status": "online",
            "ethereum_connected": true,
            "relayer_address": report.relayer_address,
            "current_block": report.current_block,
        }))
        .into_response()
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "status": "online",
                "ethereum_connected": false,
                "relayer_address": report.relayer_address,
            })),
        )
            .into_response()
    }
}

/// `POST /submit-transaction`
pub async fn submit_transaction(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request = parse_body(&body).inspect_err(|e| {
        tracing::info!(request_id = %headers.request_id(), error = %e.message, "Rejected malformed relay request");
    })?;

    tracing::info!(
        request_id = %headers.request_id(),
        attempt_id = %request.attempt_id(),
        amount = %request.amount,
        "Relay request accepted for processing"
    );
    let attempt = state.service.submit(request).await?;
    Ok(submit_outcome(attempt.summary()))
}

/// `POST /verify-signature`
pub async fn verify_signature(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request = parse_body(&body)?;
    let verification = state
        .service
        .verify(&request)
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;
    Ok(Json(verification).into_response())
}

/// `GET /attempts/{id}`
pub async fn get_attempt(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id: AttemptId = id.parse()?;
    match state.service.status(&id) {
        Some(summary) => Ok(Json(summary).into_response()),
        None => Err(ApiError::not_found(format!("Attempt {id} not found"))),
    }
}
