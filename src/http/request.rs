//! Request identification.
//!
//! # Responsibilities
//! - Name the correlation header set by tower-http's request-id layers
//! - Read the request ID back out of headers for logging
//! - Open the per-request tracing span
//!
//! # Design Decisions
//! - A client-supplied `x-request-id` is kept; otherwise a UUID v4 is minted
//! - The ID is echoed on the response so clients can quote it

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, Request};
use tracing::Span;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Access to the correlation ID carried in headers.
pub trait RequestIdExt {
    fn request_id(&self) -> &str;
}

impl RequestIdExt for HeaderMap {
    fn request_id(&self) -> &str {
        self.get(&X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
    }
}

impl<B> RequestIdExt for Request<B> {
    fn request_id(&self) -> &str {
        self.headers().request_id()
    }
}

/// Span wrapping one HTTP request.
pub fn make_request_span(request: &Request<Body>) -> Span {
    tracing::info_span!(
        "http_request",
        request_id = %request.request_id(),
        method = %request.method(),
        path = %request.uri().path(),
    )
}
