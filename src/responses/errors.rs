// responses/errors.rs
use astra::{Body, Response, ResponseBuilder};
use serde_json::json;

use crate::errors::ServerError;

/// Turns a `ServerError` into `{"status", "code", "detail"}`.
///
/// Server-side failures are logged with their full message; the client only
/// sees a generic detail for those.
pub fn error_response(err: &ServerError) -> Response {
    let status = err.status();
    if status >= 500 {
        tracing::error!(error = %err, "request failed");
    } else {
        tracing::debug!(error = %err, code = err.code(), "request rejected");
    }

    let body = json!({
        "status": status,
        "code": err.code(),
        "detail": err.public_detail(),
    });

    ResponseBuilder::new()
        .status(status)
        .header("Content-Type", mime::APPLICATION_JSON.as_ref())
        .body(Body::from(body.to_string()))
        .unwrap_or_else(|_| Response::new(Body::empty()))
}
