// responses/json.rs
use astra::{Body, ResponseBuilder};
use serde::Serialize;

use crate::errors::ServerError;
use crate::responses::ResultResp;

/// Serializes `value` as the response body with the given status.
pub fn json_response<T: Serialize>(status: u16, value: &T) -> ResultResp {
    let body = serde_json::to_vec(value)
        .map_err(|e| ServerError::internal(format!("serialize response failed: {e}")))?;

    ResponseBuilder::new()
        .status(status)
        .header("Content-Type", mime::APPLICATION_JSON.as_ref())
        .body(Body::from(body))
        .map_err(|e| ServerError::internal(format!("build response failed: {e}")))
}

pub fn ok_json<T: Serialize>(value: &T) -> ResultResp {
    json_response(200, value)
}

pub fn no_content() -> ResultResp {
    ResponseBuilder::new()
        .status(204)
        .body(Body::empty())
        .map_err(|e| ServerError::internal(format!("build response failed: {e}")))
}
