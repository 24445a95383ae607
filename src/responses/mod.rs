pub mod errors;
pub mod json;

pub use crate::errors::ResultResp;
pub use errors::error_response;
pub use json::{json_response, no_content, ok_json};
