// errors.rs
use astra::Response;
use thiserror::Error;

/// Errors raised by the service layer or by downstream layers (DB, JSON).
///
/// The HTTP layer turns each variant into a status code plus a
/// machine-readable `code()`; nothing here is retried automatically.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Conflict ({code}): {detail}")]
    Conflict { code: &'static str, detail: String },

    #[error("Validation failed ({code}): {detail}")]
    Validation { code: &'static str, detail: String },

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Database Error: {0}")]
    DbError(String),

    #[error("Internal Server Error: {0}")]
    InternalError(String),
}

// Type alias commonly used by route handlers.
pub type ResultResp = Result<Response, ServerError>;

impl ServerError {
    pub fn conflict(code: &'static str, detail: impl Into<String>) -> Self {
        ServerError::Conflict {
            code,
            detail: detail.into(),
        }
    }

    pub fn validation(code: &'static str, detail: impl Into<String>) -> Self {
        ServerError::Validation {
            code,
            detail: detail.into(),
        }
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        ServerError::InternalError(detail.into())
    }

    pub fn status(&self) -> u16 {
        match self {
            ServerError::NotFound(_) => 404,
            ServerError::Conflict { .. } => 409,
            ServerError::Validation { .. } | ServerError::BadRequest(_) => 400,
            ServerError::Unauthorized => 401,
            ServerError::Forbidden(_) => 403,
            ServerError::DbError(_) | ServerError::InternalError(_) => 500,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ServerError::NotFound(_) => "NOT_FOUND",
            ServerError::Conflict { code, .. } => code,
            ServerError::Validation { code, .. } => code,
            ServerError::Unauthorized => "UNAUTHORIZED",
            ServerError::Forbidden(_) => "FORBIDDEN",
            ServerError::BadRequest(_) => "BAD_REQUEST",
            ServerError::DbError(_) => "DB_ERROR",
            ServerError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    /// Detail text safe to show a client. Server-side failures stay generic.
    pub fn public_detail(&self) -> String {
        match self {
            ServerError::NotFound(what) => format!("{what} finnes ikke"),
            ServerError::Conflict { detail, .. } | ServerError::Validation { detail, .. } => {
                detail.clone()
            }
            ServerError::Unauthorized => "Mangler gyldig token".to_string(),
            ServerError::Forbidden(detail) | ServerError::BadRequest(detail) => detail.clone(),
            ServerError::DbError(_) | ServerError::InternalError(_) => {
                "Intern feil i tjenesten".to_string()
            }
        }
    }
}

impl From<rusqlite::Error> for ServerError {
    fn from(e: rusqlite::Error) -> Self {
        ServerError::DbError(e.to_string())
    }
}

impl From<serde_json::Error> for ServerError {
    fn from(e: serde_json::Error) -> Self {
        ServerError::BadRequest(format!("invalid json: {e}"))
    }
}
