//! Application-wide error types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing `{0}` header")]
    Unauthenticated(&'static str),

    #[error("Invalid `{0}` header")]
    Forbidden(&'static str),

    #[error("Custodian refused transfer: {0}")]
    Custodian(String),

    #[error(transparent)]
    Ledger(#[from] grassroots::Error),
}

pub type Result<T> = std::result::Result<T, GatewayError>;

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        use grassroots::Error as L;
        match self {
            GatewayError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            GatewayError::Forbidden(_) => StatusCode::FORBIDDEN,
            GatewayError::Ledger(err) => match err {
                L::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
                L::NotFound { .. } => StatusCode::NOT_FOUND,
                L::AlreadyExists { .. } | L::State { .. } => StatusCode::CONFLICT,
                L::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                L::InsufficientFunds { .. } => StatusCode::PAYMENT_REQUIRED,
                L::Unsupported(_) => StatusCode::NOT_IMPLEMENTED,
            },
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::Ledger(err) => err.code(),
            GatewayError::Unauthenticated(_) => "unauthenticated",
            GatewayError::Forbidden(_) => "forbidden",
            _ => "internal",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() && status != StatusCode::NOT_IMPLEMENTED {
            error!("request failed: {self}");
        }
        let body = ErrorResponse {
            error: self.to_string(),
            code: self.code(),
        };
        (status, Json(body)).into_response()
    }
}
