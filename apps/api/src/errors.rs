use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Not configured: {0}")]
    NotConfigured(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// How a failure should be presented to the person who triggered it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// The request itself is wrong; fix the input.
    Input,
    /// Network trouble or a slow dependency; the user may retry by hand.
    Transient,
    /// An operator has to grant access or fix rules.
    Permission,
    /// The deployment is missing infrastructure; nothing a user can do.
    Configuration,
}

impl FailureClass {
    pub fn guidance(self) -> &'static str {
        match self {
            FailureClass::Input => "Check the submitted values and try again.",
            FailureClass::Transient => {
                "The service could not be reached in time. Check your connection and retry the action."
            }
            FailureClass::Permission => {
                "This account is not allowed to perform the action. Ask the account owner or an operator to grant access."
            }
            FailureClass::Configuration => {
                "The service is not fully configured. An operator must finish setting up the backing services."
            }
        }
    }
}

impl AppError {
    pub fn class(&self) -> FailureClass {
        match self {
            AppError::NotFound(_) | AppError::Validation(_) => FailureClass::Input,
            AppError::Unauthorized | AppError::Forbidden(_) => FailureClass::Permission,
            AppError::Timeout(_) => FailureClass::Transient,
            AppError::NotConfigured(_) => FailureClass::Configuration,
            AppError::Database(e) if is_transient_db_error(e) => FailureClass::Transient,
            AppError::Database(_) | AppError::Internal(_) => FailureClass::Configuration,
        }
    }
}

fn is_transient_db_error(e: &sqlx::Error) -> bool {
    matches!(
        e,
        sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) | sqlx::Error::PoolClosed
    )
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let class = self.class();
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Authentication required".to_string(),
            ),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
            AppError::Timeout(msg) => {
                tracing::warn!("Timeout: {msg}");
                (
                    StatusCode::GATEWAY_TIMEOUT,
                    "TIMEOUT",
                    "Request timed out. Please check your internet connection and try again."
                        .to_string(),
                )
            }
            AppError::NotConfigured(msg) => {
                tracing::error!("Not configured: {msg}");
                (StatusCode::SERVICE_UNAVAILABLE, "NOT_CONFIGURED", msg.clone())
            }
            AppError::Database(e) if is_transient_db_error(e) => {
                tracing::warn!("Database unavailable: {e}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "DATABASE_UNAVAILABLE",
                    "The database is temporarily unavailable".to_string(),
                )
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
                "class": class,
                "guidance": class.guidance(),
            }
        }));

        (status, body).into_response()
    }
}
