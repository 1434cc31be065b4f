// SPDX-License-Identifier: MIT

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Missing authentication token")]
    MissingToken,

    #[error("Invalid authentication token")]
    InvalidToken,

    #[error("Authentication token has expired")]
    ExpiredToken,

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("This account has been disabled")]
    AccountDisabled,

    #[error("Email verification required")]
    EmailNotVerified,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Username already exists")]
    UsernameExists,

    #[error("Email already registered")]
    EmailExists,

    #[error("Invalid verification code: {0}")]
    InvalidOobCode(String),

    #[error("Too many failed attempts. Please try again later")]
    RateLimited,

    #[error("Identity provider error: {0}")]
    Provider(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Classify an Identity Toolkit error message into an application error.
    ///
    /// The provider reports failures as a short upper-case code, sometimes
    /// followed by detail text (e.g. "WEAK_PASSWORD : Password should be...").
    pub fn from_provider_message(message: &str) -> AppError {
        let code = message.split([' ', ':']).next().unwrap_or(message).trim();

        match code {
            "EMAIL_NOT_FOUND" => {
                AppError::InvalidCredentials("No user found with this email address".to_string())
            }
            "INVALID_PASSWORD" => AppError::InvalidCredentials("Incorrect password".to_string()),
            "INVALID_LOGIN_CREDENTIALS" => {
                AppError::InvalidCredentials("Invalid email or password".to_string())
            }
            "USER_DISABLED" => AppError::AccountDisabled,
            "TOO_MANY_ATTEMPTS_TRY_LATER" => AppError::RateLimited,
            "EMAIL_EXISTS" => AppError::EmailExists,
            "INVALID_EMAIL" => AppError::BadRequest("Invalid email address".to_string()),
            "WEAK_PASSWORD" => AppError::BadRequest(
                "Password is too weak. Please use at least 6 characters".to_string(),
            ),
            "INVALID_OOB_CODE" | "EXPIRED_OOB_CODE" => {
                AppError::InvalidOobCode(message.to_string())
            }
            "INVALID_REFRESH_TOKEN" | "TOKEN_EXPIRED" | "INVALID_ID_TOKEN" | "USER_NOT_FOUND" => {
                AppError::InvalidToken
            }
            _ => AppError::Provider(message.to_string()),
        }
    }

    /// Whether this error came from the identity provider being unreachable
    /// or failing, as opposed to a definitive verdict about the request.
    pub fn is_provider_error(&self) -> bool {
        matches!(self, AppError::Provider(_))
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::MissingToken => (StatusCode::UNAUTHORIZED, "missing_token", None),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid_token", None),
            AppError::ExpiredToken => (StatusCode::UNAUTHORIZED, "expired_token", None),
            AppError::InvalidCredentials(msg) => (
                StatusCode::UNAUTHORIZED,
                "invalid_credentials",
                Some(msg.clone()),
            ),
            AppError::AccountDisabled => (StatusCode::FORBIDDEN, "account_disabled", None),
            AppError::EmailNotVerified => (
                StatusCode::FORBIDDEN,
                "email_not_verified",
                Some("Please verify your email to access this resource".to_string()),
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::UsernameExists => (StatusCode::BAD_REQUEST, "username_already_exists", None),
            AppError::EmailExists => (StatusCode::BAD_REQUEST, "email_already_exists", None),
            AppError::InvalidOobCode(_) => (
                StatusCode::BAD_REQUEST,
                "invalid_oob_code",
                Some(
                    "The link is invalid or has expired. Please request a new verification email"
                        .to_string(),
                ),
            ),
            AppError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "rate_limited", None),
            AppError::Provider(msg) => {
                tracing::error!(error = %msg, "Identity provider error");
                (StatusCode::BAD_GATEWAY, "provider_error", None)
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
