//! Authentication Error Types
//!
//! Centralized error handling for all authentication operations.
//! Authentication failures stay distinct internally but share one
//! wire representation.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// A single rejected request field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

/// Authentication errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    #[error("Email already registered")]
    EmailTaken,

    #[error("Username already taken")]
    UsernameTaken,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account is disabled")]
    AccountDisabled,

    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    #[error("Refresh token expired")]
    RefreshTokenExpired,

    #[error("Token already used")]
    TokenReuse,

    #[error("Invalid token")]
    InvalidToken,

    #[error("User not found")]
    UserNotFound,

    #[error("Validation failed")]
    Validation(Vec<FieldViolation>),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error")]
    Internal,
}

impl AuthError {
    /// Stable name of the variant, used as a structured log field
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::EmailTaken => "email_taken",
            AuthError::UsernameTaken => "username_taken",
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::AccountDisabled => "account_disabled",
            AuthError::InvalidRefreshToken => "invalid_refresh_token",
            AuthError::RefreshTokenExpired => "refresh_token_expired",
            AuthError::TokenReuse => "token_reuse",
            AuthError::InvalidToken => "invalid_token",
            AuthError::UserNotFound => "user_not_found",
            AuthError::Validation(_) => "validation",
            AuthError::Database(_) => "database",
            AuthError::Config(_) => "config",
            AuthError::Internal => "internal",
        }
    }

    /// Whether this is a user-facing authentication failure
    pub fn is_auth_failure(&self) -> bool {
        !matches!(
            self,
            AuthError::Validation(_)
                | AuthError::Database(_)
                | AuthError::Config(_)
                | AuthError::Internal
        )
    }
}

impl From<validator::ValidationErrors> for AuthError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut violations: Vec<FieldViolation> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| FieldViolation {
                    field: field.to_string(),
                    message: e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string()),
                })
            })
            .collect();
        violations.sort_by(|a, b| a.field.cmp(&b.field));

        AuthError::Validation(violations)
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if self.is_auth_failure() {
            tracing::info!(kind = self.kind(), "Authentication failure");
            return (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({
                    "error": "authentication_failed",
                    "message": self.to_string()
                })),
            )
                .into_response();
        }

        match self {
            AuthError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({
                    "message": "Validation failed",
                    "errors": errors
                })),
            )
                .into_response(),
            other => {
                tracing::error!(kind = other.kind(), error = %other, "Internal authentication error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(serde_json::json!({
                        "error": "internal_error",
                        "message": "An internal error occurred"
                    })),
                )
                    .into_response()
            }
        }
    }
}

/// Unreadable request bodies are reported like any other invalid input
impl From<JsonRejection> for AuthError {
    fn from(rejection: JsonRejection) -> Self {
        AuthError::Validation(vec![FieldViolation {
            field: "body".to_string(),
            message: rejection.body_text(),
        }])
    }
}

impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {:?}", err);
        AuthError::Database(err.to_string())
    }
}

impl From<argon2::password_hash::Error> for AuthError {
    fn from(err: argon2::password_hash::Error) -> Self {
        tracing::error!("Password hashing error: {:?}", err);
        AuthError::Internal
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        tracing::debug!("JWT error: {:?}", err);
        AuthError::InvalidToken
    }
}
