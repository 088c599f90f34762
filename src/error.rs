//! Authentication Error Types
//!
//! Centralized error handling for all authentication operations.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::collections::BTreeMap;

/// Field name to validation messages
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Why a refresh token was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RefreshTokenError {
    #[error("Invalid refresh token")]
    NotFound,

    #[error("Refresh token has been revoked")]
    Revoked,

    #[error("Refresh token expired")]
    Expired,

    #[error("User not found")]
    UserMissing,
}

impl RefreshTokenError {
    /// Machine-readable reason code
    pub fn reason(&self) -> &'static str {
        match self {
            RefreshTokenError::NotFound => "invalid",
            RefreshTokenError::Revoked => "revoked",
            RefreshTokenError::Expired => "expired",
            RefreshTokenError::UserMissing => "user_missing",
        }
    }
}

/// Why a password reset token was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ResetTokenError {
    #[error("Invalid token")]
    NotFound,

    #[error("Token already used")]
    AlreadyUsed,

    #[error("Token expired")]
    Expired,
}

impl ResetTokenError {
    /// Machine-readable reason code
    pub fn reason(&self) -> &'static str {
        match self {
            ResetTokenError::NotFound => "not_found",
            ResetTokenError::AlreadyUsed => "already_used",
            ResetTokenError::Expired => "expired",
        }
    }
}

/// Authentication errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Insufficient permissions")]
    Forbidden,

    #[error("Account is not active")]
    AccountNotActive,

    #[error(transparent)]
    RefreshToken(#[from] RefreshTokenError),

    #[error(transparent)]
    ResetToken(#[from] ResetTokenError),

    #[error("User not found")]
    UserNotFound,

    #[error("Email already registered")]
    EmailExists,

    #[error("Validation failed")]
    Validation(FieldErrors),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Internal error")]
    Internal,
}

impl AuthError {
    /// Validation error for a single field
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let mut fields = FieldErrors::new();
        fields.insert(field.to_string(), vec![message.into()]);
        AuthError::Validation(fields)
    }

    /// Report a validation failure under the field's wire name
    pub fn rename_field(self, from: &str, to: &str) -> Self {
        match self {
            AuthError::Validation(mut fields) => {
                if let Some(messages) = fields.remove(from) {
                    fields.insert(to.to_string(), messages);
                }
                AuthError::Validation(fields)
            }
            other => other,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            AuthError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "invalid_credentials",
                self.to_string(),
            ),
            AuthError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                self.to_string(),
            ),
            AuthError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "invalid_token",
                self.to_string(),
            ),
            AuthError::RefreshToken(reason) => (
                StatusCode::UNAUTHORIZED,
                reason.reason(),
                reason.to_string(),
            ),
            AuthError::Forbidden => (StatusCode::FORBIDDEN, "forbidden", self.to_string()),
            AuthError::AccountNotActive => (
                StatusCode::FORBIDDEN,
                "account_not_active",
                self.to_string(),
            ),
            // Uniform on the wire: used, expired and unknown look alike
            AuthError::ResetToken(_) => (
                StatusCode::BAD_REQUEST,
                "invalid_token",
                "Invalid or expired token".to_string(),
            ),
            AuthError::UserNotFound => (
                StatusCode::NOT_FOUND,
                "user_not_found",
                self.to_string(),
            ),
            AuthError::EmailExists => (StatusCode::CONFLICT, "email_exists", self.to_string()),
            AuthError::Validation(fields) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(serde_json::json!({
                        "error": "validation_error",
                        "message": self.to_string(),
                        "fields": fields
                    })),
                )
                    .into_response();
            }
            AuthError::Config(_)
            | AuthError::Database(_)
            | AuthError::Notification(_)
            | AuthError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "An internal error occurred".to_string(),
            ),
        };

        (
            status,
            Json(serde_json::json!({
                "error": error_code,
                "message": message
            })),
        )
            .into_response()
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

impl From<validator::ValidationErrors> for AuthError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let fields = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let messages = errs
                    .iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| e.code.to_string())
                    })
                    .collect();
                (field.to_string(), messages)
            })
            .collect();
        AuthError::Validation(fields)
    }
}
