//! Authentication Configuration
//!
//! All configuration values are loaded from environment variables.
//! No hardcoded secrets or sensitive data.

use crate::error::AuthError;
use std::env;
use std::str::FromStr;

/// Upper bound on access token lifetime. There is no live revocation check on
/// access tokens, so this bounds residual validity after a security event.
pub const MAX_ACCESS_TOKEN_EXPIRATION: i64 = 900;

/// Authentication configuration loaded from environment
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// JWT secret key for signing tokens (from JWT_SECRET env var)
    pub jwt_secret: String,

    /// Access token expiration in seconds (from JWT_ACCESS_EXPIRATION env var)
    pub access_token_expiration: i64,

    /// Refresh token expiration in seconds (from JWT_REFRESH_EXPIRATION env var)
    pub refresh_token_expiration: i64,

    /// Password reset token expiration in seconds (from PASSWORD_RESET_EXPIRATION env var)
    pub password_reset_expiration: i64,

    /// JWT issuer (from JWT_ISSUER env var)
    pub jwt_issuer: String,

    /// JWT audience (from JWT_AUDIENCE env var)
    pub jwt_audience: String,

    /// Argon2 memory cost in KiB (from ARGON2_MEMORY_COST env var)
    pub argon2_memory_cost: u32,

    /// Argon2 time cost, the hash work factor (from ARGON2_TIME_COST env var)
    pub argon2_time_cost: u32,

    /// Argon2 parallelism (from ARGON2_PARALLELISM env var)
    pub argon2_parallelism: u32,

    /// Minimum password length (from MIN_PASSWORD_LENGTH env var)
    pub min_password_length: usize,

    /// Base URL of the dashboard, used to build reset links (from FRONTEND_URL env var)
    pub frontend_url: String,
}

impl AuthConfig {
    /// Load configuration from environment variables
    ///
    /// Fails if `JWT_SECRET` is missing or a numeric variable does not parse.
    pub fn from_env() -> Result<Self, AuthError> {
        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| AuthError::Config("JWT_SECRET must be set".to_string()))?;

        Ok(Self {
            jwt_secret,
            access_token_expiration: parse_var("JWT_ACCESS_EXPIRATION", 900)?, // 15 minutes
            refresh_token_expiration: parse_var("JWT_REFRESH_EXPIRATION", 604_800)?, // 7 days
            password_reset_expiration: parse_var("PASSWORD_RESET_EXPIRATION", 3600)?, // 1 hour
            jwt_issuer: env::var("JWT_ISSUER").unwrap_or_else(|_| "worldadmin".to_string()),
            jwt_audience: env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "worldadmin-api".to_string()),
            argon2_memory_cost: parse_var("ARGON2_MEMORY_COST", 65536)?, // 64 MiB
            argon2_time_cost: parse_var("ARGON2_TIME_COST", 3)?,
            argon2_parallelism: parse_var("ARGON2_PARALLELISM", 4)?,
            min_password_length: parse_var("MIN_PASSWORD_LENGTH", 8)?,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.jwt_secret.len() < 32 {
            return Err(AuthError::Config(
                "JWT_SECRET must be at least 32 characters".to_string(),
            ));
        }

        if self.access_token_expiration <= 0
            || self.access_token_expiration > MAX_ACCESS_TOKEN_EXPIRATION
        {
            return Err(AuthError::Config(format!(
                "JWT_ACCESS_EXPIRATION must be between 1 and {MAX_ACCESS_TOKEN_EXPIRATION} seconds"
            )));
        }

        if self.refresh_token_expiration <= self.access_token_expiration {
            return Err(AuthError::Config(
                "JWT_REFRESH_EXPIRATION must be greater than JWT_ACCESS_EXPIRATION".to_string(),
            ));
        }

        if self.password_reset_expiration <= 0 {
            return Err(AuthError::Config(
                "PASSWORD_RESET_EXPIRATION must be positive".to_string(),
            ));
        }

        if self.min_password_length < 8 {
            return Err(AuthError::Config(
                "MIN_PASSWORD_LENGTH must be at least 8".to_string(),
            ));
        }

        Ok(())
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, AuthError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AuthError::Config(format!("{name} has an invalid value"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: "t".repeat(48),
        access_token_expiration: 900,
        refresh_token_expiration: 604_800,
        password_reset_expiration: 3600,
        jwt_issuer: "worldadmin-test".to_string(),
        jwt_audience: "worldadmin-test-api".to_string(),
        // Cheap parameters keep the suite fast
        argon2_memory_cost: 1024,
        argon2_time_cost: 1,
        argon2_parallelism: 1,
        min_password_length: 8,
        frontend_url: "http://localhost:3000".to_string(),
    }
}
