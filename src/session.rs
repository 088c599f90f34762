//! Session Service
//!
//! Issues, validates and revokes refresh tokens. A refresh token is reused
//! for every access token renewal until it expires or is revoked; it is not
//! rotated on use.

use crate::error::{AuthError, RefreshTokenError};
use crate::models::{RefreshToken, User};
use crate::store::{RefreshTokenStore, UserStore};
use crate::token::{digest, generate_opaque_token};

use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

pub struct SessionService {
    tokens: Arc<dyn RefreshTokenStore>,
    users: Arc<dyn UserStore>,
    lifetime: Duration,
}

impl SessionService {
    pub fn new(
        tokens: Arc<dyn RefreshTokenStore>,
        users: Arc<dyn UserStore>,
        lifetime_secs: i64,
    ) -> Self {
        Self {
            tokens,
            users,
            lifetime: Duration::seconds(lifetime_secs),
        }
    }

    /// Mint and record a refresh token. The returned plaintext is the only copy.
    pub async fn generate_refresh_token(&self, user_id: Uuid) -> Result<String, AuthError> {
        let token = generate_opaque_token();
        let now = Utc::now();

        self.tokens
            .insert(RefreshToken {
                id: Uuid::new_v4(),
                user_id,
                token_digest: digest(&token),
                expires_at: now + self.lifetime,
                revoked_at: None,
                created_at: now,
            })
            .await?;

        tracing::debug!(user_id = %user_id, "Refresh token issued");
        Ok(token)
    }

    /// Resolve a refresh token to the live user record
    pub async fn validate_refresh_token(&self, token: &str) -> Result<User, AuthError> {
        let stored = self
            .tokens
            .find_by_digest(&digest(token))
            .await?
            .ok_or(RefreshTokenError::NotFound)?;

        if stored.is_revoked() {
            tracing::warn!(
                token_id = %stored.id,
                user_id = %stored.user_id,
                reason = RefreshTokenError::Revoked.reason(),
                "Attempt to use revoked refresh token"
            );
            return Err(RefreshTokenError::Revoked.into());
        }

        if stored.is_expired_at(Utc::now()) {
            tracing::debug!(
                token_id = %stored.id,
                reason = RefreshTokenError::Expired.reason(),
                "Refresh token expired"
            );
            return Err(RefreshTokenError::Expired.into());
        }

        let user = self
            .users
            .find_by_id(stored.user_id)
            .await?
            .ok_or(RefreshTokenError::UserMissing)?;

        Ok(user)
    }

    /// Idempotent; unknown tokens are ignored
    pub async fn revoke_refresh_token(&self, token: &str) -> Result<(), AuthError> {
        if !self.tokens.revoke(&digest(token)).await? {
            tracing::debug!("Revocation requested for unknown refresh token");
        }
        Ok(())
    }

    /// Revoke every refresh token the user holds
    pub async fn revoke_all_user_tokens(&self, user_id: Uuid) -> Result<u64, AuthError> {
        let revoked = self.tokens.revoke_all_for_user(user_id).await?;
        tracing::info!(user_id = %user_id, revoked, "Revoked all refresh tokens for user");
        Ok(revoked)
    }
}
