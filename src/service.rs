//! Authentication Service
//!
//! Login, registration, refresh and the password reset flow. Composes the
//! session service, the credential store, the password hasher and the
//! notification sink.

use crate::config::AuthConfig;
use crate::error::{AuthError, ResetTokenError};
use crate::models::*;
use crate::notify::{self, Notifier, PasswordResetDelivery};
use crate::password::PasswordHasher;
use crate::session::SessionService;
use crate::store::{PasswordResetStore, RefreshTokenStore, UserStore};
use crate::token::{digest, generate_opaque_token, AccessTokenSigner};

use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// Returned for every reset request, whether or not the email is known
pub const RESET_REQUESTED_MESSAGE: &str =
    "If an account with that email exists, a password reset link has been sent.";

/// Authentication service
pub struct AuthService {
    users: Arc<dyn UserStore>,
    resets: Arc<dyn PasswordResetStore>,
    sessions: SessionService,
    signer: Arc<AccessTokenSigner>,
    hasher: PasswordHasher,
    notifier: Arc<dyn Notifier>,
    config: AuthConfig,
}

impl AuthService {
    /// Create a new authentication service
    pub fn new(
        config: AuthConfig,
        users: Arc<dyn UserStore>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        resets: Arc<dyn PasswordResetStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, AuthError> {
        config.validate()?;

        let hasher = PasswordHasher::new(&config)?;
        let signer = Arc::new(AccessTokenSigner::new(&config));
        let sessions = SessionService::new(
            refresh_tokens,
            users.clone(),
            config.refresh_token_expiration,
        );

        Ok(Self {
            users,
            resets,
            sessions,
            signer,
            hasher,
            notifier,
            config,
        })
    }

    /// Create a service whose stores all live in one backend
    pub fn with_store<S>(
        config: AuthConfig,
        store: Arc<S>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, AuthError>
    where
        S: UserStore + RefreshTokenStore + PasswordResetStore + 'static,
    {
        Self::new(config, store.clone(), store.clone(), store, notifier)
    }

    /// Get reference to config
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn signer(&self) -> Arc<AccessTokenSigner> {
        self.signer.clone()
    }

    pub fn sessions(&self) -> &SessionService {
        &self.sessions
    }

    pub fn hasher(&self) -> &PasswordHasher {
        &self.hasher
    }

    /// Enforce the configured password floor
    pub fn validate_password(&self, field: &str, password: &str) -> Result<(), AuthError> {
        if password.chars().count() < self.config.min_password_length {
            return Err(AuthError::field(
                field,
                format!(
                    "Password must be at least {} characters",
                    self.config.min_password_length
                ),
            ));
        }
        Ok(())
    }

    // ============================================
    // Credentials
    // ============================================

    /// Check credentials.
    ///
    /// Unknown identifier, wrong password and inactive account all yield
    /// `Ok(None)`; callers cannot tell them apart.
    pub async fn validate_user(
        &self,
        identifier: &str,
        password: &str,
    ) -> Result<Option<UserProfile>, AuthError> {
        let Some(user) = self.users.find_by_email(&normalize_email(identifier)).await? else {
            return Ok(None);
        };

        let verified = match self.hasher.verify(password, &user.password_hash).await {
            Ok(verified) => verified,
            // Fails like a wrong password so this account answers like any other
            Err(e) => {
                tracing::error!(user_id = %user.id, error = %e, "Password verification failed");
                false
            }
        };

        if !verified || !user.is_active {
            tracing::debug!(user_id = %user.id, "Credential check failed");
            return Ok(None);
        }

        Ok(Some(UserProfile::from(user)))
    }

    /// Issue tokens for an already validated user
    pub async fn login(&self, user: &UserProfile) -> Result<LoginResponse, AuthError> {
        let access_token = self.signer.issue(user)?;
        let refresh_token = self.sessions.generate_refresh_token(user.id).await?;

        tracing::info!(user_id = %user.id, "User logged in");

        Ok(LoginResponse {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.signer.lifetime(),
            user: UserSummary::from(user),
        })
    }

    /// Register a new user with the default role set
    pub async fn register(&self, req: RegisterRequest) -> Result<UserProfile, AuthError> {
        self.validate_password("password", &req.password)?;

        let password_hash = self.hasher.hash(&req.password).await?;
        let user = self
            .users
            .create(NewUser {
                email: normalize_email(&req.username),
                password_hash,
                first_name: None,
                last_name: None,
                roles: default_roles(),
                is_active: true,
            })
            .await?;

        tracing::info!(user_id = %user.id, "User registered");
        Ok(user.into())
    }

    // ============================================
    // Token Refresh / Logout
    // ============================================

    /// Exchange a refresh token for a new access token
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, AuthError> {
        let user = self.sessions.validate_refresh_token(refresh_token).await?;

        if !user.is_active {
            tracing::warn!(user_id = %user.id, "Refresh attempted for inactive account");
            return Err(AuthError::AccountNotActive);
        }

        Ok(TokenResponse {
            access_token: self.signer.issue(&user.profile())?,
            token_type: "Bearer".to_string(),
            expires_in: self.signer.lifetime(),
        })
    }

    /// Revoke the given refresh token
    pub async fn logout(&self, refresh_token: &str) -> Result<MessageResponse, AuthError> {
        self.sessions.revoke_refresh_token(refresh_token).await?;
        Ok(MessageResponse::new("Logged out successfully"))
    }

    // ============================================
    // Password Reset
    // ============================================

    /// Start a password reset.
    ///
    /// The response is identical for known and unknown emails. Only a known,
    /// active account gets a stored token and a delivery.
    pub async fn request_password_reset(&self, email: &str) -> Result<MessageResponse, AuthError> {
        let email = normalize_email(email);

        if let Some(user) = self.users.find_by_email(&email).await? {
            if user.is_active {
                let token = generate_opaque_token();
                let now = Utc::now();

                self.resets
                    .insert(PasswordResetToken {
                        id: Uuid::new_v4(),
                        user_id: user.id,
                        token_digest: digest(&token),
                        expires_at: now + Duration::seconds(self.config.password_reset_expiration),
                        used_at: None,
                        created_at: now,
                    })
                    .await?;

                tracing::info!(user_id = %user.id, "Password reset token issued");

                notify::dispatch_password_reset(
                    self.notifier.clone(),
                    PasswordResetDelivery {
                        reset_url: notify::reset_url(&self.config.frontend_url, &token),
                        email: user.email,
                        token,
                    },
                );
            }
        }

        Ok(MessageResponse::new(RESET_REQUESTED_MESSAGE))
    }

    /// Check a reset token without consuming it
    pub async fn validate_reset_token(&self, token: &str) -> Result<PasswordResetToken, AuthError> {
        let stored = self
            .resets
            .find_by_digest(&digest(token))
            .await?
            .ok_or(ResetTokenError::NotFound)?;

        if stored.is_used() {
            return Err(ResetTokenError::AlreadyUsed.into());
        }

        if stored.is_expired_at(Utc::now()) {
            return Err(ResetTokenError::Expired.into());
        }

        Ok(stored)
    }

    /// Redeem a reset token and set a new password.
    ///
    /// The password write and the used-flag latch happen in one store call,
    /// which fails if the token was used or expired in the meantime.
    /// Afterwards every refresh token of the user is revoked.
    pub async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<MessageResponse, AuthError> {
        let stored = match self.validate_reset_token(token).await {
            Ok(stored) => stored,
            Err(AuthError::ResetToken(reason)) => {
                tracing::info!(reason = reason.reason(), "Password reset rejected");
                return Err(reason.into());
            }
            Err(e) => return Err(e),
        };

        self.validate_password("newPassword", new_password)?;
        let password_hash = self.hasher.hash(new_password).await?;

        // Used and expired are re-checked under the latch; hashing takes time
        match self
            .resets
            .redeem(stored.id, stored.user_id, &password_hash)
            .await
        {
            Ok(()) => {}
            Err(AuthError::ResetToken(reason)) => {
                tracing::info!(reason = reason.reason(), "Password reset rejected at redemption");
                return Err(reason.into());
            }
            Err(e) => return Err(e),
        }

        tracing::info!(user_id = %stored.user_id, "Password reset completed");

        if let Err(e) = self.sessions.revoke_all_user_tokens(stored.user_id).await {
            tracing::error!(user_id = %stored.user_id, error = %e, "Failed to revoke sessions after password reset");
        }

        Ok(MessageResponse::new("Password has been reset successfully"))
    }
}

/// Login identifiers are compared case-insensitively
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
