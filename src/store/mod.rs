//! Persistence seams.
//!
//! The services only talk to these traits. [`MemoryStore`] and [`PgStore`]
//! implement all of them over a single backing store so that
//! [`PasswordResetStore::redeem`] can update a user and a token together.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::error::AuthError;
use crate::models::{AuditEntry, NewUser, PasswordResetToken, RefreshToken, User, UserChanges};

use async_trait::async_trait;
use uuid::Uuid;

/// Credential store: user records
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AuthError>;

    /// Fails with [`AuthError::EmailExists`] when the email is taken
    async fn create(&self, user: NewUser) -> Result<User, AuthError>;

    /// Returns `None` when no user has this id
    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>, AuthError>;

    /// Oldest first
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>, AuthError>;
}

/// Issued refresh tokens, keyed by digest
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn insert(&self, token: RefreshToken) -> Result<(), AuthError>;

    async fn find_by_digest(&self, digest: &str) -> Result<Option<RefreshToken>, AuthError>;

    /// Marks the token revoked; `false` when no such token exists
    async fn revoke(&self, digest: &str) -> Result<bool, AuthError>;

    /// Revokes every live token of the user, returning how many changed
    async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64, AuthError>;
}

/// Issued password reset tokens, keyed by digest
#[async_trait]
pub trait PasswordResetStore: Send + Sync {
    async fn insert(&self, token: PasswordResetToken) -> Result<(), AuthError>;

    async fn find_by_digest(&self, digest: &str)
        -> Result<Option<PasswordResetToken>, AuthError>;

    /// Atomically latch the token as used and replace the owner's password
    /// hash. Fails with `ResetTokenError::AlreadyUsed` or
    /// `ResetTokenError::Expired`, changing nothing, when the token is no
    /// longer redeemable at the moment of the latch.
    async fn redeem(
        &self,
        token_id: Uuid,
        user_id: Uuid,
        password_hash: &str,
    ) -> Result<(), AuthError>;
}

/// Append-only audit trail
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append(&self, entry: AuditEntry) -> Result<(), AuthError>;

    /// Newest first
    async fn list(&self, limit: i64, skip: i64) -> Result<Vec<AuditEntry>, AuthError>;
}
