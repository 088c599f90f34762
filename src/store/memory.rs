//! In-memory store.
//!
//! Backs every store trait with `RwLock`-guarded maps. Used by the test
//! suite and by the server when no `DATABASE_URL` is configured. Nothing is
//! persisted across restarts.

use super::{AuditStore, PasswordResetStore, RefreshTokenStore, UserStore};
use crate::error::{AuthError, ResetTokenError};
use crate::models::{AuditEntry, NewUser, PasswordResetToken, RefreshToken, User, UserChanges};

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<Uuid, User>>,
    refresh_tokens: RwLock<HashMap<String, RefreshToken>>,
    reset_tokens: RwLock<HashMap<String, PasswordResetToken>>,
    audit: RwLock<Vec<AuditEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of reset tokens ever issued
    pub async fn reset_token_count(&self) -> usize {
        self.reset_tokens.read().await.len()
    }

    /// Number of refresh tokens ever issued to a user
    pub async fn refresh_token_count(&self, user_id: Uuid) -> usize {
        self.refresh_tokens
            .read()
            .await
            .values()
            .filter(|t| t.user_id == user_id)
            .count()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AuthError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn create(&self, user: NewUser) -> Result<User, AuthError> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == user.email) {
            return Err(AuthError::EmailExists);
        }

        let now = Utc::now();
        let created = User {
            id: Uuid::new_v4(),
            email: user.email,
            password_hash: user.password_hash,
            first_name: user.first_name,
            last_name: user.last_name,
            roles: user.roles,
            is_active: user.is_active,
            created_at: now,
            updated_at: now,
        };
        users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>, AuthError> {
        let mut users = self.users.write().await;
        let Some(user) = users.get_mut(&id) else {
            return Ok(None);
        };

        if let Some(first_name) = changes.first_name {
            user.first_name = Some(first_name);
        }
        if let Some(last_name) = changes.last_name {
            user.last_name = Some(last_name);
        }
        if let Some(password_hash) = changes.password_hash {
            user.password_hash = password_hash;
        }
        if let Some(roles) = changes.roles {
            user.roles = roles;
        }
        if let Some(is_active) = changes.is_active {
            user.is_active = is_active;
        }
        user.updated_at = Utc::now();

        Ok(Some(user.clone()))
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>, AuthError> {
        let users = self.users.read().await;
        let mut all: Vec<User> = users.values().cloned().collect();
        all.sort_by_key(|u| u.created_at);
        Ok(all
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryStore {
    async fn insert(&self, token: RefreshToken) -> Result<(), AuthError> {
        self.refresh_tokens
            .write()
            .await
            .insert(token.token_digest.clone(), token);
        Ok(())
    }

    async fn find_by_digest(&self, digest: &str) -> Result<Option<RefreshToken>, AuthError> {
        Ok(self.refresh_tokens.read().await.get(digest).cloned())
    }

    async fn revoke(&self, digest: &str) -> Result<bool, AuthError> {
        let mut tokens = self.refresh_tokens.write().await;
        match tokens.get_mut(digest) {
            Some(token) => {
                token.revoked_at.get_or_insert_with(Utc::now);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64, AuthError> {
        let now = Utc::now();
        let mut revoked = 0;
        for token in self.refresh_tokens.write().await.values_mut() {
            if token.user_id == user_id && token.revoked_at.is_none() {
                token.revoked_at = Some(now);
                revoked += 1;
            }
        }
        Ok(revoked)
    }
}

#[async_trait]
impl PasswordResetStore for MemoryStore {
    async fn insert(&self, token: PasswordResetToken) -> Result<(), AuthError> {
        self.reset_tokens
            .write()
            .await
            .insert(token.token_digest.clone(), token);
        Ok(())
    }

    async fn find_by_digest(
        &self,
        digest: &str,
    ) -> Result<Option<PasswordResetToken>, AuthError> {
        Ok(self.reset_tokens.read().await.get(digest).cloned())
    }

    async fn redeem(
        &self,
        token_id: Uuid,
        user_id: Uuid,
        password_hash: &str,
    ) -> Result<(), AuthError> {
        // Lock order: reset tokens, then users
        let mut tokens = self.reset_tokens.write().await;
        let mut users = self.users.write().await;

        let token = tokens
            .values_mut()
            .find(|t| t.id == token_id && t.user_id == user_id)
            .ok_or(ResetTokenError::NotFound)?;

        let now = Utc::now();
        if token.is_used() {
            return Err(ResetTokenError::AlreadyUsed.into());
        }
        if token.is_expired_at(now) {
            return Err(ResetTokenError::Expired.into());
        }
        let user = users.get_mut(&user_id).ok_or(AuthError::UserNotFound)?;

        user.password_hash = password_hash.to_string();
        user.updated_at = now;
        token.used_at = Some(now);
        Ok(())
    }
}

#[async_trait]
impl AuditStore for MemoryStore {
    async fn append(&self, entry: AuditEntry) -> Result<(), AuthError> {
        self.audit.write().await.push(entry);
        Ok(())
    }

    async fn list(&self, limit: i64, skip: i64) -> Result<Vec<AuditEntry>, AuthError> {
        let entries = self.audit.read().await;
        Ok(entries
            .iter()
            .rev()
            .skip(skip.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}
