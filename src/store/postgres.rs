//! PostgreSQL store backed by sqlx.

use super::{AuditStore, PasswordResetStore, RefreshTokenStore, UserStore};
use crate::error::{AuthError, ResetTokenError};
use crate::models::{AuditEntry, NewUser, PasswordResetToken, RefreshToken, User, UserChanges};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

const UNIQUE_VIOLATION: &str = "23505";

#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create tables and indexes if they do not exist yet
    pub async fn run_migrations(&self) -> Result<(), AuthError> {
        tracing::info!("Running authentication database migrations");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id UUID PRIMARY KEY,
                email VARCHAR(255) NOT NULL UNIQUE,
                password_hash VARCHAR(255) NOT NULL,
                first_name VARCHAR(100),
                last_name VARCHAR(100),
                roles TEXT[] NOT NULL DEFAULT '{user}',
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            "#,
        )
        .execute(&self.db)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS refresh_tokens (
                id UUID PRIMARY KEY,
                user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                token_digest VARCHAR(64) NOT NULL UNIQUE,
                expires_at TIMESTAMPTZ NOT NULL,
                revoked_at TIMESTAMPTZ,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            "#,
        )
        .execute(&self.db)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_refresh_tokens_user ON refresh_tokens(user_id);")
            .execute(&self.db)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS password_reset_tokens (
                id UUID PRIMARY KEY,
                user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                token_digest VARCHAR(64) NOT NULL UNIQUE,
                expires_at TIMESTAMPTZ NOT NULL,
                used_at TIMESTAMPTZ,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            "#,
        )
        .execute(&self.db)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS audit_logs (
                id UUID PRIMARY KEY,
                user_id VARCHAR(64) NOT NULL,
                action VARCHAR(16) NOT NULL,
                resource TEXT NOT NULL,
                status INTEGER NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            "#,
        )
        .execute(&self.db)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_audit_logs_created ON audit_logs(created_at DESC);",
        )
        .execute(&self.db)
        .await?;

        tracing::info!("Authentication migrations completed successfully");
        Ok(())
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let user = sqlx::query_as("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AuthError> {
        let user = sqlx::query_as("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn create(&self, user: NewUser) -> Result<User, AuthError> {
        let result = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, password_hash, first_name, last_name, roles, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.roles)
        .bind(user.is_active)
        .fetch_one(&self.db)
        .await;

        match result {
            Ok(created) => Ok(created),
            Err(sqlx::Error::Database(e)) if e.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                Err(AuthError::EmailExists)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>, AuthError> {
        let user = sqlx::query_as(
            r#"
            UPDATE users SET
                first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                password_hash = COALESCE($4, password_hash),
                roles = COALESCE($5, roles),
                is_active = COALESCE($6, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&changes.first_name)
        .bind(&changes.last_name)
        .bind(&changes.password_hash)
        .bind(&changes.roles)
        .bind(changes.is_active)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>, AuthError> {
        let users = sqlx::query_as("SELECT * FROM users ORDER BY created_at LIMIT $1 OFFSET $2")
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.db)
            .await?;
        Ok(users)
    }
}

#[async_trait]
impl RefreshTokenStore for PgStore {
    async fn insert(&self, token: RefreshToken) -> Result<(), AuthError> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (id, user_id, token_digest, expires_at, revoked_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(token.id)
        .bind(token.user_id)
        .bind(&token.token_digest)
        .bind(token.expires_at)
        .bind(token.revoked_at)
        .bind(token.created_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn find_by_digest(&self, digest: &str) -> Result<Option<RefreshToken>, AuthError> {
        let token = sqlx::query_as("SELECT * FROM refresh_tokens WHERE token_digest = $1")
            .bind(digest)
            .fetch_optional(&self.db)
            .await?;
        Ok(token)
    }

    async fn revoke(&self, digest: &str) -> Result<bool, AuthError> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = COALESCE(revoked_at, NOW()) WHERE token_digest = $1",
        )
        .bind(digest)
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64, AuthError> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = NOW() WHERE user_id = $1 AND revoked_at IS NULL",
        )
        .bind(user_id)
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl PasswordResetStore for PgStore {
    async fn insert(&self, token: PasswordResetToken) -> Result<(), AuthError> {
        sqlx::query(
            r#"
            INSERT INTO password_reset_tokens (id, user_id, token_digest, expires_at, used_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(token.id)
        .bind(token.user_id)
        .bind(&token.token_digest)
        .bind(token.expires_at)
        .bind(token.used_at)
        .bind(token.created_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn find_by_digest(
        &self,
        digest: &str,
    ) -> Result<Option<PasswordResetToken>, AuthError> {
        let token = sqlx::query_as("SELECT * FROM password_reset_tokens WHERE token_digest = $1")
            .bind(digest)
            .fetch_optional(&self.db)
            .await?;
        Ok(token)
    }

    async fn redeem(
        &self,
        token_id: Uuid,
        user_id: Uuid,
        password_hash: &str,
    ) -> Result<(), AuthError> {
        let mut tx = self.db.begin().await?;

        // The conditional update row-locks the token, so concurrent redemptions serialize here
        let latched = sqlx::query(
            r#"
            UPDATE password_reset_tokens SET used_at = NOW()
            WHERE id = $1 AND user_id = $2 AND used_at IS NULL AND expires_at >= NOW()
            "#,
        )
        .bind(token_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        if latched.rows_affected() == 0 {
            let used: Option<(Option<DateTime<Utc>>,)> = sqlx::query_as(
                "SELECT used_at FROM password_reset_tokens WHERE id = $1 AND user_id = $2",
            )
            .bind(token_id)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;
            tx.rollback().await?;

            return Err(match used {
                None => ResetTokenError::NotFound,
                Some((Some(_),)) => ResetTokenError::AlreadyUsed,
                Some((None,)) => ResetTokenError::Expired,
            }
            .into());
        }

        let updated = sqlx::query(
            "UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(password_hash)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(AuthError::UserNotFound);
        }

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl AuditStore for PgStore {
    async fn append(&self, entry: AuditEntry) -> Result<(), AuthError> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (id, user_id, action, resource, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(entry.id)
        .bind(&entry.user_id)
        .bind(&entry.action)
        .bind(&entry.resource)
        .bind(entry.status)
        .bind(entry.created_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn list(&self, limit: i64, skip: i64) -> Result<Vec<AuditEntry>, AuthError> {
        let entries = sqlx::query_as(
            "SELECT * FROM audit_logs ORDER BY created_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(skip)
        .fetch_all(&self.db)
        .await?;
        Ok(entries)
    }
}
