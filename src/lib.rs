//! WorldAdmin Authentication Core
//!
//! Identity and session management for the WorldAdmin backend:
//! - Credential validation and user registration
//! - Short-lived HS256 access tokens and long-lived opaque refresh tokens
//! - Argon2id password hashing
//! - Password reset flow with single-use, time-limited tokens
//! - Role-based authorization guard
//! - Administrative user management and audit logging
//!
//! # Configuration
//!
//! All configuration is loaded from environment variables:
//! - `JWT_SECRET` - Secret key for signing JWTs (required, min 32 chars)
//! - `JWT_ACCESS_EXPIRATION` - Access token expiration in seconds (default: 900, max: 900)
//! - `JWT_REFRESH_EXPIRATION` - Refresh token expiration in seconds (default: 604800)
//! - `PASSWORD_RESET_EXPIRATION` - Reset token expiration in seconds (default: 3600)
//! - `JWT_ISSUER` - JWT issuer claim (default: "worldadmin")
//! - `JWT_AUDIENCE` - JWT audience claim (default: "worldadmin-api")
//! - `ARGON2_MEMORY_COST`, `ARGON2_TIME_COST`, `ARGON2_PARALLELISM` - hash work factor
//! - `MIN_PASSWORD_LENGTH` - Password floor (default: 8)
//! - `FRONTEND_URL` - Base of reset links (default: "http://localhost:3000")
//!
//! # Usage
//!
//! ```rust,ignore
//! use worldadmin_auth::{AppState, AuthConfig, AuthService, LogNotifier, MemoryStore};
//!
//! let store = Arc::new(MemoryStore::new());
//! let auth = Arc::new(AuthService::with_store(
//!     AuthConfig::from_env()?,
//!     store.clone(),
//!     Arc::new(LogNotifier),
//! )?);
//!
//! let app = worldadmin_auth::create_routes(AppState::new(auth, store.clone(), store));
//! ```

pub mod audit;
pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod notify;
pub mod password;
pub mod service;
pub mod session;
pub mod store;
pub mod token;
pub mod users;

// Re-export commonly used types
pub use config::AuthConfig;
pub use error::{AuthError, RefreshTokenError, ResetTokenError};
pub use extractors::AuthUser;
pub use handlers::AppState;
pub use models::*;
pub use notify::{ChannelNotifier, LogNotifier, Notifier, PasswordResetDelivery};
pub use service::AuthService;
pub use session::SessionService;
pub use store::{MemoryStore, PgStore};
pub use token::AccessTokenSigner;

use axum::Router;

/// Create the HTTP router with all endpoints
pub fn create_routes(state: AppState) -> Router {
    handlers::create_routes(state)
}
