//! Authentication Extractors

use crate::error::AuthError;
use crate::middleware;
use crate::models::AccessTokenClaims;
use crate::token::AccessTokenSigner;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use std::sync::Arc;
use uuid::Uuid;

/// Authenticated user information extracted from JWT claims
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
    pub roles: Vec<String>,
}

impl AuthUser {
    /// Create user from JWT claims
    pub fn from_claims(claims: &AccessTokenClaims) -> Self {
        Self {
            id: claims.sub,
            username: claims.username.clone(),
            roles: claims.roles.clone(),
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    Arc<AccessTokenSigner>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // Claims already verified by the guard layer
        if let Some(claims) = parts.extensions.get::<AccessTokenClaims>() {
            return Ok(AuthUser::from_claims(claims));
        }

        let signer = Arc::<AccessTokenSigner>::from_ref(state);
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok());

        let claims = middleware::authenticate(&signer, auth_header)?;
        Ok(AuthUser::from_claims(&claims))
    }
}
