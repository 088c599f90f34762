//! Authorization Guard
//!
//! Bearer token validation and role checks. Both are pure functions of the
//! token and the declared requirement; no store is consulted.

use crate::error::AuthError;
use crate::models::AccessTokenClaims;
use crate::token::AccessTokenSigner;

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

const BEARER_PREFIX: &str = "Bearer ";

/// Validate the `Authorization` header value.
///
/// A missing header is [`AuthError::Unauthorized`]; a malformed header or a
/// token that fails verification is [`AuthError::InvalidToken`].
pub fn authenticate(
    signer: &AccessTokenSigner,
    auth_header: Option<&str>,
) -> Result<AccessTokenClaims, AuthError> {
    let header = auth_header.ok_or(AuthError::Unauthorized)?;

    let token = header
        .strip_prefix(BEARER_PREFIX)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::InvalidToken)?;

    signer.verify(token).map_err(|e| {
        tracing::debug!("JWT validation failed: {}", e);
        AuthError::InvalidToken
    })
}

/// Check that the claims carry at least one of the required roles
pub fn authorize(claims: &AccessTokenClaims, required: &[&str]) -> Result<(), AuthError> {
    if claims.has_any_role(required) {
        Ok(())
    } else {
        tracing::debug!(user_id = %claims.sub, ?required, "Role check failed");
        Err(AuthError::Forbidden)
    }
}

fn header_value(req: &Request) -> Option<&str> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
}

/// Require authenticated user
///
/// Stores the verified claims in request extensions for extractors.
pub async fn require_auth(
    State(signer): State<Arc<AccessTokenSigner>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let claims = authenticate(&signer, header_value(&req))?;
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Require one of `roles`
///
/// Authentication failures are rejected before the role check, so a
/// missing token is 401 and a valid token without the role is 403.
pub fn require_roles(
    signer: Arc<AccessTokenSigner>,
    roles: &'static [&'static str],
) -> impl Fn(Request, Next) -> Pin<Box<dyn Future<Output = Result<Response, AuthError>> + Send>>
       + Clone
       + Send
       + Sync
       + 'static {
    move |mut req: Request, next: Next| {
        let signer = signer.clone();
        Box::pin(async move {
            let claims = authenticate(&signer, header_value(&req))?;
            authorize(&claims, roles)?;

            req.extensions_mut().insert(claims);
            Ok(next.run(req).await)
        })
    }
}
