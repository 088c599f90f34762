//! Authentication HTTP Handlers
//!
//! REST API endpoints for authentication operations, plus router assembly.

use crate::audit;
use crate::error::AuthError;
use crate::extractors::AuthUser;
use crate::middleware;
use crate::models::*;
use crate::service::AuthService;
use crate::store::{AuditStore, UserStore};
use crate::token::AccessTokenSigner;
use crate::users;

use axum::{
    body::Body,
    extract::{FromRef, MatchedPath, Path, State},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Method, Request, StatusCode,
    },
    middleware as axum_middleware,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tracing::Span;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use validator::Validate;

/// Roles allowed on administrative routes
const ADMIN_ONLY: &[&str] = &["admin"];

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub users: Arc<dyn UserStore>,
    pub audit: Arc<dyn AuditStore>,
    pub signer: Arc<AccessTokenSigner>,
}

impl AppState {
    pub fn new(
        auth: Arc<AuthService>,
        users: Arc<dyn UserStore>,
        audit: Arc<dyn AuditStore>,
    ) -> Self {
        let signer = auth.signer();
        Self {
            auth,
            users,
            audit,
            signer,
        }
    }
}

impl FromRef<AppState> for Arc<AccessTokenSigner> {
    fn from_ref(state: &AppState) -> Self {
        state.signer.clone()
    }
}

// ============================================
// Route Builder
// ============================================

/// Create all routes
pub fn create_routes(state: AppState) -> Router {
    // Public routes (no authentication required)
    let public = Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh_token))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password", post(reset_password))
        .route("/auth/validate-reset-token/:token", get(validate_reset_token));

    // Protected routes (require authentication)
    let protected = Router::new()
        .route("/auth/profile", get(profile))
        .route("/auth/logout", post(logout))
        .route_layer(axum_middleware::from_fn_with_state(
            state.signer.clone(),
            middleware::require_auth,
        ));

    // Admin routes
    let admin = Router::new()
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/:id",
            get(users::get_user)
                .patch(users::update_user)
                .put(users::update_user)
                .delete(users::deactivate_user),
        )
        .route("/audit/logs", get(audit::list_logs))
        .route_layer(axum_middleware::from_fn(middleware::require_roles(
            state.signer.clone(),
            ADMIN_ONLY,
        )));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION]);

    Router::new()
        .merge(public)
        .merge(protected)
        .merge(admin)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            audit::record_mutations,
        ))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors),
        )
        .with_state(state)
}

/// Request span carrying the route template, never the concrete path.
/// Reset tokens travel in the path.
fn make_span(request: &Request<Body>) -> Span {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(MatchedPath::as_str)
        .unwrap_or("unmatched");

    tracing::info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = route
    )
}

// ============================================
// Registration
// ============================================

/// POST /auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AuthError> {
    req.validate()?;

    let user = state.auth.register(req).await?;

    Ok((StatusCode::CREATED, Json(UserSummary::from(&user))))
}

// ============================================
// Login / Logout
// ============================================

/// POST /auth/login
///
/// Authenticate user and return access/refresh tokens
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, AuthError> {
    req.validate()?;

    let user = state
        .auth
        .validate_user(&req.username, &req.password)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    let response = state.auth.login(&user).await?;
    Ok(Json(response))
}

/// POST /auth/logout
///
/// Revoke the given refresh token
pub async fn logout(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<RefreshTokenRequest>,
) -> Result<impl IntoResponse, AuthError> {
    req.validate()?;

    let response = state.auth.logout(&req.refresh_token).await?;
    tracing::info!(user_id = %user.id, "User logged out");

    Ok(Json(response))
}

// ============================================
// Token Refresh
// ============================================

/// POST /auth/refresh
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(req): Json<RefreshTokenRequest>,
) -> Result<impl IntoResponse, AuthError> {
    req.validate()?;

    let response = state.auth.refresh(&req.refresh_token).await?;
    Ok(Json(response))
}

// ============================================
// Profile
// ============================================

/// GET /auth/profile
///
/// Returns the verified access token claims
pub async fn profile(Extension(claims): Extension<AccessTokenClaims>) -> impl IntoResponse {
    Json(claims)
}

// ============================================
// Password Reset
// ============================================

/// POST /auth/forgot-password
///
/// Always answers with the same message, whether or not the email is known
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<impl IntoResponse, AuthError> {
    req.validate()?;

    let response = state.auth.request_password_reset(&req.email).await?;
    Ok(Json(response))
}

/// POST /auth/reset-password
pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<impl IntoResponse, AuthError> {
    req.validate()
        .map_err(|e| AuthError::from(e).rename_field("new_password", "newPassword"))?;

    let response = state
        .auth
        .reset_password(&req.token, &req.new_password)
        .await?;
    Ok(Json(response))
}

/// GET /auth/validate-reset-token/:token
///
/// Reports validity without consuming the token. The failure message does
/// not say which check failed.
pub async fn validate_reset_token(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, AuthError> {
    let status = match state.auth.validate_reset_token(&token).await {
        Ok(_) => ResetTokenStatus {
            valid: true,
            message: None,
        },
        Err(AuthError::ResetToken(reason)) => {
            tracing::debug!(reason = reason.reason(), "Reset token check rejected");
            ResetTokenStatus {
                valid: false,
                message: Some("Invalid or expired token".to_string()),
            }
        }
        Err(e) => return Err(e),
    };

    Ok(Json(status))
}
