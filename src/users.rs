//! User Administration Handlers
//!
//! Admin-only CRUD over the credential store. Deletion is soft: the account
//! is deactivated and its refresh tokens are revoked.

use crate::error::AuthError;
use crate::extractors::AuthUser;
use crate::handlers::AppState;
use crate::models::*;
use crate::service::normalize_email;
use crate::store::UserStore;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

/// Validate role names and drop duplicates, keeping first-seen order
pub fn parse_roles(roles: Vec<String>) -> Result<Vec<String>, AuthError> {
    if roles.is_empty() {
        return Err(AuthError::field("roles", "At least one role is required"));
    }

    let mut parsed: Vec<Role> = Vec::with_capacity(roles.len());
    for name in roles {
        let role = Role::from_str(name.trim()).map_err(|e| AuthError::field("roles", e))?;
        if !parsed.contains(&role) {
            parsed.push(role);
        }
    }

    Ok(parsed.iter().map(|r| r.as_str().to_string()).collect())
}

/// GET /users
pub async fn list_users(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, AuthError> {
    let (limit, skip) = params.page();
    let users: Vec<UserProfile> = state
        .users
        .list(limit, skip)
        .await?
        .into_iter()
        .map(UserProfile::from)
        .collect();

    Ok(Json(users))
}

/// GET /users/:id
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AuthError> {
    let user = state
        .users
        .find_by_id(id)
        .await?
        .ok_or(AuthError::UserNotFound)?;

    Ok(Json(UserProfile::from(user)))
}

/// POST /users
pub async fn create_user(
    State(state): State<AppState>,
    admin: AuthUser,
    Json(req): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, AuthError> {
    req.validate()?;
    state.auth.validate_password("password", &req.password)?;

    let roles = match req.roles {
        Some(roles) => parse_roles(roles)?,
        None => default_roles(),
    };

    let user = state
        .users
        .create(NewUser {
            email: normalize_email(&req.email),
            password_hash: state.auth.hasher().hash(&req.password).await?,
            first_name: req.first_name,
            last_name: req.last_name,
            roles,
            is_active: req.is_active.unwrap_or(true),
        })
        .await?;

    tracing::info!(admin_id = %admin.id, user_id = %user.id, "User created by admin");
    Ok((StatusCode::CREATED, Json(UserProfile::from(user))))
}

/// PATCH /users/:id
///
/// A password change is rehashed. Deactivation revokes every session.
pub async fn update_user(
    State(state): State<AppState>,
    admin: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, AuthError> {
    req.validate()?;

    let password_hash = match req.password.as_deref() {
        Some(password) => {
            state.auth.validate_password("password", password)?;
            Some(state.auth.hasher().hash(password).await?)
        }
        None => None,
    };

    let roles = req.roles.map(parse_roles).transpose()?;
    let deactivated = req.is_active == Some(false);

    let user = state
        .users
        .update(
            id,
            UserChanges {
                first_name: req.first_name,
                last_name: req.last_name,
                password_hash,
                roles,
                is_active: req.is_active,
            },
        )
        .await?
        .ok_or(AuthError::UserNotFound)?;

    if deactivated {
        state.auth.sessions().revoke_all_user_tokens(user.id).await?;
    }

    tracing::info!(admin_id = %admin.id, user_id = %user.id, "User updated by admin");
    Ok(Json(UserProfile::from(user)))
}

/// DELETE /users/:id
pub async fn deactivate_user(
    State(state): State<AppState>,
    admin: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AuthError> {
    state
        .users
        .update(
            id,
            UserChanges {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await?
        .ok_or(AuthError::UserNotFound)?;

    state.auth.sessions().revoke_all_user_tokens(id).await?;

    tracing::info!(admin_id = %admin.id, user_id = %id, "User deactivated by admin");
    Ok(Json(MessageResponse::new("User deactivated")))
}
