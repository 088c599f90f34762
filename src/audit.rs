//! Audit Log
//!
//! Records every mutating request after its response is produced. The append
//! runs on a detached task; failures are logged and dropped.

use crate::error::AuthError;
use crate::handlers::AppState;
use crate::middleware;
use crate::models::{AuditEntry, ListParams};
use crate::store::AuditStore;

use axum::{
    extract::{Query, Request, State},
    http::{header::AUTHORIZATION, Method},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use uuid::Uuid;

/// Actor recorded when the request carries no valid access token
pub const ANONYMOUS: &str = "anonymous";

fn is_mutating(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

/// Audit middleware. Request bodies are never recorded.
pub async fn record_mutations(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    if !is_mutating(req.method()) {
        return next.run(req).await;
    }

    let actor = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| middleware::authenticate(&state.signer, Some(h)).ok())
        .map(|claims| claims.sub.to_string())
        .unwrap_or_else(|| ANONYMOUS.to_string());
    let action = req.method().to_string();
    let resource = req.uri().path().to_string();

    let response = next.run(req).await;

    let entry = AuditEntry {
        id: Uuid::new_v4(),
        user_id: actor,
        action,
        resource,
        status: i32::from(response.status().as_u16()),
        created_at: Utc::now(),
    };

    let store = state.audit.clone();
    tokio::spawn(async move {
        if let Err(e) = store.append(entry).await {
            tracing::error!(error = %e, "Failed to append audit entry");
        }
    });

    response
}

/// GET /audit/logs
///
/// Newest first; `limit` defaults to 50 and is capped at 200
pub async fn list_logs(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, AuthError> {
    let (limit, skip) = params.page();
    let entries = state.audit.list(limit, skip).await?;
    Ok(Json(entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use crate::models::UserProfile;
    use crate::notify::LogNotifier;
    use crate::service::AuthService;
    use crate::store::MemoryStore;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
        middleware as axum_middleware,
        routing::post,
        Router,
    };
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app() -> (Arc<MemoryStore>, AppState, Router) {
        let store = Arc::new(MemoryStore::new());
        let auth = Arc::new(
            AuthService::with_store(test_config(), store.clone(), Arc::new(LogNotifier)).unwrap(),
        );
        let state = AppState::new(auth, store.clone(), store.clone());

        let router = Router::new()
            .route(
                "/things",
                post(|| async { StatusCode::CREATED }).get(|| async { StatusCode::OK }),
            )
            .layer(axum_middleware::from_fn_with_state(
                state.clone(),
                record_mutations,
            ))
            .with_state(state.clone());

        (store, state, router)
    }

    async fn recorded(store: &MemoryStore) -> Vec<AuditEntry> {
        for _ in 0..50 {
            let entries = AuditStore::list(store, 10, 0).await.unwrap();
            if !entries.is_empty() {
                return entries;
            }
            tokio::task::yield_now().await;
        }
        Vec::new()
    }

    #[test]
    fn test_mutating_methods() {
        assert!(is_mutating(&Method::POST));
        assert!(is_mutating(&Method::DELETE));
        assert!(!is_mutating(&Method::GET));
        assert!(!is_mutating(&Method::OPTIONS));
    }

    #[tokio::test]
    async fn test_anonymous_mutation_is_recorded() {
        let (store, _state, router) = app();

        let response = router
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/things")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let entries = recorded(&store).await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].user_id, ANONYMOUS);
        assert_eq!(entries[0].action, "POST");
        assert_eq!(entries[0].resource, "/things");
        assert_eq!(entries[0].status, 201);
    }

    #[tokio::test]
    async fn test_actor_comes_from_bearer_token() {
        let (store, state, router) = app();
        let profile = UserProfile {
            id: Uuid::new_v4(),
            email: "admin@example.com".to_string(),
            first_name: None,
            last_name: None,
            roles: vec!["admin".to_string()],
            is_active: true,
            created_at: Utc::now(),
        };
        let token = state.signer.issue(&profile).unwrap();

        router
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/things")
                    .header(AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let entries = recorded(&store).await;
        assert_eq!(entries[0].user_id, profile.id.to_string());
    }

    #[tokio::test]
    async fn test_reads_are_not_recorded() {
        let (store, _state, router) = app();

        router
            .oneshot(Request::builder().uri("/things").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert!(recorded(&store).await.is_empty());
    }
}
