//! Router-level authentication scenarios against the in-memory store.

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tower::ServiceExt;
use worldadmin_auth::store::UserStore;
use worldadmin_auth::{
    create_routes, AppState, AuthConfig, AuthService, ChannelNotifier, MemoryStore, NewUser,
    PasswordResetDelivery,
};

struct TestApp {
    router: Router,
    store: Arc<MemoryStore>,
    auth: Arc<AuthService>,
    deliveries: UnboundedReceiver<PasswordResetDelivery>,
}

fn config() -> AuthConfig {
    AuthConfig {
        jwt_secret: "integration-secret-0123456789abcdef0123".to_string(),
        access_token_expiration: 900,
        refresh_token_expiration: 604_800,
        password_reset_expiration: 3600,
        jwt_issuer: "worldadmin".to_string(),
        jwt_audience: "worldadmin-api".to_string(),
        argon2_memory_cost: 1024,
        argon2_time_cost: 1,
        argon2_parallelism: 1,
        min_password_length: 8,
        frontend_url: "http://localhost:3000".to_string(),
    }
}

fn test_app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let (notifier, deliveries) = ChannelNotifier::new();
    let auth = Arc::new(
        AuthService::with_store(config(), store.clone(), Arc::new(notifier)).unwrap(),
    );
    let router = create_routes(AppState::new(auth.clone(), store.clone(), store.clone()));

    TestApp {
        router,
        store,
        auth,
        deliveries,
    }
}

impl TestApp {
    async fn send(
        &self,
        method: Method,
        uri: &str,
        bearer: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    async fn register(&self, email: &str, password: &str) -> (StatusCode, Value) {
        self.send(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({ "username": email, "password": password })),
        )
        .await
    }

    async fn login(&self, email: &str, password: &str) -> (StatusCode, Value) {
        self.send(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "username": email, "password": password })),
        )
        .await
    }

    async fn seed_admin(&self) -> String {
        let password_hash = self.auth.hasher().hash("adminpass1").await.unwrap();
        self.store
            .create(NewUser {
                email: "admin@example.com".to_string(),
                password_hash,
                first_name: None,
                last_name: None,
                roles: vec!["admin".to_string()],
                is_active: true,
            })
            .await
            .unwrap();

        let (_, body) = self.login("admin@example.com", "adminpass1").await;
        body["access_token"].as_str().unwrap().to_string()
    }
}

#[tokio::test]
async fn register_login_refresh_logout() {
    let app = test_app();

    let (status, created) = app.register("alice@example.com", "hunter22").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["username"], "alice@example.com");
    assert_eq!(created["roles"], json!(["user"]));

    let (status, login) = app.login("alice@example.com", "hunter22").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(login["token_type"], "Bearer");
    let access = login["access_token"].as_str().unwrap().to_string();
    let refresh = login["refresh_token"].as_str().unwrap().to_string();

    let (status, profile) = app.send(Method::GET, "/auth/profile", Some(&access), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["sub"], created["id"]);
    assert_eq!(profile["username"], "alice@example.com");

    let (status, refreshed) = app
        .send(
            Method::POST,
            "/auth/refresh",
            None,
            Some(json!({ "refresh_token": refresh })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let renewed = refreshed["access_token"].as_str().unwrap();
    let (_, renewed_profile) = app.send(Method::GET, "/auth/profile", Some(renewed), None).await;
    assert_eq!(renewed_profile["sub"], created["id"]);

    let (status, _) = app
        .send(
            Method::POST,
            "/auth/logout",
            Some(&access),
            Some(json!({ "refresh_token": refresh })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .send(
            Method::POST,
            "/auth/refresh",
            None,
            Some(json!({ "refresh_token": refresh })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "revoked");
}

#[tokio::test]
async fn login_failures_are_indistinguishable() {
    let app = test_app();
    app.register("alice@example.com", "hunter22").await;

    let (wrong_status, wrong_body) = app.login("alice@example.com", "hunter23").await;
    let (missing_status, missing_body) = app.login("bob@example.com", "hunter22").await;

    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(missing_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_body, missing_body);
}

#[tokio::test]
async fn register_validation_and_conflict() {
    let app = test_app();

    let (status, body) = app.register("alice@example.com", "short").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["password"].is_array());

    let (status, body) = app.register("not-an-email", "hunter22").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["username"].is_array());

    app.register("alice@example.com", "hunter22").await;
    let (status, _) = app.register("ALICE@example.com", "hunter22").await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn missing_fields_are_field_errors() {
    let app = test_app();

    let (status, body) = app
        .send(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({ "username": "alice@example.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
    assert!(body["fields"]["password"].is_array());

    let (status, body) = app
        .send(
            Method::POST,
            "/auth/reset-password",
            None,
            Some(json!({ "token": "abc" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["newPassword"].is_array());

    let (status, body) = app
        .send(Method::POST, "/auth/login", None, Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["username"].is_array());
    assert!(body["fields"]["password"].is_array());
}

#[tokio::test]
async fn password_reset_flow() {
    let mut app = test_app();
    app.register("alice@example.com", "hunter22").await;
    let (_, login) = app.login("alice@example.com", "hunter22").await;
    let refresh = login["refresh_token"].as_str().unwrap().to_string();

    let (status, _) = app
        .send(
            Method::POST,
            "/auth/forgot-password",
            None,
            Some(json!({ "email": "alice@example.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let delivery = app.deliveries.recv().await.unwrap();
    assert_eq!(delivery.email, "alice@example.com");
    assert!(delivery.reset_url.ends_with(&delivery.token));
    let token = delivery.token;

    let check_uri = format!("/auth/validate-reset-token/{token}");
    let (status, body) = app.send(Method::GET, &check_uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "valid": true }));

    let (status, _) = app
        .send(
            Method::POST,
            "/auth/reset-password",
            None,
            Some(json!({ "token": token, "newPassword": "newpass1" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.login("alice@example.com", "hunter22").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.login("alice@example.com", "newpass1").await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.send(Method::GET, &check_uri, None, None).await;
    assert_eq!(body["valid"], false);
    assert_eq!(body["message"], "Invalid or expired token");

    let (status, body) = app
        .send(
            Method::POST,
            "/auth/reset-password",
            None,
            Some(json!({ "token": token, "newPassword": "another1" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_token");

    // Sessions issued before the reset are gone
    let (status, _) = app
        .send(
            Method::POST,
            "/auth/refresh",
            None,
            Some(json!({ "refresh_token": refresh })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn forgot_password_does_not_reveal_accounts() {
    let mut app = test_app();
    app.register("alice@example.com", "hunter22").await;

    let (known_status, known) = app
        .send(
            Method::POST,
            "/auth/forgot-password",
            None,
            Some(json!({ "email": "alice@example.com" })),
        )
        .await;
    let (unknown_status, unknown) = app
        .send(
            Method::POST,
            "/auth/forgot-password",
            None,
            Some(json!({ "email": "nobody@example.com" })),
        )
        .await;

    assert_eq!(known_status, unknown_status);
    assert_eq!(known, unknown);

    assert!(app.deliveries.recv().await.is_some());
    assert!(app.deliveries.try_recv().is_err());
    assert_eq!(app.store.reset_token_count().await, 1);
}

#[tokio::test]
async fn guard_distinguishes_authentication_from_authorization() {
    let app = test_app();
    app.register("alice@example.com", "hunter22").await;
    let (_, login) = app.login("alice@example.com", "hunter22").await;
    let access = login["access_token"].as_str().unwrap();

    let (status, body) = app.send(Method::GET, "/users", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let (status, body) = app.send(Method::GET, "/users", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_token");

    let (status, body) = app.send(Method::GET, "/users", Some(access), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let admin = app.seed_admin().await;
    let (status, body) = app.send(Method::GET, "/users", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn admin_deactivation_ends_sessions() {
    let app = test_app();
    let admin = app.seed_admin().await;

    let (status, created) = app
        .send(
            Method::POST,
            "/users",
            Some(&admin),
            Some(json!({
                "email": "editor@example.com",
                "password": "editorpass",
                "firstName": "Eve",
                "roles": ["editor"]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["roles"], json!(["editor"]));
    assert_eq!(created["firstName"], "Eve");
    assert!(created.get("passwordHash").is_none());

    let (_, login) = app.login("editor@example.com", "editorpass").await;
    let refresh = login["refresh_token"].as_str().unwrap().to_string();

    let id = created["id"].as_str().unwrap();
    let (status, _) = app
        .send(Method::DELETE, &format!("/users/{id}"), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .send(
            Method::POST,
            "/auth/refresh",
            None,
            Some(json!({ "refresh_token": refresh })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.login("editor@example.com", "editorpass").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .send(
            Method::PATCH,
            &format!("/users/{id}"),
            Some(&admin),
            Some(json!({ "roles": ["root"] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["roles"].is_array());
}

#[tokio::test]
async fn audit_log_records_mutations_without_bodies() {
    let app = test_app();
    let admin = app.seed_admin().await;
    app.register("alice@example.com", "hunter22").await;

    let mut entries = Vec::new();
    for _ in 0..50 {
        let (status, body) = app
            .send(Method::GET, "/audit/logs?limit=10", Some(&admin), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        entries = body.as_array().cloned().unwrap_or_default();
        if entries.len() >= 2 {
            break;
        }
        tokio::task::yield_now().await;
    }

    assert!(entries.len() >= 2);
    assert_eq!(entries[0]["resource"], "/auth/register");
    assert_eq!(entries[0]["action"], "POST");
    assert_eq!(entries[0]["status"], 201);
    assert!(!Value::Array(entries).to_string().contains("hunter22"));
}
