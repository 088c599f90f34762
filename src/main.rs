//! WorldAdmin authentication server binary.

use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use worldadmin_auth::{
    create_routes, AppState, AuthConfig, AuthService, LogNotifier, MemoryStore, PgStore,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,worldadmin_auth=debug")),
        )
        .init();

    let config = AuthConfig::from_env()?;
    config.validate()?;

    let port: u16 = match std::env::var("PORT") {
        Ok(raw) => raw.parse()?,
        Err(_) => 3001,
    };
    let notifier = Arc::new(LogNotifier);

    let state = match std::env::var("DATABASE_URL") {
        Ok(database_url) => {
            let max_connections: u32 = match std::env::var("DATABASE_MAX_CONNECTIONS") {
                Ok(raw) => raw.parse()?,
                Err(_) => 5,
            };
            info!(max_connections, "configuring connection pool");

            let pool = PgPoolOptions::new()
                .max_connections(max_connections)
                .acquire_timeout(std::time::Duration::from_secs(30))
                .connect(&database_url)
                .await?;

            let store = Arc::new(PgStore::new(pool));
            store.run_migrations().await?;

            let auth = Arc::new(AuthService::with_store(config, store.clone(), notifier)?);
            AppState::new(auth, store.clone(), store)
        }
        Err(_) => {
            warn!("DATABASE_URL not set; using in-memory store, data will not survive a restart");

            let store = Arc::new(MemoryStore::new());
            let auth = Arc::new(AuthService::with_store(config, store.clone(), notifier)?);
            AppState::new(auth, store.clone(), store)
        }
    };

    let app = create_routes(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!(addr = %listener.local_addr()?, "worldadmin-auth listening");

    axum::serve(listener, app).await?;
    Ok(())
}
