//! LMS authentication server
//!
//! Serves the auth routes over PostgreSQL-backed stores.

use lms_auth::{
    handlers::create_routes, initialize, postgres_service, sweep::spawn_refresh_token_sweep,
    AuthConfig, ServerConfig,
};

use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("lms_auth=info,tower_http=info")),
        )
        .with_target(true)
        .init();

    let server = ServerConfig::from_env()?;
    let config = AuthConfig::from_env()?;
    let sweep_every = Duration::from_secs(config.sweep_interval_seconds);

    let db = PgPoolOptions::new()
        .max_connections(10)
        .connect(&server.database_url)
        .await?;
    tracing::info!("Connected to database");

    let service = Arc::new(postgres_service(db.clone(), config)?);
    initialize(&db, &service).await?;

    let sweep = spawn_refresh_token_sweep(service.refresh_tokens().clone(), sweep_every);

    let app = create_routes(service).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&server.bind_addr).await?;
    tracing::info!(addr = %server.bind_addr, "Authentication server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = sweep {
        handle.abort();
    }
    db.close().await;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
