mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use tabula_api::state::{AppState, AppStateInner};
use tabula_core::Collab;
use tabula_core::cleanup::run_cleanup_listener;
use tabula_core::dispatcher::Dispatcher;
use tabula_core::providers::DiskFileStore;
use tabula_db::Database;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tabula=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    let db = Arc::new(Database::open(&config.db_path)?);
    let files = Arc::new(DiskFileStore::new(db.clone(), config.file_root.clone()));
    let collab = Arc::new(Collab::new(db.clone(), files));

    match std::env::args().nth(1).as_deref() {
        None | Some("serve") => serve(config, db, collab).await,
        Some("purge-activity") => purge_activity(&config, collab).await,
        Some(other) => anyhow::bail!("unknown command '{}' (expected serve or purge-activity)", other),
    }
}

async fn serve(config: Config, db: Arc<Database>, collab: Arc<Collab>) -> anyhow::Result<()> {
    let dispatcher = Dispatcher::new();
    tokio::spawn(run_cleanup_listener(collab.clone(), dispatcher.subscribe()));

    let state: AppState = Arc::new(AppStateInner {
        db,
        collab,
        dispatcher,
        jwt_secret: config.jwt_secret,
        hook_token: config.hook_token,
        admins: config.admins,
    });

    let app = tabula_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Tabula server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// One retention sweep. Meant to be run by an external scheduler.
async fn purge_activity(config: &Config, collab: Arc<Collab>) -> anyhow::Result<()> {
    let cutoff = Utc::now() - Duration::days(config.retention_days);
    info!("Purging activity older than {} days", config.retention_days);

    let removed =
        tokio::task::spawn_blocking(move || collab.activity.delete_older_than(cutoff)).await??;
    info!("Purge complete: {} activity records removed", removed);
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received Ctrl+C, shutting down...");
}
