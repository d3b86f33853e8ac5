use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kosbaliku::config::Config;
use kosbaliku::storage::LocalStorage;
use kosbaliku::AppState;

#[derive(Parser, Debug)]
#[command(name = "kosbaliku")]
#[command(author, version, about = "Owner and admin dashboard backend for kos listings", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "kosbaliku.toml", env = "KOSBALIKU_CONFIG")]
    config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config)?;

    // Initialize logging
    let log_level = cli
        .log_level
        .as_ref()
        .unwrap_or(&config.logging.level)
        .clone();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting KosBaliku v{}", env!("CARGO_PKG_VERSION"));

    // Ensure data and upload directories exist
    kosbaliku::utils::ensure_dir(&config.server.data_dir)?;
    kosbaliku::utils::ensure_dir(&config.storage.uploads_dir)?;

    // Initialize database
    let db = kosbaliku::db::init(&config.server.data_dir).await?;

    // Ensure the bootstrap admin exists
    kosbaliku::api::auth::ensure_admin_user(
        &db,
        &config.auth.admin_email,
        config.auth.admin_password.as_deref(),
    )
    .await?;

    let storage = Arc::new(LocalStorage::new(
        &config.storage.uploads_dir,
        &config.storage.public_base_url,
    ));

    let uploads_dir = config.storage.uploads_dir.clone();
    let addr = format!("{}:{}", config.server.host, config.server.port);

    let state = Arc::new(AppState::new(config, db, storage));

    // Uploaded images are served straight from the uploads directory
    let app = kosbaliku::api::create_router(state).nest_service("/uploads", ServeDir::new(uploads_dir));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("API server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
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
