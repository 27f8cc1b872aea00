//! tagsync-server - PLC tag synchronization service
//!
//! Serves the live sync WebSocket, bulk import/export and vendor
//! utilities over HTTP.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tagsync_common::api::auth::initialize_admin_token;
use tagsync_common::config::{load_or_default, RootFolderInitializer, RootFolderResolver};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tagsync_server::AppState;

/// Command-line arguments for tagsync-server
#[derive(Parser, Debug)]
#[command(name = "tagsync-server")]
#[command(about = "PLC tag synchronization service")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides the configured bind address's port)
    #[arg(short, long, env = "TAGSYNC_PORT")]
    port: Option<u16>,

    /// Address to bind, e.g. 127.0.0.1:5760
    #[arg(short, long, env = "TAGSYNC_BIND")]
    bind: Option<String>,

    /// Root folder holding the tag database
    #[arg(short, long, env = "TAGSYNC_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long, env = "TAGSYNC_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_or_default(args.config.as_deref());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("tagsync_server={0},tagsync_common={0},tower_http=info", config.logging.level)
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting tagsync-server v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let root_folder = RootFolderResolver::new("tagsync-server")
        .with_cli_arg(args.root_folder.clone())
        .with_toml(&config)
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;

    let db_path = initializer.database_path();
    info!("Database: {}", db_path.display());
    let db = tagsync_common::db::init_database(&db_path)
        .await
        .context("Failed to open database")?;

    if config.auth.disabled {
        warn!("Authentication is disabled; every client is '{}'", tagsync_server::auth::ANONYMOUS);
    } else if config.auth.tokens.is_empty() {
        match initialize_admin_token(&db).await {
            Ok(Some(token)) => {
                info!("Generated admin API token (shown once): {}", token);
            }
            Ok(None) => {}
            Err(e) => warn!("Could not initialize admin token: {}", e),
        }
    }

    let state = AppState::new(db, &config);
    let app = tagsync_server::build_router(state);

    let mut addr: SocketAddr = args
        .bind
        .as_deref()
        .unwrap_or(&config.server.bind)
        .parse()
        .context("Invalid bind address")?;
    if let Some(port) = args.port {
        addr.set_port(port);
    }

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Live sync: ws://{}/ws", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
