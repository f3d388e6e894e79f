use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{info, warn};

use reviewer_server::config::{Config, StorageBackend};
use reviewer_server::metrics::ReviewCounters;
use reviewer_server::repository::{InMemoryStore, SqliteStore, Store};
use reviewer_server::{router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env().context("Failed to load configuration from environment")?;

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .init();

    info!("Starting pull request reviewer service");

    match config.storage_backend {
        StorageBackend::Sqlite => {
            let db_path = config.database_path();
            info!("Using state database: {}", db_path.display());
            let store = SqliteStore::new(&db_path).with_context(|| {
                format!("Failed to initialize SQLite database at {}", db_path.display())
            })?;
            serve(config, store).await
        }
        StorageBackend::Memory => {
            warn!("Using in-memory storage; all state is lost on restart");
            serve(config, InMemoryStore::new()).await
        }
    }
}

async fn serve<S: Store>(config: Config, store: S) -> Result<()> {
    let metrics = Arc::new(ReviewCounters::new());
    let state = Arc::new(AppState::new(Arc::new(store), metrics));
    let app = router(state);

    let addr = SocketAddr::new(config.bind_address, config.port);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Server listening on {}", addr);

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = stop_rx.await;
            })
            .await
    });

    tokio::select! {
        finished = &mut server => {
            finished.context("Server task panicked")?.context("Server error")?;
            return Ok(());
        }
        _ = shutdown_signal() => {}
    }

    info!(
        "Shutdown signal received, draining requests for up to {:?}",
        config.shutdown_grace
    );
    let _ = stop_tx.send(());

    match tokio::time::timeout(config.shutdown_grace, server).await {
        Ok(finished) => {
            finished.context("Server task panicked")?.context("Server error")?;
            info!("Server stopped");
        }
        Err(_) => warn!("Grace period elapsed with requests still in flight"),
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
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
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
