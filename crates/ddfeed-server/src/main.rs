//! Server entry point for the ddfeed service.
//!
//! Loads layered settings, connects to `PostgreSQL` (with retries) and
//! `Valkey`, applies migrations, then serves the feed API until Ctrl-C or
//! SIGTERM.
//!
//! # Architecture
//!
//! ```text
//! settings --> PostgresPool --> PostStore --+
//!          --> ValkeyPool ------------------+--> FeedCoordinator --> Router
//! ```
//!
//! The cache is optional at runtime: if `Valkey` is down at startup the
//! server still comes up and every request falls through to the store.

mod settings;
mod telemetry;

use std::sync::Arc;

use anyhow::Context;
use ddfeed_api::{AppState, start_server};
use ddfeed_core::FeedCoordinator;
use ddfeed_db::{PostStore, PostgresPool, ValkeyPool};
use tracing::{info, warn};

/// Application entry point.
///
/// # Errors
///
/// Returns an error if settings are invalid, the database stays
/// unreachable after every attempt, migrations fail, or the listener
/// cannot bind.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = settings::load().context("failed to load settings")?;
    telemetry::init(settings.log_format);

    info!(
        host = settings.server.host,
        port = settings.server.port,
        identity_scheme = %settings.identity_scheme,
        cache_url = settings.valkey.url,
        db_max_connections = settings.postgres.max_connections,
        "ddfeed-server starting"
    );

    let postgres =
        PostgresPool::connect_with_retry(&settings.postgres, settings.db_connect_attempts)
            .await
            .context("failed to connect to PostgreSQL")?;

    if settings.run_migrations {
        postgres
            .run_migrations()
            .await
            .context("failed to apply migrations")?;
        info!("migrations applied");
    }

    let valkey = Arc::new(
        ValkeyPool::connect(&settings.valkey)
            .await
            .context("failed to configure the Valkey client")?,
    );
    if !valkey.is_connected() {
        warn!(url = settings.valkey.url, "cache not reachable yet, serving from the store");
    }

    let store = Arc::new(PostStore::new(&postgres, settings.identity_scheme));
    if let Err(e) = store.check_schema().await {
        warn!(error = %e, "schema check failed, readiness will report it");
    }

    let feed = Arc::new(FeedCoordinator::new(store, valkey.clone()));
    let state = Arc::new(AppState::new(feed));

    start_server(&settings.server, state, shutdown_signal())
        .await
        .context("feed server failed")?;

    valkey.close().await;
    postgres.close().await;
    info!("ddfeed-server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM.
///
/// A signal whose handler cannot be installed never fires, so the other
/// one still triggers shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received Ctrl-C, shutting down"),
        () = terminate => info!("received SIGTERM, shutting down"),
    }
}
