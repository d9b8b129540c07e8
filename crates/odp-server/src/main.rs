//! ODP Server - Main entry point

use anyhow::Result;
use odp_common::logging::{init_logging, LogConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use odp_server::{
    api,
    catalog::bootstrap::seed_reference_data,
    config::Config,
    db,
    features::FeatureState,
    ingest::{CollectorRegistry, IngestSettings, Orchestrator},
    store::{PgStore, ReadStore},
};

#[tokio::main]
async fn main() -> Result<()> {
    let log_config = LogConfig::builder()
        .log_file_prefix("odp-server")
        .filter_directives("odp_server=debug,tower_http=debug,sqlx=warn")
        .build()
        .merge_env()?;

    let _guard = init_logging(&log_config)?;

    info!("Starting ODP Server");

    let config = Config::load()?;
    info!(
        "Configuration loaded - server will bind to {}:{}",
        config.server.host, config.server.port
    );

    let pool = db::create_pool(&config.database).await?;
    info!("Database connection pool established");

    db::run_migrations(&pool).await?;
    info!("Database migrations completed");

    let store = Arc::new(PgStore::new(pool));

    let report = seed_reference_data(store.as_ref()).await?;
    if !report.is_empty() {
        info!(
            countries = report.countries_added,
            sources = report.sources_added,
            categories = report.categories_added,
            "Reference data seeded"
        );
    }

    let collectors = match CollectorRegistry::from_directory(&config.ingest.collector_dir) {
        Ok(registry) => registry,
        Err(e) => {
            warn!(
                dir = %config.ingest.collector_dir.display(),
                error = %e,
                "Collector directory unavailable, no sources can be ingested"
            );
            CollectorRegistry::new()
        }
    };
    info!(sources = ?collectors.codes(), "Collectors registered");

    let orchestrator = Arc::new(Orchestrator::new(
        store.clone(),
        collectors,
        IngestSettings::from(&config.ingest),
    ));

    let stale_threshold = config.ingest.stale_run_threshold();
    match orchestrator.runs().stale_runs(stale_threshold).await {
        Ok(stale) => {
            for entry in &stale {
                warn!(
                    run_id = entry.run.id,
                    source = %entry.run.source_code,
                    running_for_secs = entry.running_for_secs,
                    "Stale ingestion run needs reconciliation"
                );
            }
        }
        Err(e) => warn!(error = %e, "Failed to check for stale ingestion runs"),
    }

    let shutdown = CancellationToken::new();
    let read: Arc<dyn ReadStore> = store;
    let state = FeatureState {
        orchestrator,
        read,
        stale_run_threshold: stale_threshold,
        shutdown: shutdown.clone(),
    };

    let app = api::create_router(state, &config.cors);

    tokio::spawn(shutdown_signal(
        shutdown.clone(),
        config.server.shutdown_timeout_secs,
    ));

    api::serve(&config, app, shutdown).await?;

    Ok(())
}

/// Cancel `shutdown` on Ctrl+C or SIGTERM
///
/// In-flight ingestion runs observe the cancellation, finalize as failed and
/// release their source locks before the server stops accepting requests.
async fn shutdown_signal(shutdown: CancellationToken, timeout_secs: u64) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }

    shutdown.cancel();

    info!("Waiting up to {} seconds for connections to close", timeout_secs);
    tokio::time::sleep(Duration::from_secs(timeout_secs)).await;
    warn!("Shutdown timeout elapsed, exiting");
    std::process::exit(1);
}
