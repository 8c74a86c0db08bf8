//! Sensor Pipeline - Binary Entry Point
//!
//! Runs the HTTP surface, the committing consumer and the aggregator in one
//! process until Ctrl-C or SIGTERM.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use sensor_pipeline::api::{create_router, AppState};
use sensor_pipeline::{
    Aggregator, AppConfig, CommittingConsumer, EventLog, JsonlReadingStore, ReadingStore,
    SummaryStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("failed to load configuration")?;
    let _log_guard =
        sensor_pipeline::telemetry::init_logging(&config).context("failed to initialise logging")?;

    info!(
        service = %config.service_name,
        version = sensor_pipeline::VERSION,
        data_dir = %config.data_dir.display(),
        "Starting"
    );

    let log = Arc::new(EventLog::open(config.event_log_config()).context("failed to open event log")?);
    let store_config = config.store_config();
    let store: Arc<dyn ReadingStore> =
        Arc::new(JsonlReadingStore::open(store_config.clone()).context("failed to open reading store")?);
    let summaries =
        SummaryStore::open(store_config.summary_path()).context("failed to open summary store")?;

    let token = CancellationToken::new();

    let consumer = CommittingConsumer::new(log.clone(), store.clone(), config.consumer_config())
        .spawn(token.clone());
    let aggregator = Aggregator::new(store.clone(), summaries.clone(), config.aggregator_config())
        .spawn(token.clone());

    let state = Arc::new(AppState::new(log, store, summaries));
    let router = create_router(state, config.cors_allow_all);

    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .with_context(|| format!("invalid listen_addr `{}`", config.listen_addr))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(%addr, "HTTP server listening");

    let served = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    token.cancel();
    if let Err(e) = consumer.await {
        warn!(error = %e, "Consumer task ended abnormally");
    }
    if let Err(e) = aggregator.await {
        warn!(error = %e, "Aggregator task ended abnormally");
    }

    served.context("HTTP server failed")?;
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
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
                warn!(error = %e, "Failed to listen for SIGTERM");
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

    info!("Shutdown signal received");
}
