//! Prometheus exporter for AirGradient sensors.

use std::sync::Arc;

use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};

use airgradient_exporter::lifecycle::shutdown_signal;
use airgradient_exporter::{AppState, ExporterArgs, HttpServer, MetricRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = ExporterArgs::parse();

    // Load configuration
    let config = args.resolve()?;

    // Initialize logging
    airgradient_common::init_tracing(&config.logging)?;

    info!(
        address = %config.http.address,
        port = config.http.port,
        path = %config.http.path,
        "Starting AirGradient exporter"
    );

    let listen_addr = config.http.listen_addr().await?;

    // Create the registry
    let registry = Arc::new(MetricRegistry::new(&config.http.prefix));
    let state = AppState::new(registry.clone(), config.device.clone());

    // Create shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let http_server = HttpServer::new(state, listen_addr, config.http.path.clone());
    if let Err(e) = http_server.run(shutdown_rx).await {
        error!(error = %e, "HTTP server error");
        return Err(e.into());
    }

    // Print final stats
    let stats = registry.stats();
    info!(
        measurements_recorded = stats.measurements_recorded,
        counter_deltas_rejected = stats.counter_deltas_rejected,
        devices = registry.device_count(),
        series_count = registry.series_count(),
        "Final statistics"
    );

    info!("Exporter stopped");
    Ok(())
}
