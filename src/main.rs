use std::sync::Arc;

use tracing::info;

use consultcal::config::Config;
use consultcal::confirmer::{confirm_due, run_compactor, run_confirmer};
use consultcal::notify::NotifyHub;
use consultcal::store::{now_ms, Store};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env();
    consultcal::observability::init(config.metrics_port)?;

    std::fs::create_dir_all(&config.data_dir)?;
    let notify = Arc::new(NotifyHub::new());
    let store = Arc::new(Store::open(config.wal_path(), notify, config.confirm_delay_ms)?);

    info!("consultcal worker started");
    info!("  data_dir: {}", config.data_dir.display());
    info!("  confirm_delay: {}ms", config.confirm_delay_ms);
    info!("  sweep_interval: {:?}", config.sweep_interval);
    info!("  compact_threshold: {}", config.compact_threshold);
    info!("  metrics: {}", config.metrics_port.map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics")));

    // Drafts whose deadline passed while the worker was down.
    let caught_up = confirm_due(&store, now_ms()).await;
    if caught_up > 0 {
        info!("confirmed {caught_up} overdue bookings after replay");
    }

    let confirmer = tokio::spawn(run_confirmer(store.clone(), config.sweep_interval));
    let compactor = tokio::spawn(run_compactor(
        store.clone(),
        config.sweep_interval * 10,
        config.compact_threshold,
    ));

    shutdown_signal().await?;
    info!("shutdown signal received, stopping jobs");
    confirmer.abort();
    compactor.abort();

    if let Err(e) = store.compact_wal().await {
        tracing::warn!("final WAL compaction failed: {e}");
    }
    info!("consultcal stopped");
    Ok(())
}

async fn shutdown_signal() -> std::io::Result<()> {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            r = ctrl_c => r?,
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await?;
    }
    Ok(())
}
