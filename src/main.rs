use anyhow::Result;
use rpiwatch::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize};
use tokio::sync::{broadcast, mpsc};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

/// Journal writer flushes partial batches this often.
const JOURNAL_FLUSH_INTERVAL_SECS: u64 = 5;

const WRITER_SHUTDOWN_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm = match tokio::signal::unix::signal(
            tokio::signal::unix::SignalKind::terminate(),
        ) {
            Ok(s) => s,
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;

    let history_repo = Arc::new(
        history_repo::HistoryRepo::connect(
            &app_config.database.path,
            app_config.database.max_pool_size,
            app_config.database.retention_days,
        )
        .await?,
    );
    history_repo.init().await?;

    let (events_tx, _) =
        broadcast::channel::<models::EventEnvelope>(app_config.publishing.broadcast_capacity);
    let (write_tx, write_rx) =
        mpsc::channel(worker::writer_channel_capacity(app_config.database.flush_rate));
    let events_saved_total = Arc::new(AtomicU64::new(0));
    let writer_handle = worker::spawn_history_writer(
        write_rx,
        history_repo.clone(),
        worker::HistoryWriterConfig {
            flush_rate: app_config.database.flush_rate,
            flush_interval_secs: JOURNAL_FLUSH_INTERVAL_SECS,
        },
        events_saved_total.clone(),
    );

    let hub = Arc::new(hub::Hub::new(
        events_tx,
        write_tx,
        device::ssh_shell_factory(),
    ));
    for device in app_config.devices.clone() {
        hub.add_device(device).await?;
    }
    tracing::info!(devices = app_config.devices.len(), "devices configured");

    let ws_event_connections = Arc::new(AtomicUsize::new(0));
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let housekeeping_handle = worker::spawn_housekeeping(
        worker::HousekeepingDeps {
            hub: hub.clone(),
            history_repo: history_repo.clone(),
            ws_event_connections: ws_event_connections.clone(),
            events_saved_total,
            shutdown_rx,
        },
        worker::HousekeepingConfig {
            stats_log_interval_secs: app_config.monitoring.stats_log_interval_secs,
            prune_interval_secs: app_config.monitoring.prune_interval_secs,
        },
    );

    let app = routes::app(hub.clone(), history_repo, ws_event_connections);
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = shutdown_signal() => {
            tracing::info!("Received shutdown signal");
        }
    }

    let _ = shutdown_tx.send(());
    let _ = housekeeping_handle.await;
    hub.shutdown().await;
    // Once the last journal sender is gone the writer flushes and exits.
    drop(hub);
    if tokio::time::timeout(WRITER_SHUTDOWN_TIMEOUT, writer_handle)
        .await
        .is_err()
    {
        tracing::warn!("history writer did not finish in time");
    }

    Ok(())
}
