// Background tasks beside the device workers: the event journal writer and
// the housekeeping loop (app stats, retention pruning).

use crate::history_repo::HistoryRepo;
use crate::hub::Hub;
use crate::models::EventEnvelope;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Duration, Instant, MissedTickBehavior, interval, interval_at};

/// Channel capacity for the journal writer (backpressure if the writer falls behind).
pub fn writer_channel_capacity(flush_rate: u64) -> usize {
    (flush_rate as usize * 2).max(32)
}

/// Writer config: batching for the journal writer task.
pub struct HistoryWriterConfig {
    pub flush_rate: u64,
    pub flush_interval_secs: u64,
}

/// Spawns the task that receives device events and flushes them to the DB.
/// Flushes when the buffer reaches flush_rate, every flush_interval_secs, and
/// once more when every sender is gone.
pub fn spawn_history_writer(
    mut write_rx: mpsc::Receiver<EventEnvelope>,
    history_repo: Arc<HistoryRepo>,
    config: HistoryWriterConfig,
    events_saved_total: Arc<AtomicU64>,
) -> tokio::task::JoinHandle<()> {
    let flush_interval = Duration::from_secs(config.flush_interval_secs);
    tokio::spawn(async move {
        let mut buffer: Vec<EventEnvelope> = Vec::new();
        let mut flush_tick = interval_at(Instant::now() + flush_interval, flush_interval);
        flush_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                result = write_rx.recv() => {
                    match result {
                        Some(event) => {
                            buffer.push(event);
                            if buffer.len() >= config.flush_rate as usize
                                && let Err(e) = flush_buffer(&history_repo, &mut buffer, &events_saved_total).await
                            {
                                tracing::warn!(error = %e, "history writer: save_events failed");
                            }
                        }
                        None => break,
                    }
                }
                _ = flush_tick.tick() => {
                    if let Err(e) = flush_buffer(&history_repo, &mut buffer, &events_saved_total).await {
                        tracing::warn!(error = %e, "history writer: save_events failed");
                    }
                }
            }
        }
        if let Err(e) = flush_buffer(&history_repo, &mut buffer, &events_saved_total).await {
            tracing::warn!(error = %e, "history writer: final flush failed");
        }
        tracing::debug!("History writer shutting down");
    })
}

async fn flush_buffer(
    history_repo: &HistoryRepo,
    buffer: &mut Vec<EventEnvelope>,
    events_saved_total: &AtomicU64,
) -> anyhow::Result<()> {
    if buffer.is_empty() {
        return Ok(());
    }
    let n = buffer.len();
    history_repo.save_events(buffer).await?;
    events_saved_total.fetch_add(n as u64, Ordering::Relaxed);
    buffer.clear();
    tracing::debug!(operation = "save_events", events_count = n, "Events saved");
    Ok(())
}

/// Shared state and shutdown for the housekeeping loop.
pub struct HousekeepingDeps {
    pub hub: Arc<Hub>,
    pub history_repo: Arc<HistoryRepo>,
    pub ws_event_connections: Arc<AtomicUsize>,
    pub events_saved_total: Arc<AtomicU64>,
    pub shutdown_rx: oneshot::Receiver<()>,
}

/// Real-time intervals of the housekeeping loop.
pub struct HousekeepingConfig {
    pub stats_log_interval_secs: u64,
    pub prune_interval_secs: u64,
}

pub fn spawn_housekeeping(
    deps: HousekeepingDeps,
    config: HousekeepingConfig,
) -> tokio::task::JoinHandle<()> {
    let HousekeepingDeps {
        hub,
        history_repo,
        ws_event_connections,
        events_saved_total,
        mut shutdown_rx,
    } = deps;

    tokio::spawn(async move {
        let mut stats_log_tick = interval(Duration::from_secs(config.stats_log_interval_secs));
        stats_log_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut prune_tick = interval(Duration::from_secs(config.prune_interval_secs));
        prune_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut events_pruned_total: u64 = 0;

        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    tracing::debug!("Housekeeping shutting down");
                    break;
                }
                _ = stats_log_tick.tick() => {
                    let views = hub.list().await;
                    let available = views.iter().filter(|v| v.available).count();
                    tracing::info!(
                        devices = views.len(),
                        devices_available = available,
                        ws_event_clients = ws_event_connections.load(Ordering::Relaxed),
                        events_saved_total = events_saved_total.load(Ordering::Relaxed),
                        events_pruned_total,
                        "app stats"
                    );
                }
                _ = prune_tick.tick() => {
                    match history_repo.prune_old_data().await {
                        Ok(n) => {
                            events_pruned_total += n;
                            tracing::debug!(operation = "prune_old_data", pruned = n, "Old events pruned");
                        }
                        Err(e) => {
                            tracing::warn!(
                                error = %e,
                                operation = "prune_old_data",
                                "Failed to prune old events"
                            );
                        }
                    }
                }
            }
        }
    })
}
