// Journal writer and housekeeping: batching, final flush, pruning, shutdown

mod common;

use chrono::{DateTime, TimeDelta, Utc};
use rpiwatch::history_repo::HistoryRepo;
use rpiwatch::hub::Hub;
use rpiwatch::models::{DeviceEvent, EventEnvelope};
use rpiwatch::worker::{
    HistoryWriterConfig, HousekeepingConfig, HousekeepingDeps, spawn_history_writer,
    spawn_housekeeping, writer_channel_capacity,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio::sync::{broadcast, mpsc, oneshot};

fn envelope(pin: u8, created_at: DateTime<Utc>) -> EventEnvelope {
    EventEnvelope {
        device_id: "pi-kitchen".into(),
        created_at,
        event: DeviceEvent::GpioWentHigh { pin },
    }
}

fn now_ms() -> DateTime<Utc> {
    DateTime::from_timestamp_millis(Utc::now().timestamp_millis()).unwrap()
}

async fn history_repo(dir: &tempfile::TempDir) -> Arc<HistoryRepo> {
    let path = dir.path().join("events.db");
    let repo = HistoryRepo::connect(path.to_str().unwrap(), 2, 30)
        .await
        .unwrap();
    repo.init().await.unwrap();
    Arc::new(repo)
}

#[test]
fn writer_capacity_has_a_floor() {
    assert_eq!(writer_channel_capacity(1), 32);
    assert_eq!(writer_channel_capacity(100), 200);
}

#[tokio::test]
async fn writer_flushes_at_rate_and_on_close() {
    let dir = tempfile::TempDir::new().unwrap();
    let repo = history_repo(&dir).await;
    let saved = Arc::new(AtomicU64::new(0));
    let (write_tx, write_rx) = mpsc::channel(writer_channel_capacity(2));
    let handle = spawn_history_writer(
        write_rx,
        repo.clone(),
        HistoryWriterConfig {
            flush_rate: 2,
            flush_interval_secs: 3600,
        },
        saved.clone(),
    );

    let t = now_ms();
    write_tx.send(envelope(1, t)).await.unwrap();
    write_tx.send(envelope(2, t)).await.unwrap();
    write_tx.send(envelope(3, t)).await.unwrap();

    // Two events hit the flush rate; the third waits for the final flush.
    for _ in 0..100 {
        if saved.load(Ordering::Relaxed) >= 2 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(saved.load(Ordering::Relaxed), 2);

    drop(write_tx);
    handle.await.unwrap();
    assert_eq!(saved.load(Ordering::Relaxed), 3);

    let stored = repo.get_recent_events("pi-kitchen", 10).await.unwrap();
    let pins: Vec<DeviceEvent> = stored.into_iter().map(|e| e.event).collect();
    assert_eq!(
        pins,
        vec![
            DeviceEvent::GpioWentHigh { pin: 1 },
            DeviceEvent::GpioWentHigh { pin: 2 },
            DeviceEvent::GpioWentHigh { pin: 3 },
        ]
    );
}

#[tokio::test]
async fn housekeeping_prunes_and_stops_on_shutdown() {
    let dir = tempfile::TempDir::new().unwrap();
    let repo = history_repo(&dir).await;
    repo.save_events(&[
        envelope(1, now_ms() - TimeDelta::days(45)),
        envelope(2, now_ms()),
    ])
    .await
    .unwrap();

    let (events_tx, _) = broadcast::channel(16);
    let (journal_tx, _journal_rx) = mpsc::channel(16);
    let factory = common::fake_factory(Arc::new(common::FakeShell::raspberry_pi()));
    let hub = Arc::new(Hub::new(events_tx, journal_tx, factory));

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let handle = spawn_housekeeping(
        HousekeepingDeps {
            hub,
            history_repo: repo.clone(),
            ws_event_connections: Arc::new(AtomicUsize::new(0)),
            events_saved_total: Arc::new(AtomicU64::new(0)),
            shutdown_rx,
        },
        HousekeepingConfig {
            stats_log_interval_secs: 3600,
            prune_interval_secs: 3600,
        },
    );

    // Both intervals fire immediately on their first tick.
    for _ in 0..100 {
        if repo.get_recent_events("pi-kitchen", 10).await.unwrap().len() == 1 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    let remaining = repo.get_recent_events("pi-kitchen", 10).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].event, DeviceEvent::GpioWentHigh { pin: 2 });

    shutdown_tx.send(()).unwrap();
    handle.await.unwrap();
}
