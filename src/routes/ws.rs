// WebSocket event stream

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use bytes::Bytes;
use serde::Deserialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::broadcast;
use tokio::time::{Duration, timeout};

use super::AppState;
use crate::hub::DeviceView;
use crate::models::EventEnvelope;

pub(super) const WS_PING_INTERVAL: Duration = Duration::from_secs(30);
pub(super) const WS_SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Decrements the /ws/events connection count on drop (connect = +1, drop = -1).
struct WsEventsGuard(Arc<AtomicUsize>);

impl Drop for WsEventsGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct EventsFilter {
    /// Only stream events of this device.
    device: Option<String>,
}

pub(super) async fn ws_events(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(filter): Query<EventsFilter>,
) -> impl IntoResponse {
    let conn_count = state.ws_event_connections.clone();
    let hub = state.hub.clone();
    ws.on_upgrade(move |socket| async move {
        let mut rx = hub.subscribe();
        let devices = hub.list().await;
        if let Err(e) = stream_events(socket, &mut rx, conn_count, devices, filter.device).await {
            tracing::info!("Event stream error: {}", e);
        }
    })
}

async fn send_json(socket: &mut WebSocket, json: String) -> bool {
    let r = timeout(WS_SEND_TIMEOUT, socket.send(Message::Text(json.into()))).await;
    matches!(r, Ok(Ok(())))
}

async fn stream_events(
    mut socket: WebSocket,
    rx: &mut broadcast::Receiver<EventEnvelope>,
    conn_count: Arc<AtomicUsize>,
    devices: Vec<DeviceView>,
    device_filter: Option<String>,
) -> anyhow::Result<()> {
    conn_count.fetch_add(1, Ordering::Relaxed);
    let _guard = WsEventsGuard(conn_count);
    tracing::info!(device = ?device_filter, "Client connected to event stream");

    let devices: Vec<DeviceView> = devices
        .into_iter()
        .filter(|d| device_filter.as_deref().is_none_or(|f| f == d.id))
        .collect();
    let welcome = serde_json::json!({ "type": "info", "devices": devices });
    if !send_json(&mut socket, serde_json::to_string(&welcome)?).await {
        return Ok(());
    }

    let mut ping_interval = tokio::time::interval(WS_PING_INTERVAL);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(envelope) => {
                        if device_filter.as_deref().is_some_and(|f| f != envelope.device_id) {
                            continue;
                        }
                        if !send_json(&mut socket, serde_json::to_string(&envelope)?).await {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("WebSocket /ws/events client lagged, skipped {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            _ = ping_interval.tick() => {
                let r = timeout(WS_SEND_TIMEOUT, socket.send(Message::Ping(Bytes::new()))).await;
                if !matches!(r, Ok(Ok(()))) {
                    break;
                }
            }
        }
    }
    Ok(())
}
