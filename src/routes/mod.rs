// HTTP + WebSocket routes

mod http;
mod ws;

use axum::{
    Router,
    routing::{get, post, put},
};
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use tower_http::cors::{Any, CorsLayer};

use crate::history_repo::HistoryRepo;
use crate::hub::Hub;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) hub: Arc<Hub>,
    pub(crate) history_repo: Arc<HistoryRepo>,
    pub(crate) ws_event_connections: Arc<AtomicUsize>,
}

pub fn app(
    hub: Arc<Hub>,
    history_repo: Arc<HistoryRepo>,
    ws_event_connections: Arc<AtomicUsize>,
) -> Router {
    let state = AppState {
        hub,
        history_repo,
        ws_event_connections,
    };
    Router::new()
        .route("/", get(|| async { "rpiwatch: monitoring Raspberry Pi hosts" })) // GET /
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/devices", get(http::list_devices)) // GET /api/devices
        .route("/api/devices/{id}", get(http::get_device)) // GET /api/devices/{id}
        .route("/api/devices/{id}/events", get(http::device_events)) // GET /api/devices/{id}/events?limit=
        .route(
            "/api/devices/{id}/actions/{action}",
            post(http::run_action),
        ) // POST /api/devices/{id}/actions/{action}
        .route("/api/devices/{id}/settings", put(http::update_settings)) // PUT /api/devices/{id}/settings
        .route("/ws/events", get(ws::ws_events)) // WS /ws/events
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
