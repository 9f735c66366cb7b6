// HTTP handlers: version, device views, event journal, actions and settings

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::Value;

use super::AppState;
use crate::config::DeviceSettingsPatch;
use crate::device::Action;
use crate::error::ActionError;
use crate::hub::HubError;

const DEFAULT_EVENTS_LIMIT: u32 = 50;
const MAX_EVENTS_LIMIT: u32 = 1000;

/// Error body returned by every handler: `{"error": "..."}`.
pub(super) struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn unknown_device(id: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, format!("unknown device: {id}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

impl From<ActionError> for ApiError {
    fn from(e: ActionError) -> Self {
        let status = match e {
            ActionError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            ActionError::DeviceNotReady | ActionError::StateUnknown(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ActionError::Session(_) => StatusCode::BAD_GATEWAY,
        };
        Self::new(status, e.to_string())
    }
}

impl From<HubError> for ApiError {
    fn from(e: HubError) -> Self {
        match e {
            HubError::UnknownDevice(id) => Self::unknown_device(&id),
            HubError::Action(e) => e.into(),
            HubError::InvalidSettings(e) => Self::new(StatusCode::BAD_REQUEST, e.to_string()),
        }
    }
}

/// GET /version: service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /api/devices
pub(super) async fn list_devices(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.hub.list().await)
}

/// GET /api/devices/{id}: availability, identity and capability values.
pub(super) async fn get_device(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let view = state
        .hub
        .view(&id)
        .await
        .ok_or_else(|| ApiError::unknown_device(&id))?;
    Ok(Json(view))
}

#[derive(Debug, Deserialize)]
pub(super) struct EventsQuery {
    limit: Option<u32>,
}

/// GET /api/devices/{id}/events?limit=: journaled events, oldest first.
pub(super) async fn device_events(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<EventsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    if state.hub.store(&id).await.is_none() {
        return Err(ApiError::unknown_device(&id));
    }
    let limit = query
        .limit
        .unwrap_or(DEFAULT_EVENTS_LIMIT)
        .clamp(1, MAX_EVENTS_LIMIT);
    let events = state
        .history_repo
        .get_recent_events(&id, limit)
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, operation = "get_recent_events", "event query failed");
            ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })?;
    Ok(Json(events))
}

/// POST /api/devices/{id}/actions/{action}: body holds the action arguments (may be empty).
pub(super) async fn run_action(
    State(state): State<AppState>,
    Path((id, name)): Path<(String, String)>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let args: Value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, format!("invalid body: {e}")))?
    };
    let action = Action::parse(&name, args)?;
    let output = state.hub.action(&id, action).await?;
    Ok(Json(output))
}

/// PUT /api/devices/{id}/settings: partial update; the device restarts with the result.
pub(super) async fn update_settings(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<DeviceSettingsPatch>,
) -> Result<impl IntoResponse, ApiError> {
    let config = state.hub.apply_settings(&id, &patch).await?;
    tracing::info!(device = %id, "device settings updated");
    Ok((StatusCode::ACCEPTED, Json(config.public_view())))
}
