use crate::metrics::Metrics;
use crate::state::{DeviceState, PollError, State as AgentState};
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header::CONTENT_TYPE, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{routing::get, Json, Router};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};
use tokio::sync::RwLock;

#[derive(Clone)]
pub struct HttpAppState {
    pub metrics: Arc<Metrics>,
    pub state: Arc<RwLock<AgentState>>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct DeviceStatus {
    pub id: String,
    pub name: String,
    pub url: String,
    pub ok: bool,
    pub last_poll: Option<String>,
    pub last_success: Option<String>,
    pub consecutive_failures: u32,
    pub error: Option<PollError>,
}

impl From<&DeviceState> for DeviceStatus {
    fn from(value: &DeviceState) -> Self {
        Self {
            id: value.device.id.clone(),
            name: value.device.display_name().to_string(),
            url: value.device.url.clone(),
            ok: value.is_ok(),
            last_poll: format_unix(value.last_poll_unix),
            last_success: format_unix(value.last_success_unix),
            consecutive_failures: value.consecutive_failures,
            error: value.last_error.clone(),
        }
    }
}

pub fn build_router(metrics: Arc<Metrics>, state: Arc<RwLock<AgentState>>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_handler))
        .route("/api/devices", get(devices_handler))
        .route("/api/devices/:id/snapshot", get(snapshot_handler))
        .with_state(HttpAppState { metrics, state })
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn metrics_handler(State(state): State<HttpAppState>) -> Response {
    state.metrics.inc_scrape_count();
    match state.metrics.encode_metrics() {
        Ok(encoded) => {
            let mut response = Response::new(Body::from(encoded));
            response.headers_mut().insert(
                CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            );
            response
        }
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("ошибка кодирования метрик: {err}"),
        )
            .into_response(),
    }
}

async fn devices_handler(State(state): State<HttpAppState>) -> impl IntoResponse {
    let guard = state.state.read().await;
    let devices: Vec<DeviceStatus> = guard.devices.iter().map(DeviceStatus::from).collect();
    Json(devices)
}

async fn snapshot_handler(
    State(state): State<HttpAppState>,
    Path(id): Path<String>,
) -> Response {
    let guard = state.state.read().await;
    let Some(entry) = guard.device(&id) else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "status": 404, "message": format!("неизвестное устройство '{id}'") })),
        )
            .into_response();
    };

    match (&entry.snapshot, &entry.last_error) {
        (Some(snapshot), _) => Json(snapshot).into_response(),
        (None, Some(err)) => (StatusCode::SERVICE_UNAVAILABLE, Json(err)).into_response(),
        (None, None) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": 0, "message": "устройство ещё не опрошено" })),
        )
            .into_response(),
    }
}

fn format_unix(ts: i64) -> Option<String> {
    if ts <= 0 {
        return None;
    }
    let st = UNIX_EPOCH + Duration::from_secs(ts as u64);
    Some(humantime::format_rfc3339_seconds(st).to_string())
}
