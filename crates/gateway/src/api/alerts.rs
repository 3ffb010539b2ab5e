//! Alert introspection endpoints.
//!
//! - `GET  /v1/alerts` — recent alerts, newest first
//! - `GET  /v1/alerts/summary` — health rollup for the dashboard header
//! - `GET  /v1/notifications` — active in-app toasts
//! - `POST /v1/notifications/:id/dismiss`

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::api::ok_response;
use crate::state::AppState;
use shakes_domain::alert::AlertLevel;

#[derive(Debug, Deserialize)]
pub struct AlertsQuery {
    #[serde(default)]
    pub level: Option<AlertLevel>,
    #[serde(default)]
    pub limit: Option<usize>,
}

pub async fn list_alerts(
    State(state): State<AppState>,
    Query(query): Query<AlertsQuery>,
) -> impl IntoResponse {
    let alerts = state
        .monitor
        .alerts(query.level, query.limit.unwrap_or(50));
    ok_response(json!({ "alerts": alerts }))
}

pub async fn summary(State(state): State<AppState>) -> impl IntoResponse {
    ok_response(json!(state.monitor.status_summary()))
}

pub async fn notifications(State(state): State<AppState>) -> impl IntoResponse {
    ok_response(json!({ "notifications": state.notifications.active() }))
}

pub async fn dismiss(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    ok_response(json!({ "dismissed": state.notifications.dismiss(id) }))
}
