//! Usage report endpoint. This is what the monitoring dashboard renders.
//!
//! - `GET /v1/usage` — per-provider usage snapshots, aggregate health,
//!   queue status and the enabled provider list.

use axum::extract::State;
use axum::response::IntoResponse;
use chrono::Utc;
use serde_json::json;

use crate::api::ok_response;
use crate::state::AppState;

pub async fn usage_report(State(state): State<AppState>) -> impl IntoResponse {
    let mut providers = serde_json::Map::new();
    for (name, snapshot) in state.limiter.all_snapshots() {
        providers.insert(name.as_str().to_string(), json!(snapshot));
    }

    let enabled = state.registry.enabled_providers();
    let enabled_names: Vec<_> = enabled.iter().map(|p| p.name).collect();
    let most_available = state.limiter.best_candidate(&enabled_names);

    ok_response(json!({
        "providers": providers,
        "health": state.limiter.health(),
        "queue": state.queue.status(),
        "enabled": enabled
            .iter()
            .map(|p| json!({
                "name": p.name,
                "priority": p.priority,
                "model": p.models.standard,
            }))
            .collect::<Vec<_>>(),
        "most_available": most_available,
        "timestamp": Utc::now(),
    }))
}
