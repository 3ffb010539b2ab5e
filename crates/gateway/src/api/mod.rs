pub mod alerts;
pub mod complete;
pub mod queue;
pub mod usage;

use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use shakes_domain::error::Error;

/// Build the full API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        // Completions
        .route("/v1/complete", post(complete::complete_text))
        .route("/v1/complete/json", post(complete::complete_json))
        // Queue
        .route("/v1/queue", post(queue::enqueue))
        .route("/v1/queue/status", get(queue::status))
        .route("/v1/queue/clear", post(queue::clear))
        // Monitoring
        .route("/v1/usage", get(usage::usage_report))
        .route("/v1/alerts", get(alerts::list_alerts))
        .route("/v1/alerts/summary", get(alerts::summary))
        .route("/v1/notifications", get(alerts::notifications))
        .route("/v1/notifications/:id/dismiss", post(alerts::dismiss))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Map a domain error onto a status code and the standard error envelope.
pub(crate) fn error_response(error: &Error) -> (StatusCode, Json<Value>) {
    let status = match error {
        Error::Config(_) => StatusCode::SERVICE_UNAVAILABLE,
        Error::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        Error::NoProvider { .. } | Error::Provider { .. } | Error::Http(_) => {
            StatusCode::BAD_GATEWAY
        }
        Error::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        Error::JsonExtract(_) => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(json!({ "success": false, "error": error.to_string() })),
    )
}

/// The standard success envelope.
pub(crate) fn ok_response(data: Value) -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "success": true, "data": data })))
}
