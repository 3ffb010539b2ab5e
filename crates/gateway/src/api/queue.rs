//! Queue endpoints.
//!
//! - `POST /v1/queue` — enqueue a completion and wait for its outcome
//! - `GET  /v1/queue/status` — depth, in-flight and priority breakdown
//! - `POST /v1/queue/clear` — emergency reset

use axum::extract::State;
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::json;

use crate::api::{error_response, ok_response};
use crate::state::AppState;
use shakes_domain::chat::{CompletionRequest, Priority, TaskClass};

#[derive(Debug, Deserialize)]
pub struct EnqueueBody {
    pub prompt: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub task_class: TaskClass,
    #[serde(default)]
    pub priority: Priority,
}

pub async fn enqueue(
    State(state): State<AppState>,
    axum::Json(body): axum::Json<EnqueueBody>,
) -> impl IntoResponse {
    let req = CompletionRequest::from_prompt(&body.prompt, body.system_prompt, body.task_class);
    match state.queue.submit(req, body.priority).await {
        Ok(result) => ok_response(json!({
            "content": result.content,
            "provider": result.provider,
            "model": result.model,
        })),
        Err(e) => error_response(&e),
    }
}

pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    ok_response(json!(state.queue.status()))
}

pub async fn clear(State(state): State<AppState>) -> impl IntoResponse {
    let rejected = state.queue.clear();
    ok_response(json!({ "rejected": rejected }))
}
