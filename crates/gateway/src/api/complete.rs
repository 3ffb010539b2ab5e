//! Synchronous completion endpoints.
//!
//! - `POST /v1/complete` — text completion through the fallback chain
//! - `POST /v1/complete/json` — completion with the JSON extraction ladder

use axum::extract::State;
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::json;

use crate::api::{error_response, ok_response};
use crate::state::AppState;
use shakes_domain::chat::{CompletionRequest, TaskClass};

#[derive(Debug, Deserialize)]
pub struct CompleteBody {
    pub prompt: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub task_class: TaskClass,
}

pub async fn complete_text(
    State(state): State<AppState>,
    axum::Json(body): axum::Json<CompleteBody>,
) -> impl IntoResponse {
    let req = CompletionRequest::from_prompt(&body.prompt, body.system_prompt, body.task_class);
    match state.client.complete(&req).await {
        Ok(result) => ok_response(json!({
            "content": result.content,
            "provider": result.provider,
            "model": result.model,
        })),
        Err(e) => error_response(&e),
    }
}

pub async fn complete_json(
    State(state): State<AppState>,
    axum::Json(body): axum::Json<CompleteBody>,
) -> impl IntoResponse {
    match state
        .client
        .complete_json(&body.prompt, body.system_prompt, body.task_class)
        .await
    {
        Ok(value) => ok_response(value),
        Err(e) => error_response(&e),
    }
}
