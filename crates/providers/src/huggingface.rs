//! Hugging Face inference API adapter.
//!
//! The inference API takes a flat prompt rather than a message list and
//! answers with either an array of generations or a bare object, so both
//! directions need normalizing. JSON mode is best-effort here: there is
//! no structured-output switch, callers re-extract JSON from the text.

use crate::registry::ProviderDescriptor;
use crate::traits::ChatAdapter;
use crate::util::from_reqwest;
use serde_json::Value;
use shakes_domain::chat::{CompletionRequest, CompletionResult, Role};
use shakes_domain::error::{Error, Result};

pub struct HuggingFaceAdapter {
    client: reqwest::Client,
}

impl HuggingFaceAdapter {
    pub fn new(timeout_ms: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .build()
            .map_err(from_reqwest)?;
        Ok(Self { client })
    }
}

/// Flatten the message list into the prompt shape the inference API expects.
fn flatten_messages(req: &CompletionRequest) -> String {
    req.messages
        .iter()
        .map(|m| match m.role {
            Role::System => format!("System: {}", m.content),
            Role::User => format!("User: {}", m.content),
            Role::Assistant => format!("Assistant: {}", m.content),
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Pull generated text out of the two envelope shapes the API returns.
fn extract_generated_text(data: &Value) -> String {
    if let Some(first) = data.as_array().and_then(|a| a.first()) {
        if let Some(text) = first.get("generated_text").and_then(|v| v.as_str()) {
            return text.to_string();
        }
    }
    if let Some(text) = data.get("generated_text").and_then(|v| v.as_str()) {
        return text.to_string();
    }
    data.to_string()
}

#[async_trait::async_trait]
impl ChatAdapter for HuggingFaceAdapter {
    async fn send(
        &self,
        provider: &ProviderDescriptor,
        req: &CompletionRequest,
    ) -> Result<CompletionResult> {
        let model = provider.models.for_class(req.task_class).to_string();
        let url = format!("{}/{}", provider.base_url.trim_end_matches('/'), model);

        let body = serde_json::json!({
            "inputs": flatten_messages(req),
            "parameters": {
                "max_new_tokens": req.max_tokens.unwrap_or(2000),
                "temperature": req.temperature.unwrap_or(0.7),
                "return_full_text": false,
            },
        });

        tracing::debug!(provider = %provider.name, model = %model, "inference request");

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", provider.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        let resp_text = resp.text().await.map_err(from_reqwest)?;

        if !status.is_success() {
            return Err(Error::Provider {
                provider: provider.name.to_string(),
                message: format!("HTTP {} - {}", status.as_u16(), resp_text),
            });
        }

        let data: Value = serde_json::from_str(&resp_text)?;
        Ok(CompletionResult {
            content: extract_generated_text(&data).trim().to_string(),
            provider: provider.name.to_string(),
            model,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shakes_domain::chat::ChatMessage;

    #[test]
    fn flatten_labels_each_role() {
        let req = CompletionRequest {
            messages: vec![
                ChatMessage::system("be brief"),
                ChatMessage::user("hello"),
                ChatMessage::assistant("hi"),
            ],
            ..Default::default()
        };
        let prompt = flatten_messages(&req);
        assert_eq!(prompt, "System: be brief\n\nUser: hello\n\nAssistant: hi");
    }

    #[test]
    fn extract_from_array_envelope() {
        let data = serde_json::json!([{"generated_text": "a caption"}]);
        assert_eq!(extract_generated_text(&data), "a caption");
    }

    #[test]
    fn extract_from_object_envelope() {
        let data = serde_json::json!({"generated_text": "a caption"});
        assert_eq!(extract_generated_text(&data), "a caption");
    }

    #[test]
    fn unknown_envelope_falls_back_to_raw_json() {
        let data = serde_json::json!({"odd": true});
        assert_eq!(extract_generated_text(&data), r#"{"odd":true}"#);
    }
}
