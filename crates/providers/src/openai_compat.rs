//! OpenAI-compatible adapter.
//!
//! Works with Groq, OpenRouter, OpenAI, and Ollama's OpenAI-compatible
//! endpoint, or anything else that follows the chat completions contract.

use crate::registry::ProviderDescriptor;
use crate::traits::ChatAdapter;
use crate::util::from_reqwest;
use serde_json::Value;
use shakes_domain::chat::{CompletionRequest, CompletionResult, Role};
use shakes_domain::config::ProviderName;
use shakes_domain::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// An adapter for any OpenAI-compatible chat completions endpoint.
///
/// OpenRouter wants attribution headers (`HTTP-Referer`, `X-Title`) on
/// every request; everything else is uniform.
pub struct OpenAiCompatAdapter {
    client: reqwest::Client,
}

impl OpenAiCompatAdapter {
    pub fn new(timeout_ms: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .build()
            .map_err(from_reqwest)?;
        Ok(Self { client })
    }

    fn build_body(req: &CompletionRequest, model: &str) -> Value {
        let messages: Vec<Value> = req
            .messages
            .iter()
            .map(|m| {
                serde_json::json!({
                    "role": role_to_str(m.role),
                    "content": m.content,
                })
            })
            .collect();

        let mut body = serde_json::json!({
            "model": model,
            "messages": messages,
            "temperature": req.temperature.unwrap_or(0.7),
            "max_tokens": req.max_tokens.unwrap_or(2000),
        });

        if req.json_mode {
            body["response_format"] = serde_json::json!({"type": "json_object"});
        }
        body
    }
}

fn role_to_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response parsing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn parse_response(provider: &ProviderDescriptor, body: &Value, model: &str) -> Result<CompletionResult> {
    let content = body
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|a| a.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::Provider {
            provider: provider.name.to_string(),
            message: "no message content in response".into(),
        })?;

    Ok(CompletionResult {
        content: content.trim().to_string(),
        provider: provider.name.to_string(),
        model: model.to_string(),
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl ChatAdapter for OpenAiCompatAdapter {
    async fn send(
        &self,
        provider: &ProviderDescriptor,
        req: &CompletionRequest,
    ) -> Result<CompletionResult> {
        let model = provider.models.for_class(req.task_class).to_string();
        let url = format!(
            "{}/chat/completions",
            provider.base_url.trim_end_matches('/')
        );
        let body = Self::build_body(req, &model);

        tracing::debug!(provider = %provider.name, model = %model, "chat completion request");

        let mut request = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", provider.api_key))
            .header("Content-Type", "application/json");

        if provider.name == ProviderName::Openrouter {
            let referer = std::env::var("SHAKES_APP_URL")
                .unwrap_or_else(|_| "http://localhost:3000".into());
            request = request
                .header("HTTP-Referer", referer)
                .header("X-Title", "Shakes Digital Marketing Suite");
        }

        let resp = request.json(&body).send().await.map_err(from_reqwest)?;

        let status = resp.status();
        let resp_text = resp.text().await.map_err(from_reqwest)?;

        if !status.is_success() {
            return Err(Error::Provider {
                provider: provider.name.to_string(),
                message: format!("HTTP {} - {}", status.as_u16(), resp_text),
            });
        }

        let resp_json: Value = serde_json::from_str(&resp_text)?;
        parse_response(provider, &resp_json, &model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shakes_domain::chat::{ChatMessage, TaskClass};
    use shakes_domain::config::{ProviderKind, TaskModels};

    fn descriptor() -> ProviderDescriptor {
        ProviderDescriptor {
            name: ProviderName::Groq,
            kind: ProviderKind::OpenaiCompat,
            base_url: "https://api.groq.com/openai/v1".into(),
            api_key: "gsk-test".into(),
            priority: 1,
            models: TaskModels {
                fast: "fast-model".into(),
                standard: "standard-model".into(),
                advanced: "advanced-model".into(),
            },
        }
    }

    #[test]
    fn body_carries_model_and_defaults() {
        let req = CompletionRequest {
            messages: vec![ChatMessage::user("hi")],
            task_class: TaskClass::Fast,
            ..Default::default()
        };
        let body = OpenAiCompatAdapter::build_body(&req, "fast-model");
        assert_eq!(body["model"], "fast-model");
        assert_eq!(body["temperature"], 0.7);
        assert_eq!(body["max_tokens"], 2000);
        assert!(body.get("response_format").is_none());
    }

    #[test]
    fn json_mode_sets_response_format() {
        let req = CompletionRequest {
            messages: vec![ChatMessage::user("hi")],
            json_mode: true,
            ..Default::default()
        };
        let body = OpenAiCompatAdapter::build_body(&req, "standard-model");
        assert_eq!(body["response_format"]["type"], "json_object");
    }

    #[test]
    fn parse_extracts_first_choice_content() {
        let body = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "  hello  "}}],
        });
        let result = parse_response(&descriptor(), &body, "standard-model").unwrap();
        assert_eq!(result.content, "hello");
        assert_eq!(result.provider, "groq");
        assert_eq!(result.model, "standard-model");
    }

    #[test]
    fn parse_missing_choices_is_provider_error() {
        let body = serde_json::json!({"error": "overloaded"});
        let err = parse_response(&descriptor(), &body, "m").unwrap_err();
        assert!(matches!(err, Error::Provider { .. }));
    }
}
