use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Messages
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A single message in a chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Task class & priority
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Coarse quality/speed tier used to pick which model a provider runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskClass {
    /// Quick generations: captions, summaries.
    Fast,
    /// Everyday content: emails, social posts.
    #[default]
    Standard,
    /// Long-form work: blog posts, research.
    Advanced,
}

/// Queue priority class. Ordering within a class is FIFO; across classes
/// high strictly precedes normal strictly precedes low.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Normal,
    Low,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request / Result
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A provider-agnostic chat completion request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// The conversation messages to send.
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature. `None` lets the provider choose.
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Maximum tokens in the response. `None` lets the provider choose.
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Which model tier the provider should use.
    #[serde(default)]
    pub task_class: TaskClass,
    /// When `true`, ask the provider for strict-JSON output. Best-effort on
    /// providers without a structured-output mode.
    #[serde(default)]
    pub json_mode: bool,
}

impl CompletionRequest {
    /// Build a request from a user prompt and optional system prompt.
    pub fn from_prompt(
        prompt: impl Into<String>,
        system_prompt: Option<String>,
        task_class: TaskClass,
    ) -> Self {
        let mut messages = Vec::new();
        if let Some(system) = system_prompt {
            messages.push(ChatMessage::system(system));
        }
        messages.push(ChatMessage::user(prompt));
        Self {
            messages,
            temperature: Some(0.7),
            max_tokens: None,
            task_class,
            json_mode: false,
        }
    }
}

/// Normalized output of one successful completion call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResult {
    /// Textual content of the response.
    pub content: String,
    /// The provider that produced the response.
    pub provider: String,
    /// The model identifier used.
    pub model: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_prompt_includes_system_first() {
        let req = CompletionRequest::from_prompt(
            "write a caption",
            Some("you are terse".into()),
            TaskClass::Fast,
        );
        assert_eq!(req.messages.len(), 2);
        assert_eq!(req.messages[0].role, Role::System);
        assert_eq!(req.messages[1].role, Role::User);
        assert_eq!(req.task_class, TaskClass::Fast);
    }

    #[test]
    fn from_prompt_without_system() {
        let req = CompletionRequest::from_prompt("hello", None, TaskClass::Standard);
        assert_eq!(req.messages.len(), 1);
        assert_eq!(req.messages[0].role, Role::User);
    }

    #[test]
    fn task_class_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&TaskClass::Advanced).unwrap(), r#""advanced""#);
        assert_eq!(serde_json::to_string(&Priority::High).unwrap(), r#""high""#);
    }
}
