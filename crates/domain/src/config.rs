use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::alert::{AlertLevel, DegradationStrategy};
use crate::chat::TaskClass;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub rate_limits: RateLimitsConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub webhooks: Vec<WebhookEndpoint>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Server
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_3210")]
    pub port: u16,
    #[serde(default = "d_host")]
    pub host: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3210,
            host: "0.0.0.0".into(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LLM provider catalog
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The known provider identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderName {
    Groq,
    Openrouter,
    Huggingface,
    Openai,
    Local,
}

impl ProviderName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderName::Groq => "groq",
            ProviderName::Openrouter => "openrouter",
            ProviderName::Huggingface => "huggingface",
            ProviderName::Openai => "openai",
            ProviderName::Local => "local",
        }
    }

    /// All known providers, in catalog order.
    pub fn all() -> [ProviderName; 5] {
        [
            ProviderName::Groq,
            ProviderName::Openrouter,
            ProviderName::Huggingface,
            ProviderName::Openai,
            ProviderName::Local,
        ]
    }
}

impl std::fmt::Display for ProviderName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which wire protocol an adapter speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// OpenAI chat-completions contract (Groq, OpenRouter, OpenAI, Ollama).
    OpenaiCompat,
    /// Hugging Face inference API.
    Huggingface,
}

/// Per-task-class model selection. All three classes are always populated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskModels {
    pub fast: String,
    pub standard: String,
    pub advanced: String,
}

impl TaskModels {
    pub fn for_class(&self, class: TaskClass) -> &str {
        match class {
            TaskClass::Fast => &self.fast,
            TaskClass::Standard => &self.standard,
            TaskClass::Advanced => &self.advanced,
        }
    }
}

/// One catalog entry. Immutable once loaded; whether the provider is
/// usable is derived at call time from the credential env var.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: ProviderName,
    pub kind: ProviderKind,
    pub base_url: String,
    /// Env var holding the API key. For `local` this is the Ollama base
    /// URL, which doubles as the enablement signal.
    pub credential_env: String,
    /// Lower = preferred.
    pub priority: u8,
    pub models: TaskModels,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Registered providers. Defaults to the built-in catalog.
    #[serde(default = "default_catalog")]
    pub providers: Vec<ProviderConfig>,
    /// Per-attempt HTTP timeout.
    #[serde(default = "d_120000")]
    pub request_timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            providers: default_catalog(),
            request_timeout_ms: 120_000,
        }
    }
}

/// The built-in provider catalog: free cloud tiers first, paid and local
/// fallbacks behind them.
pub fn default_catalog() -> Vec<ProviderConfig> {
    vec![
        ProviderConfig {
            name: ProviderName::Groq,
            kind: ProviderKind::OpenaiCompat,
            base_url: "https://api.groq.com/openai/v1".into(),
            credential_env: "GROQ_API_KEY".into(),
            priority: 1,
            models: TaskModels {
                fast: "llama-3.1-8b-instant".into(),
                standard: "llama-3.1-70b-versatile".into(),
                advanced: "llama-3.1-70b-versatile".into(),
            },
        },
        ProviderConfig {
            name: ProviderName::Openrouter,
            kind: ProviderKind::OpenaiCompat,
            base_url: "https://openrouter.ai/api/v1".into(),
            credential_env: "OPENROUTER_API_KEY".into(),
            priority: 2,
            models: TaskModels {
                fast: "meta-llama/llama-3.1-8b-instruct:free".into(),
                standard: "meta-llama/llama-3.1-70b-instruct:free".into(),
                advanced: "meta-llama/llama-3.1-405b-instruct:free".into(),
            },
        },
        ProviderConfig {
            name: ProviderName::Huggingface,
            kind: ProviderKind::Huggingface,
            base_url: "https://api-inference.huggingface.co/models".into(),
            credential_env: "HUGGINGFACE_API_KEY".into(),
            priority: 3,
            models: TaskModels {
                fast: "meta-llama/Llama-3.2-3B-Instruct".into(),
                standard: "meta-llama/Llama-3.1-8B-Instruct".into(),
                advanced: "meta-llama/Llama-3.1-70B-Instruct".into(),
            },
        },
        ProviderConfig {
            name: ProviderName::Openai,
            kind: ProviderKind::OpenaiCompat,
            base_url: "https://api.openai.com/v1".into(),
            credential_env: "OPENAI_API_KEY".into(),
            priority: 4,
            models: TaskModels {
                fast: "gpt-3.5-turbo".into(),
                standard: "gpt-4-turbo-preview".into(),
                advanced: "gpt-4-turbo-preview".into(),
            },
        },
        ProviderConfig {
            name: ProviderName::Local,
            kind: ProviderKind::OpenaiCompat,
            base_url: "http://localhost:11434/v1".into(),
            credential_env: "OLLAMA_BASE_URL".into(),
            priority: 10,
            models: TaskModels {
                fast: "llama3.1:8b".into(),
                standard: "llama3.1:8b".into(),
                advanced: "llama3.1:70b".into(),
            },
        },
    ]
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Rate limits
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Request ceilings for one provider, per sliding window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimit {
    pub per_minute: u64,
    pub per_day: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitsConfig {
    /// Overrides per provider; unlisted providers use the built-in ceilings.
    #[serde(default)]
    pub overrides: HashMap<ProviderName, RateLimit>,
}

impl Default for RateLimitsConfig {
    fn default() -> Self {
        Self {
            overrides: HashMap::new(),
        }
    }
}

impl RateLimitsConfig {
    /// Effective ceilings for a provider.
    pub fn limit_for(&self, provider: ProviderName) -> RateLimit {
        if let Some(limit) = self.overrides.get(&provider) {
            return *limit;
        }
        match provider {
            ProviderName::Groq => RateLimit {
                per_minute: 30,
                per_day: 14_400,
            },
            ProviderName::Openrouter => RateLimit {
                per_minute: 20,
                per_day: 10_000,
            },
            ProviderName::Huggingface => RateLimit {
                per_minute: 60,
                per_day: 24_000,
            },
            ProviderName::Openai => RateLimit {
                per_minute: 60,
                per_day: 200_000,
            },
            ProviderName::Local => RateLimit {
                per_minute: 1_000,
                per_day: 100_000,
            },
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request queue
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Worker budget: how many requests may be in flight at once.
    #[serde(default = "d_5")]
    pub max_concurrent: usize,
    /// Retry ceiling per request; a request makes `max_retries + 1` attempts.
    #[serde(default = "d_3")]
    pub max_retries: u32,
    /// Base backoff delay, doubled per attempt.
    #[serde(default = "d_1000")]
    pub backoff_base_ms: u64,
    /// Backoff cap.
    #[serde(default = "d_30000")]
    pub backoff_cap_ms: u64,
    /// Fixed wait when every provider is rate limited, expected to
    /// self-resolve as windows roll over.
    #[serde(default = "d_10000")]
    pub all_limited_wait_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 5,
            max_retries: 3,
            backoff_base_ms: 1_000,
            backoff_cap_ms: 30_000,
            all_limited_wait_ms: 10_000,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Quota monitor
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Alerting thresholds, as percentages of the provider ceiling for usage
/// and as absolute depth for the queue.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QuotaThresholds {
    #[serde(default = "d_70f")]
    pub minute_warning: f64,
    #[serde(default = "d_90f")]
    pub minute_critical: f64,
    #[serde(default = "d_80f")]
    pub daily_warning: f64,
    #[serde(default = "d_95f")]
    pub daily_critical: f64,
    #[serde(default = "d_50")]
    pub queue_warning: usize,
    #[serde(default = "d_100")]
    pub queue_critical: usize,
}

impl Default for QuotaThresholds {
    fn default() -> Self {
        Self {
            minute_warning: 70.0,
            minute_critical: 90.0,
            daily_warning: 80.0,
            daily_critical: 95.0,
            queue_warning: 50,
            queue_critical: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Sweep interval.
    #[serde(default = "d_30")]
    pub interval_secs: u64,
    /// How many alerts the in-memory history retains.
    #[serde(default = "d_100")]
    pub alert_history: usize,
    /// Consecutive transport failures before a provider-failure alert.
    #[serde(default = "d_3u32")]
    pub failure_threshold: u32,
    #[serde(default)]
    pub thresholds: QuotaThresholds,
    /// Degradation strategies, evaluated in order each sweep.
    #[serde(default = "DegradationStrategy::defaults")]
    pub strategies: Vec<DegradationStrategy>,
    /// Environment tag carried in webhook payloads.
    #[serde(default = "d_env")]
    pub environment: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            alert_history: 100,
            failure_threshold: 3,
            thresholds: QuotaThresholds::default(),
            strategies: DegradationStrategy::defaults(),
            environment: d_env(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Webhook endpoints
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEndpoint {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(default = "d_true")]
    pub enabled: bool,
    /// Alert levels this endpoint receives.
    #[serde(default = "d_alert_levels")]
    pub levels: Vec<AlertLevel>,
    /// Extra headers sent with each delivery.
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Failures tolerated before the endpoint is auto-disabled.
    #[serde(default = "d_3u32")]
    pub retry_attempts: u32,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Serde default helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn d_3210() -> u16 {
    3210
}
fn d_host() -> String {
    "0.0.0.0".into()
}
fn d_120000() -> u64 {
    120_000
}
fn d_5() -> usize {
    5
}
fn d_3() -> u32 {
    3
}
fn d_3u32() -> u32 {
    3
}
fn d_1000() -> u64 {
    1_000
}
fn d_30000() -> u64 {
    30_000
}
fn d_10000() -> u64 {
    10_000
}
fn d_30() -> u64 {
    30
}
fn d_50() -> usize {
    50
}
fn d_100() -> usize {
    100
}
fn d_70f() -> f64 {
    70.0
}
fn d_80f() -> f64 {
    80.0
}
fn d_90f() -> f64 {
    90.0
}
fn d_95f() -> f64 {
    95.0
}
fn d_true() -> bool {
    true
}
fn d_env() -> String {
    std::env::var("SHAKES_ENV").unwrap_or_else(|_| "development".into())
}
fn d_alert_levels() -> Vec<AlertLevel> {
    vec![AlertLevel::Warning, AlertLevel::Critical]
}
