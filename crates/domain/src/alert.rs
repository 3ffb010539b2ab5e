//! Quota alert and degradation strategy types.
//!
//! Alerts are created by the quota monitor, appended to a bounded history
//! and fanned out to registered sinks (webhooks, in-app notifications).
//! They are never mutated after creation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Alerts
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    ApproachingMinuteLimit,
    ApproachingDailyLimit,
    MinuteLimitExceeded,
    DailyLimitExceeded,
    AllProvidersLimited,
    QueueGrowing,
    ProviderFailure,
}

/// A single quota alert. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaAlert {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub level: AlertLevel,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_usage: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
}

impl QuotaAlert {
    /// Build an alert with a fresh id and the current timestamp. Optional
    /// fields start empty and are filled in by the monitor.
    pub fn new(level: AlertLevel, alert_type: AlertType, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            level,
            alert_type,
            provider: None,
            message: message.into(),
            current_usage: None,
            limit: None,
            percentage: None,
            recommendation: None,
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_usage(mut self, used: u64, limit: u64, percentage: f64) -> Self {
        self.current_usage = Some(used);
        self.limit = Some(limit);
        self.percentage = Some(percentage);
        self
    }

    pub fn with_recommendation(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendation = Some(recommendation.into());
        self
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Degradation strategies
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// What condition fires a degradation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "threshold")]
pub enum Trigger {
    /// Daily usage percentage of any provider reaches the threshold.
    UsagePercentage(f64),
    /// Queue depth reaches the threshold.
    QueueSize(usize),
    /// Consecutive failures for a provider reach the threshold.
    ProviderFailure(u32),
}

impl Trigger {
    /// The trigger kind as a stable string, used to match first-per-type.
    pub fn kind(&self) -> &'static str {
        match self {
            Trigger::UsagePercentage(_) => "usage_percentage",
            Trigger::QueueSize(_) => "queue_size",
            Trigger::ProviderFailure(_) => "provider_failure",
        }
    }
}

/// What a fired strategy does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Action {
    /// Lower the request queue's concurrency ceiling.
    ReduceConcurrency { target: usize },
    /// Prefer an alternate provider. Logged only; the rate limiter's
    /// admission check already steers subsequent calls away.
    SwitchProvider,
    /// Slow down request intake. Logged only.
    ThrottleRequests { delay_ms: u64 },
    /// Serve cached responses. Logged only.
    CacheResponses,
}

/// A configured rule that automatically reduces load when usage crosses
/// a threshold. Stateless between evaluations except `enabled`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DegradationStrategy {
    pub name: String,
    pub enabled: bool,
    pub trigger: Trigger,
    pub action: Action,
}

impl DegradationStrategy {
    /// The default strategy set shipped with the monitor.
    pub fn defaults() -> Vec<DegradationStrategy> {
        vec![
            DegradationStrategy {
                name: "Reduce concurrency on high usage".into(),
                enabled: true,
                trigger: Trigger::UsagePercentage(85.0),
                action: Action::ReduceConcurrency { target: 3 },
            },
            DegradationStrategy {
                name: "Switch provider on daily limit".into(),
                enabled: true,
                trigger: Trigger::UsagePercentage(95.0),
                action: Action::SwitchProvider,
            },
            DegradationStrategy {
                name: "Throttle on queue growth".into(),
                enabled: true,
                trigger: Trigger::QueueSize(75),
                action: Action::ThrottleRequests { delay_ms: 1000 },
            },
        ]
    }
}
