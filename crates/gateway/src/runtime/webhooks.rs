//! Webhook dispatch for external alert systems.
//!
//! Each registered endpoint receives matching alerts as a JSON POST.
//! Deliveries are fire-and-forget spawned tasks; an endpoint that keeps
//! failing is disabled once its failure counter reaches the configured
//! ceiling, and the counter resets on the first success.

use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use shakes_domain::alert::{AlertLevel, AlertType, QuotaAlert};
use shakes_domain::config::WebhookEndpoint;
use shakes_domain::error::{Error, Result};

const USER_AGENT: &str = "Shakes-Marketing-Suite/1.0";
const SOURCE_TAG: &str = "shakes-marketing-suite";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct EndpointState {
    config: WebhookEndpoint,
    failures: u32,
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct WebhookStats {
    pub failures: u32,
    pub enabled: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// WebhookDispatcher
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct WebhookDispatcher {
    endpoints: RwLock<Vec<EndpointState>>,
    environment: String,
    client: reqwest::Client,
}

impl WebhookDispatcher {
    pub fn new(endpoints: Vec<WebhookEndpoint>, environment: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            endpoints: RwLock::new(
                endpoints
                    .into_iter()
                    .map(|config| EndpointState {
                        config,
                        failures: 0,
                    })
                    .collect(),
            ),
            environment,
            client,
        }
    }

    /// Fan an alert out to every enabled endpoint whose level filter
    /// matches. Deliveries run in spawned tasks and never block the sweep.
    pub fn dispatch(self: &Arc<Self>, alert: &QuotaAlert) {
        let payload = self.payload(alert);
        let targets: Vec<(String, String)> = self
            .endpoints
            .read()
            .iter()
            .filter(|e| e.config.enabled && e.config.levels.contains(&alert.level))
            .map(|e| (e.config.id.clone(), e.config.name.clone()))
            .collect();

        for (id, name) in targets {
            let dispatcher = self.clone();
            let payload = payload.clone();
            let alert_type = alert.alert_type;
            tokio::spawn(async move {
                match dispatcher.deliver(&id, &payload).await {
                    Ok(()) => {
                        tracing::info!(webhook = %name, alert_type = ?alert_type, "webhook delivered");
                    }
                    Err(e) => {
                        tracing::warn!(webhook = %name, error = %e, "webhook delivery failed");
                    }
                }
            });
        }
    }

    /// Send a synthetic info alert to one endpoint, returning the outcome.
    pub async fn test_endpoint(&self, id: &str) -> Result<()> {
        let alert = QuotaAlert::new(
            AlertLevel::Info,
            AlertType::ApproachingDailyLimit,
            "This is a test alert",
        )
        .with_recommendation("This is a test");
        let payload = self.payload(&alert);
        self.deliver(id, &payload).await
    }

    pub fn stats(&self, id: &str) -> Option<WebhookStats> {
        self.endpoints
            .read()
            .iter()
            .find(|e| e.config.id == id)
            .map(|e| WebhookStats {
                failures: e.failures,
                enabled: e.config.enabled,
            })
    }

    pub fn endpoints(&self) -> Vec<WebhookEndpoint> {
        self.endpoints
            .read()
            .iter()
            .map(|e| e.config.clone())
            .collect()
    }

    // ── Internal helpers ───────────────────────────────────────────

    fn payload(&self, alert: &QuotaAlert) -> Value {
        serde_json::json!({
            "alert": alert,
            "source": SOURCE_TAG,
            "environment": self.environment,
        })
    }

    /// One delivery attempt against one endpoint, with counter upkeep.
    async fn deliver(&self, id: &str, payload: &Value) -> Result<()> {
        let (url, headers) = {
            let endpoints = self.endpoints.read();
            let endpoint = endpoints
                .iter()
                .find(|e| e.config.id == id)
                .ok_or_else(|| Error::Config(format!("webhook '{id}' not found")))?;
            if !endpoint.config.enabled {
                return Err(Error::Config(format!("webhook '{id}' is disabled")));
            }
            (endpoint.config.url.clone(), endpoint.config.headers.clone())
        };

        let mut request = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("User-Agent", USER_AGENT);
        for (key, value) in &headers {
            request = request.header(key, value);
        }

        let outcome = match request.json(payload).send().await {
            Ok(resp) if resp.status().is_success() => Ok(()),
            Ok(resp) => Err(Error::Http(format!("HTTP {}", resp.status().as_u16()))),
            Err(e) => Err(Error::Http(e.to_string())),
        };

        match &outcome {
            Ok(()) => self.record_success(id),
            Err(_) => self.record_failure(id),
        }
        outcome
    }

    fn record_success(&self, id: &str) {
        let mut endpoints = self.endpoints.write();
        if let Some(endpoint) = endpoints.iter_mut().find(|e| e.config.id == id) {
            endpoint.failures = 0;
        }
    }

    /// Bump the failure counter, disabling the endpoint at its ceiling.
    fn record_failure(&self, id: &str) {
        let mut endpoints = self.endpoints.write();
        if let Some(endpoint) = endpoints.iter_mut().find(|e| e.config.id == id) {
            endpoint.failures += 1;
            if endpoint.failures >= endpoint.config.retry_attempts {
                endpoint.config.enabled = false;
                tracing::error!(
                    webhook = %endpoint.config.name,
                    failures = endpoint.failures,
                    "webhook disabled after repeated failures"
                );
            }
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
