//! Multi-provider completion client with fallback.
//!
//! One logical completion walks a fallback chain: the task-class-preferred
//! provider first, then the remaining enabled providers in priority order.
//! The rate limiter gates every attempt, and every admitted attempt
//! records usage whether or not the call succeeds, since the provider
//! accepted and processed the request before failing.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::json::extract_json;
use crate::limiter::RateLimiter;
use crate::registry::{ProviderDescriptor, ProviderRegistry};
use shakes_domain::chat::{CompletionRequest, CompletionResult, TaskClass};
use shakes_domain::config::ProviderName;
use shakes_domain::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CompletionClient
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct CompletionClient {
    registry: Arc<ProviderRegistry>,
    limiter: Arc<RateLimiter>,
    /// Consecutive transport failures per provider, cleared on success.
    /// The quota monitor reads this to raise provider-failure alerts.
    failures: Mutex<HashMap<ProviderName, u32>>,
}

impl CompletionClient {
    pub fn new(registry: Arc<ProviderRegistry>, limiter: Arc<RateLimiter>) -> Self {
        Self {
            registry,
            limiter,
            failures: Mutex::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    // ── Public completion API ──────────────────────────────────────

    /// Run one completion through the fallback chain.
    ///
    /// 1. Try the task-class-preferred provider if the limiter admits it.
    /// 2. Walk the remaining enabled providers in priority order, skipping
    ///    the one already tried and any not currently admitted.
    /// 3. If every provider was denied or failed, surface the last error.
    ///
    /// With no credentials configured at all this fails fast with a
    /// configuration error and touches neither limiter nor providers.
    pub async fn complete(&self, req: &CompletionRequest) -> Result<CompletionResult> {
        let providers = self.registry.enabled_providers();
        if providers.is_empty() {
            return Err(Error::Config(self.registry.setup_message()));
        }

        let mut last_error: Option<Error> = None;
        let preferred = self.registry.for_task_class(req.task_class);

        if let Some(ref provider) = preferred {
            match self.limiter.check_admit(provider.name) {
                Ok(()) => {
                    tracing::info!(
                        provider = %provider.name,
                        model = %provider.models.for_class(req.task_class),
                        "using preferred provider"
                    );
                    match self.attempt(provider, req).await {
                        Ok(result) => return Ok(result),
                        Err(e) => last_error = Some(e),
                    }
                }
                Err(denied) => {
                    tracing::warn!(
                        provider = %provider.name,
                        reason = %denied.reason,
                        "preferred provider rate limited, falling back"
                    );
                }
            }
        }

        for provider in &providers {
            if preferred.as_ref().map(|p| p.name) == Some(provider.name) {
                continue;
            }
            match self.limiter.check_admit(provider.name) {
                Ok(()) => {}
                Err(denied) => {
                    tracing::warn!(
                        provider = %provider.name,
                        reason = %denied.reason,
                        "provider rate limited, skipping"
                    );
                    continue;
                }
            }

            tracing::info!(
                provider = %provider.name,
                model = %provider.models.for_class(req.task_class),
                "falling back"
            );
            match self.attempt(provider, req).await {
                Ok(result) => return Ok(result),
                Err(e) => last_error = Some(e),
            }
        }

        Err(Error::NoProvider {
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "all providers rate limited".into()),
        })
    }

    /// Convenience: one prompt in, text out.
    pub async fn complete_text(
        &self,
        prompt: &str,
        system_prompt: Option<String>,
        task_class: TaskClass,
    ) -> Result<String> {
        let req = CompletionRequest::from_prompt(prompt, system_prompt, task_class);
        Ok(self.complete(&req).await?.content)
    }

    /// Convenience: one prompt in, parsed JSON out.
    ///
    /// Requests structured output and runs the extraction ladder over the
    /// response, since not every provider honors JSON mode.
    pub async fn complete_json(
        &self,
        prompt: &str,
        system_prompt: Option<String>,
        task_class: TaskClass,
    ) -> Result<serde_json::Value> {
        let mut req = CompletionRequest::from_prompt(prompt, system_prompt, task_class);
        req.json_mode = true;
        let result = self.complete(&req).await?;
        extract_json(&result.content)
    }

    /// Consecutive failure counts per provider, for the quota monitor.
    pub fn consecutive_failures(&self) -> HashMap<ProviderName, u32> {
        self.failures.lock().clone()
    }

    // ── Internal helpers ───────────────────────────────────────────

    /// One admitted attempt: record usage first, then call the adapter.
    async fn attempt(
        &self,
        provider: &ProviderDescriptor,
        req: &CompletionRequest,
    ) -> Result<CompletionResult> {
        self.limiter.record_usage(provider.name);

        let adapter = self
            .registry
            .adapter_for(provider.name)
            .ok_or_else(|| Error::Provider {
                provider: provider.name.to_string(),
                message: "no adapter registered".into(),
            })?;

        match adapter.send(provider, req).await {
            Ok(result) => {
                self.failures.lock().remove(&provider.name);
                Ok(result)
            }
            Err(e) => {
                let mut failures = self.failures.lock();
                *failures.entry(provider.name).or_insert(0) += 1;
                tracing::error!(provider = %provider.name, error = %e, "provider call failed");
                Err(e)
            }
        }
    }
}
