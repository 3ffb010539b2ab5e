//! Shared fixtures for the gateway integration tests: stub adapters in
//! place of the HTTP layer, and a fully wired queue/limiter/client stack.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use shakes_domain::chat::{CompletionRequest, CompletionResult, Role};
use shakes_domain::config::{default_catalog, ProviderName, RateLimit, RateLimitsConfig, QueueConfig};
use shakes_domain::error::Error;
use shakes_gateway::runtime::queue::RequestQueue;
use shakes_providers::{ChatAdapter, CompletionClient, ProviderRegistry, RateLimiter, SystemClock};
use shakes_providers::registry::ProviderDescriptor;

/// Scripted adapter. Fails its first `fail_first` calls, then succeeds,
/// and records the user prompt of every call in arrival order.
pub struct StubAdapter {
    fail_with: String,
    fail_first: usize,
    calls: AtomicUsize,
    served: Mutex<Vec<String>>,
}

impl StubAdapter {
    pub fn ok() -> Arc<Self> {
        Self::flaky("", 0)
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Self::flaky(message, usize::MAX)
    }

    pub fn flaky(message: &str, fail_first: usize) -> Arc<Self> {
        Arc::new(Self {
            fail_with: message.to_string(),
            fail_first,
            calls: AtomicUsize::new(0),
            served: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// User prompts in the order the adapter saw them.
    pub fn served(&self) -> Vec<String> {
        self.served.lock().clone()
    }
}

#[async_trait::async_trait]
impl ChatAdapter for StubAdapter {
    async fn send(
        &self,
        provider: &ProviderDescriptor,
        req: &CompletionRequest,
    ) -> shakes_domain::error::Result<CompletionResult> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let prompt = req
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_default();
        self.served.lock().push(prompt);

        if call < self.fail_first {
            return Err(Error::Provider {
                provider: provider.name.to_string(),
                message: self.fail_with.clone(),
            });
        }
        Ok(CompletionResult {
            content: "stub response".into(),
            provider: provider.name.to_string(),
            model: provider.models.for_class(req.task_class).to_string(),
        })
    }
}

/// A wired stack over stub adapters.
pub struct Stack {
    pub registry: Arc<ProviderRegistry>,
    pub limiter: Arc<RateLimiter>,
    pub client: Arc<CompletionClient>,
    pub queue: Arc<RequestQueue>,
}

/// Build registry + limiter + client + queue over the given providers.
pub fn stack(
    providers: &[(ProviderName, Arc<StubAdapter>, RateLimit)],
    queue_config: QueueConfig,
) -> Stack {
    let mut credentials = HashMap::new();
    let mut adapters: HashMap<ProviderName, Arc<dyn ChatAdapter>> = HashMap::new();
    let mut limits = RateLimitsConfig::default();

    for (name, adapter, limit) in providers {
        credentials.insert(*name, "test-key".to_string());
        adapters.insert(*name, adapter.clone() as Arc<dyn ChatAdapter>);
        limits.overrides.insert(*name, *limit);
    }

    let registry = Arc::new(ProviderRegistry::with_adapters(
        default_catalog(),
        credentials,
        adapters,
    ));
    let limiter = Arc::new(RateLimiter::new(limits, Arc::new(SystemClock)));
    let client = Arc::new(CompletionClient::new(registry.clone(), limiter.clone()));
    let queue = Arc::new(RequestQueue::new(queue_config, client.clone()));
    Stack {
        registry,
        limiter,
        client,
        queue,
    }
}

/// Generous ceilings that never bind.
pub fn roomy() -> RateLimit {
    RateLimit {
        per_minute: 1_000_000,
        per_day: 1_000_000,
    }
}

/// A queue config with millisecond-scale delays so retry paths run fast.
pub fn fast_queue(max_retries: u32) -> QueueConfig {
    QueueConfig {
        max_concurrent: 1,
        max_retries,
        backoff_base_ms: 1,
        backoff_cap_ms: 10,
        all_limited_wait_ms: 5,
    }
}
