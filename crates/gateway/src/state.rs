use std::sync::Arc;

use shakes_domain::config::Config;
use shakes_providers::{CompletionClient, ProviderRegistry, RateLimiter, SystemClock};

use crate::runtime::monitor::QuotaMonitor;
use crate::runtime::notify::NotificationCenter;
use crate::runtime::queue::RequestQueue;
use crate::runtime::webhooks::WebhookDispatcher;

/// Shared application state passed to all API handlers.
///
/// Built once at startup and cloned into handlers and workers. There are
/// no global singletons; every service is reachable only through here.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,

    // ── Core routing services ─────────────────────────────────────
    pub registry: Arc<ProviderRegistry>,
    pub limiter: Arc<RateLimiter>,
    pub client: Arc<CompletionClient>,
    pub queue: Arc<RequestQueue>,

    // ── Monitoring & alert sinks ──────────────────────────────────
    pub monitor: Arc<QuotaMonitor>,
    pub webhooks: Arc<WebhookDispatcher>,
    pub notifications: Arc<NotificationCenter>,
}

impl AppState {
    /// Wire up every service from configuration and register the alert
    /// sinks on the monitor. Worker loops are not started here; the
    /// caller spawns [`RequestQueue::run`] and [`QuotaMonitor::run`].
    pub fn from_config(config: Config) -> shakes_domain::Result<Self> {
        let clock = Arc::new(SystemClock);
        let registry = Arc::new(ProviderRegistry::from_config(&config.llm)?);
        let limiter = Arc::new(RateLimiter::new(config.rate_limits.clone(), clock.clone()));
        let client = Arc::new(CompletionClient::new(registry.clone(), limiter.clone()));
        let queue = Arc::new(RequestQueue::new(config.queue.clone(), client.clone()));
        let monitor = Arc::new(QuotaMonitor::new(
            config.monitor.clone(),
            registry.clone(),
            limiter.clone(),
            queue.clone(),
            client.clone(),
        ));
        let webhooks = Arc::new(WebhookDispatcher::new(
            config.webhooks.clone(),
            config.monitor.environment.clone(),
        ));
        let notifications = Arc::new(NotificationCenter::new(clock));

        {
            let webhooks = webhooks.clone();
            monitor.on_alert(move |alert| webhooks.dispatch(alert));
        }
        {
            let notifications = notifications.clone();
            monitor.on_alert(move |alert| notifications.push(alert));
        }

        Ok(Self {
            config: Arc::new(config),
            registry,
            limiter,
            client,
            queue,
            monitor,
            webhooks,
            notifications,
        })
    }
}
