//! Quota monitoring with alerts and graceful degradation.
//!
//! Each sweep classifies every enabled provider's usage against the
//! warning/critical threshold pairs, inspects queue depth, checks for a
//! global outage (every provider over 100 % on either window) and for
//! repeated provider failures. New alerts land in a bounded history and
//! fan out synchronously to registered sinks. Daily-critical and
//! queue-critical findings additionally run the first matching enabled
//! degradation strategy of their trigger type.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};

use crate::runtime::queue::RequestQueue;
use shakes_domain::alert::{
    Action, AlertLevel, AlertType, DegradationStrategy, QuotaAlert, Trigger,
};
use shakes_domain::config::{MonitorConfig, ProviderName, QuotaThresholds};
use shakes_providers::limiter::UsageSnapshot;
use shakes_providers::{CompletionClient, ProviderRegistry, RateLimiter};

type AlertCallback = Box<dyn Fn(&QuotaAlert) + Send + Sync>;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Counters from the previous sweep, for prediction deltas.
#[derive(Debug, Clone, Copy)]
struct SweepSample {
    minute_used: u64,
    day_used: u64,
}

/// Advisory extrapolation of a provider's usage. Never blocks calls.
#[derive(Debug, Clone, serde::Serialize)]
pub struct UsagePrediction {
    pub provider: ProviderName,
    pub will_exceed_minute: bool,
    pub will_exceed_daily: bool,
    pub projected_minute_pct: f64,
    pub projected_daily_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Degraded,
    Critical,
}

/// Rollup of recent alert activity for the dashboard.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StatusSummary {
    pub status: HealthState,
    pub critical: usize,
    pub warning: usize,
    pub info: usize,
    pub recommendations: Vec<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// QuotaMonitor
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct QuotaMonitor {
    interval: Duration,
    failure_threshold: u32,
    history_cap: usize,
    thresholds: RwLock<QuotaThresholds>,
    strategies: RwLock<Vec<DegradationStrategy>>,
    registry: Arc<ProviderRegistry>,
    limiter: Arc<RateLimiter>,
    queue: Arc<RequestQueue>,
    client: Arc<CompletionClient>,
    alerts: Mutex<std::collections::VecDeque<QuotaAlert>>,
    callbacks: RwLock<Vec<AlertCallback>>,
    last_sweep: Mutex<HashMap<ProviderName, SweepSample>>,
}

impl QuotaMonitor {
    pub fn new(
        config: MonitorConfig,
        registry: Arc<ProviderRegistry>,
        limiter: Arc<RateLimiter>,
        queue: Arc<RequestQueue>,
        client: Arc<CompletionClient>,
    ) -> Self {
        Self {
            interval: Duration::from_secs(config.interval_secs),
            failure_threshold: config.failure_threshold,
            history_cap: config.alert_history,
            thresholds: RwLock::new(config.thresholds),
            strategies: RwLock::new(config.strategies),
            registry,
            limiter,
            queue,
            client,
            alerts: Mutex::new(std::collections::VecDeque::new()),
            callbacks: RwLock::new(Vec::new()),
            last_sweep: Mutex::new(HashMap::new()),
        }
    }

    // ── Lifecycle ──────────────────────────────────────────────────

    /// Periodic sweep loop. Runs for the lifetime of the process; the
    /// first sweep fires immediately.
    pub async fn run(self: Arc<Self>) {
        tracing::info!(interval_secs = self.interval.as_secs(), "quota monitor started");
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            self.sweep();
        }
    }

    /// One evaluation pass. Also callable stand-alone (tests, CLI).
    pub fn sweep(&self) {
        let thresholds = *self.thresholds.read();
        let mut new_alerts: Vec<QuotaAlert> = Vec::new();
        let enabled = self.registry.enabled_providers();

        let mut snapshots: Vec<(ProviderName, UsageSnapshot)> = Vec::new();
        for provider in &enabled {
            let snapshot = self.limiter.usage_snapshot(provider.name);
            self.classify_provider(provider.name, &snapshot, &thresholds, &mut new_alerts);
            snapshots.push((provider.name, snapshot));
        }

        self.check_queue(&thresholds, &mut new_alerts);
        self.check_failures(&mut new_alerts);

        // Global outage: every enabled provider saturated on some window.
        if !snapshots.is_empty()
            && snapshots
                .iter()
                .all(|(_, s)| s.minute.percentage >= 100.0 || s.day.percentage >= 100.0)
        {
            new_alerts.push(
                QuotaAlert::new(
                    AlertLevel::Critical,
                    AlertType::AllProvidersLimited,
                    "All AI providers are rate limited",
                )
                .with_recommendation(
                    "All requests will be queued. System degraded until limits reset.",
                ),
            );
        }

        // Remember counters for the next sweep's prediction deltas.
        {
            let mut last = self.last_sweep.lock();
            for (name, snapshot) in &snapshots {
                last.insert(
                    *name,
                    SweepSample {
                        minute_used: snapshot.minute.used,
                        day_used: snapshot.day.used,
                    },
                );
            }
        }

        if new_alerts.is_empty() {
            return;
        }
        tracing::info!(count = new_alerts.len(), "sweep produced alerts");

        let mut history = self.alerts.lock();
        for alert in &new_alerts {
            if history.len() >= self.history_cap {
                history.pop_front();
            }
            history.push_back(alert.clone());
        }
        drop(history);

        let callbacks = self.callbacks.read();
        for alert in &new_alerts {
            for callback in callbacks.iter() {
                callback(alert);
            }
        }
    }

    // ── Alert access ───────────────────────────────────────────────

    /// Register a sink invoked synchronously for every new alert.
    pub fn on_alert(&self, callback: impl Fn(&QuotaAlert) + Send + Sync + 'static) {
        self.callbacks.write().push(Box::new(callback));
    }

    /// The `limit` most recent alerts, newest first, optionally filtered
    /// by level.
    pub fn alerts(&self, level: Option<AlertLevel>, limit: usize) -> Vec<QuotaAlert> {
        self.alerts
            .lock()
            .iter()
            .rev()
            .filter(|a| level.map(|l| a.level == l).unwrap_or(true))
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn clear_alerts(&self) {
        self.alerts.lock().clear();
    }

    /// Health rollup over the 20 most recent alerts.
    pub fn status_summary(&self) -> StatusSummary {
        let recent = self.alerts(None, 20);
        let critical = recent.iter().filter(|a| a.level == AlertLevel::Critical).count();
        let warning = recent.iter().filter(|a| a.level == AlertLevel::Warning).count();
        let info = recent.iter().filter(|a| a.level == AlertLevel::Info).count();

        let status = if critical > 0 {
            HealthState::Critical
        } else if warning > 0 {
            HealthState::Degraded
        } else {
            HealthState::Healthy
        };

        let mut recommendations: Vec<String> = Vec::new();
        for alert in &recent {
            if let Some(rec) = &alert.recommendation {
                if !recommendations.contains(rec) {
                    recommendations.push(rec.clone());
                }
            }
        }

        StatusSummary {
            status,
            critical,
            warning,
            info,
            recommendations,
        }
    }

    // ── Thresholds & strategies ────────────────────────────────────

    pub fn thresholds(&self) -> QuotaThresholds {
        *self.thresholds.read()
    }

    pub fn set_thresholds(&self, thresholds: QuotaThresholds) {
        *self.thresholds.write() = thresholds;
        tracing::info!(?thresholds, "quota thresholds updated");
    }

    pub fn strategies(&self) -> Vec<DegradationStrategy> {
        self.strategies.read().clone()
    }

    pub fn add_strategy(&self, strategy: DegradationStrategy) {
        tracing::info!(strategy = %strategy.name, "degradation strategy added");
        self.strategies.write().push(strategy);
    }

    /// Enable or disable a strategy by name. Returns whether it existed.
    pub fn toggle_strategy(&self, name: &str, enabled: bool) -> bool {
        let mut strategies = self.strategies.write();
        match strategies.iter_mut().find(|s| s.name == name) {
            Some(strategy) => {
                strategy.enabled = enabled;
                tracing::info!(strategy = %name, enabled, "degradation strategy toggled");
                true
            }
            None => false,
        }
    }

    // ── Prediction ─────────────────────────────────────────────────

    /// Linear extrapolation of each enabled provider's usage over the
    /// given horizon, from the delta between the last two sweeps.
    /// Advisory only; requires at least one completed sweep.
    pub fn predict(&self, horizon_minutes: f64) -> Vec<UsagePrediction> {
        let sweeps_per_minute = 60.0 / self.interval.as_secs().max(1) as f64;
        let last = self.last_sweep.lock().clone();
        let mut predictions = Vec::new();

        for provider in self.registry.enabled_providers() {
            let Some(sample) = last.get(&provider.name) else {
                continue;
            };
            let snapshot = self.limiter.usage_snapshot(provider.name);
            let minute_delta = snapshot.minute.used.saturating_sub(sample.minute_used) as f64;
            let day_delta = snapshot.day.used.saturating_sub(sample.day_used) as f64;
            let sweeps_ahead = horizon_minutes * sweeps_per_minute;

            let projected_minute = snapshot.minute.used as f64 + minute_delta * sweeps_ahead;
            let projected_day = snapshot.day.used as f64 + day_delta * sweeps_ahead;
            let minute_limit = snapshot.minute.limit as f64;
            let day_limit = snapshot.day.limit as f64;

            predictions.push(UsagePrediction {
                provider: provider.name,
                will_exceed_minute: projected_minute >= minute_limit,
                will_exceed_daily: projected_day >= day_limit,
                projected_minute_pct: (projected_minute / minute_limit * 100.0).min(100.0),
                projected_daily_pct: (projected_day / day_limit * 100.0).min(100.0),
            });
        }
        predictions
    }

    // ── Internal helpers ───────────────────────────────────────────

    fn classify_provider(
        &self,
        name: ProviderName,
        snapshot: &UsageSnapshot,
        thresholds: &QuotaThresholds,
        out: &mut Vec<QuotaAlert>,
    ) {
        let minute_pct = snapshot.minute.percentage;
        if minute_pct >= thresholds.minute_critical {
            let alert_type = if minute_pct >= 100.0 {
                AlertType::MinuteLimitExceeded
            } else {
                AlertType::ApproachingMinuteLimit
            };
            out.push(
                QuotaAlert::new(
                    AlertLevel::Critical,
                    alert_type,
                    format!("{name}: critical! {minute_pct:.1}% of minute limit used"),
                )
                .with_provider(name.as_str())
                .with_usage(snapshot.minute.used, snapshot.minute.limit, minute_pct)
                .with_recommendation("Requests will be queued. Consider adding more providers."),
            );
        } else if minute_pct >= thresholds.minute_warning {
            out.push(
                QuotaAlert::new(
                    AlertLevel::Warning,
                    AlertType::ApproachingMinuteLimit,
                    format!("{name}: {minute_pct:.1}% of minute limit used"),
                )
                .with_provider(name.as_str())
                .with_usage(snapshot.minute.used, snapshot.minute.limit, minute_pct)
                .with_recommendation("Monitor usage. Requests may be throttled soon."),
            );
        }

        let day_pct = snapshot.day.percentage;
        if day_pct >= thresholds.daily_critical {
            let alert_type = if day_pct >= 100.0 {
                AlertType::DailyLimitExceeded
            } else {
                AlertType::ApproachingDailyLimit
            };
            out.push(
                QuotaAlert::new(
                    AlertLevel::Critical,
                    alert_type,
                    format!("{name}: critical! {day_pct:.1}% of daily limit used"),
                )
                .with_provider(name.as_str())
                .with_usage(snapshot.day.used, snapshot.day.limit, day_pct)
                .with_recommendation(
                    "Daily limit almost reached. Add more providers or wait for reset.",
                ),
            );
            self.execute_degradation("usage_percentage", day_pct, Some(name));
        } else if day_pct >= thresholds.daily_warning {
            out.push(
                QuotaAlert::new(
                    AlertLevel::Warning,
                    AlertType::ApproachingDailyLimit,
                    format!("{name}: {day_pct:.1}% of daily limit used"),
                )
                .with_provider(name.as_str())
                .with_usage(snapshot.day.used, snapshot.day.limit, day_pct)
                .with_recommendation("Consider spreading requests or adding backup providers."),
            );
        }
    }

    fn check_queue(&self, thresholds: &QuotaThresholds, out: &mut Vec<QuotaAlert>) {
        let status = self.queue.status();
        if status.queue_size >= thresholds.queue_critical {
            out.push(
                QuotaAlert::new(
                    AlertLevel::Critical,
                    AlertType::QueueGrowing,
                    format!(
                        "Request queue is very large: {} requests pending",
                        status.queue_size
                    ),
                )
                .with_usage(
                    status.queue_size as u64,
                    thresholds.queue_critical as u64,
                    status.queue_size as f64 / thresholds.queue_critical as f64 * 100.0,
                )
                .with_recommendation(
                    "System may be overloaded. Consider scaling or reducing request rate.",
                ),
            );
            self.execute_degradation("queue_size", status.queue_size as f64, None);
        } else if status.queue_size >= thresholds.queue_warning {
            out.push(
                QuotaAlert::new(
                    AlertLevel::Warning,
                    AlertType::QueueGrowing,
                    format!(
                        "Request queue growing: {} requests pending",
                        status.queue_size
                    ),
                )
                .with_recommendation("Monitor queue. May need to reduce request rate."),
            );
        }
    }

    fn check_failures(&self, out: &mut Vec<QuotaAlert>) {
        for (name, count) in self.client.consecutive_failures() {
            if count >= self.failure_threshold {
                out.push(
                    QuotaAlert::new(
                        AlertLevel::Critical,
                        AlertType::ProviderFailure,
                        format!("{name}: {count} consecutive failures"),
                    )
                    .with_provider(name.as_str())
                    .with_recommendation("Review provider status and consider alternatives."),
                );
                self.execute_degradation("provider_failure", count as f64, Some(name));
            }
        }
    }

    /// Run the first enabled strategy of this trigger type whose threshold
    /// the observed value reaches.
    fn execute_degradation(&self, kind: &str, value: f64, provider: Option<ProviderName>) {
        let strategy = {
            let strategies = self.strategies.read();
            strategies
                .iter()
                .find(|s| {
                    s.enabled && s.trigger.kind() == kind && value >= trigger_threshold(&s.trigger)
                })
                .cloned()
        };
        let Some(strategy) = strategy else {
            return;
        };

        tracing::info!(
            strategy = %strategy.name,
            trigger = kind,
            value,
            provider = provider.map(|p| p.as_str()).unwrap_or("-"),
            "executing degradation strategy"
        );

        match &strategy.action {
            Action::ReduceConcurrency { target } => {
                self.queue.set_max_concurrent(*target);
            }
            Action::SwitchProvider => {
                tracing::info!(
                    "provider switching happens via admission checks on subsequent calls"
                );
            }
            Action::ThrottleRequests { delay_ms } => {
                tracing::info!(delay_ms, "throttling recommended; queue backoff handles pacing");
            }
            Action::CacheResponses => {
                tracing::info!("response caching recommended");
            }
        }
    }
}

fn trigger_threshold(trigger: &Trigger) -> f64 {
    match trigger {
        Trigger::UsagePercentage(t) => *t,
        Trigger::QueueSize(t) => *t as f64,
        Trigger::ProviderFailure(t) => *t as f64,
    }
}
