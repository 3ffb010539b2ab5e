//! Integration tests for the quota monitor: threshold classification,
//! level precedence, degradation execution, callback fan-out and the
//! advisory usage prediction.

mod common;

use std::sync::Arc;

use common::{fast_queue, roomy, stack, StubAdapter};
use parking_lot::Mutex;
use shakes_domain::alert::{
    Action, AlertLevel, AlertType, DegradationStrategy, QuotaAlert, Trigger,
};
use shakes_domain::config::{MonitorConfig, ProviderName, RateLimit};
use shakes_gateway::runtime::monitor::{HealthState, QuotaMonitor};

fn monitor_over(s: &common::Stack, config: MonitorConfig) -> Arc<QuotaMonitor> {
    Arc::new(QuotaMonitor::new(
        config,
        s.registry.clone(),
        s.limiter.clone(),
        s.queue.clone(),
        s.client.clone(),
    ))
}

/// Collects alerts delivered through the callback fan-out.
fn collector(monitor: &QuotaMonitor) -> Arc<Mutex<Vec<QuotaAlert>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    monitor.on_alert(move |alert| sink.lock().push(alert.clone()));
    seen
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Threshold classification
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn critical_takes_precedence_over_warning() {
    // 96 % daily usage against warning=80 / critical=95 must produce one
    // critical alert, not a warning.
    let s = stack(
        &[(
            ProviderName::Groq,
            StubAdapter::ok(),
            RateLimit {
                per_minute: 1_000_000,
                per_day: 100,
            },
        )],
        fast_queue(0),
    );
    for _ in 0..96 {
        s.limiter.record_usage(ProviderName::Groq);
    }

    let monitor = monitor_over(&s, MonitorConfig::default());
    monitor.sweep();

    let daily: Vec<QuotaAlert> = monitor
        .alerts(None, 50)
        .into_iter()
        .filter(|a| a.alert_type == AlertType::ApproachingDailyLimit)
        .collect();
    assert_eq!(daily.len(), 1);
    assert_eq!(daily[0].level, AlertLevel::Critical);
    assert_eq!(daily[0].percentage, Some(96.0));
}

#[tokio::test]
async fn warning_fires_between_the_thresholds() {
    let s = stack(
        &[(
            ProviderName::Groq,
            StubAdapter::ok(),
            RateLimit {
                per_minute: 100,
                per_day: 1_000_000,
            },
        )],
        fast_queue(0),
    );
    for _ in 0..75 {
        s.limiter.record_usage(ProviderName::Groq);
    }

    let monitor = monitor_over(&s, MonitorConfig::default());
    monitor.sweep();

    let alerts = monitor.alerts(Some(AlertLevel::Warning), 50);
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].alert_type, AlertType::ApproachingMinuteLimit);
}

#[tokio::test]
async fn saturated_window_upgrades_to_exceeded_type() {
    let s = stack(
        &[(
            ProviderName::Groq,
            StubAdapter::ok(),
            RateLimit {
                per_minute: 10,
                per_day: 1_000_000,
            },
        )],
        fast_queue(0),
    );
    for _ in 0..10 {
        s.limiter.record_usage(ProviderName::Groq);
    }

    let monitor = monitor_over(&s, MonitorConfig::default());
    monitor.sweep();

    let alerts = monitor.alerts(Some(AlertLevel::Critical), 50);
    assert!(alerts
        .iter()
        .any(|a| a.alert_type == AlertType::MinuteLimitExceeded));
}

#[tokio::test]
async fn all_providers_saturated_raises_global_outage() {
    let limit = RateLimit {
        per_minute: 1,
        per_day: 1_000_000,
    };
    let s = stack(
        &[
            (ProviderName::Groq, StubAdapter::ok(), limit),
            (ProviderName::Openai, StubAdapter::ok(), limit),
        ],
        fast_queue(0),
    );
    s.limiter.record_usage(ProviderName::Groq);
    s.limiter.record_usage(ProviderName::Openai);

    let monitor = monitor_over(&s, MonitorConfig::default());
    monitor.sweep();

    assert!(monitor
        .alerts(None, 50)
        .iter()
        .any(|a| a.alert_type == AlertType::AllProvidersLimited));
}

#[tokio::test]
async fn healthy_usage_produces_no_alerts() {
    let s = stack(
        &[(ProviderName::Groq, StubAdapter::ok(), roomy())],
        fast_queue(0),
    );
    s.limiter.record_usage(ProviderName::Groq);

    let monitor = monitor_over(&s, MonitorConfig::default());
    monitor.sweep();

    assert!(monitor.alerts(None, 50).is_empty());
    assert_eq!(monitor.status_summary().status, HealthState::Healthy);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Degradation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn daily_critical_reduces_queue_concurrency() {
    let s = stack(
        &[(
            ProviderName::Groq,
            StubAdapter::ok(),
            RateLimit {
                per_minute: 1_000_000,
                per_day: 100,
            },
        )],
        fast_queue(0),
    );
    s.queue.set_max_concurrent(5);
    for _ in 0..96 {
        s.limiter.record_usage(ProviderName::Groq);
    }

    let monitor = monitor_over(&s, MonitorConfig::default());
    monitor.sweep();

    // The default strategy set reduces concurrency to 3 at 85 % usage.
    assert_eq!(s.queue.max_concurrent(), 3);
}

#[tokio::test]
async fn disabled_strategy_does_not_run() {
    let s = stack(
        &[(
            ProviderName::Groq,
            StubAdapter::ok(),
            RateLimit {
                per_minute: 1_000_000,
                per_day: 100,
            },
        )],
        fast_queue(0),
    );
    s.queue.set_max_concurrent(5);
    for _ in 0..96 {
        s.limiter.record_usage(ProviderName::Groq);
    }

    let monitor = monitor_over(&s, MonitorConfig::default());
    assert!(monitor.toggle_strategy("Reduce concurrency on high usage", false));
    monitor.sweep();

    assert_eq!(s.queue.max_concurrent(), 5, "disabled strategy must not act");
}

#[tokio::test]
async fn first_matching_strategy_wins_per_trigger_type() {
    let s = stack(
        &[(
            ProviderName::Groq,
            StubAdapter::ok(),
            RateLimit {
                per_minute: 1_000_000,
                per_day: 100,
            },
        )],
        fast_queue(0),
    );
    s.queue.set_max_concurrent(5);
    for _ in 0..96 {
        s.limiter.record_usage(ProviderName::Groq);
    }

    let mut config = MonitorConfig::default();
    config.strategies = vec![
        DegradationStrategy {
            name: "first".into(),
            enabled: true,
            trigger: Trigger::UsagePercentage(90.0),
            action: Action::ReduceConcurrency { target: 2 },
        },
        DegradationStrategy {
            name: "second".into(),
            enabled: true,
            trigger: Trigger::UsagePercentage(90.0),
            action: Action::ReduceConcurrency { target: 8 },
        },
    ];
    let monitor = monitor_over(&s, config);
    monitor.sweep();

    assert_eq!(s.queue.max_concurrent(), 2, "only the first match executes");
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Callback fan-out & summary
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn new_alerts_fan_out_to_every_callback() {
    let s = stack(
        &[(
            ProviderName::Groq,
            StubAdapter::ok(),
            RateLimit {
                per_minute: 10,
                per_day: 1_000_000,
            },
        )],
        fast_queue(0),
    );
    for _ in 0..8 {
        s.limiter.record_usage(ProviderName::Groq);
    }

    let monitor = monitor_over(&s, MonitorConfig::default());
    let first = collector(&monitor);
    let second = collector(&monitor);
    monitor.sweep();

    assert_eq!(first.lock().len(), 1);
    assert_eq!(second.lock().len(), 1);
    assert_eq!(first.lock()[0].level, AlertLevel::Warning);
}

#[tokio::test]
async fn summary_rolls_up_recent_levels_and_recommendations() {
    let s = stack(
        &[(
            ProviderName::Groq,
            StubAdapter::ok(),
            RateLimit {
                per_minute: 10,
                per_day: 100,
            },
        )],
        fast_queue(0),
    );
    // Minute critical and daily warning at once.
    for _ in 0..10 {
        s.limiter.record_usage(ProviderName::Groq);
    }
    for _ in 0..75 {
        s.limiter.record_usage(ProviderName::Groq);
    }

    let monitor = monitor_over(&s, MonitorConfig::default());
    monitor.sweep();

    let summary = monitor.status_summary();
    assert_eq!(summary.status, HealthState::Critical);
    assert!(summary.critical >= 1);
    assert!(!summary.recommendations.is_empty());
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Prediction
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn prediction_extrapolates_the_sweep_delta() {
    let s = stack(
        &[(
            ProviderName::Groq,
            StubAdapter::ok(),
            RateLimit {
                per_minute: 100,
                per_day: 1_000_000,
            },
        )],
        fast_queue(0),
    );
    for _ in 0..10 {
        s.limiter.record_usage(ProviderName::Groq);
    }

    // Default interval is 30 s, so one minute covers two sweeps.
    let monitor = monitor_over(&s, MonitorConfig::default());
    monitor.sweep();

    // Ten more requests since the sweep: a rate of 10 per sweep.
    for _ in 0..10 {
        s.limiter.record_usage(ProviderName::Groq);
    }

    let short = monitor.predict(1.0);
    assert_eq!(short.len(), 1);
    assert!(
        !short[0].will_exceed_minute,
        "20 used + 10/sweep over 2 sweeps stays under 100"
    );

    let long = monitor.predict(5.0);
    assert!(
        long[0].will_exceed_minute,
        "20 used + 10/sweep over 10 sweeps crosses 100"
    );
    assert_eq!(long[0].projected_minute_pct, 100.0, "projection is capped");
}

#[tokio::test]
async fn prediction_needs_a_prior_sweep() {
    let s = stack(
        &[(ProviderName::Groq, StubAdapter::ok(), roomy())],
        fast_queue(0),
    );
    let monitor = monitor_over(&s, MonitorConfig::default());
    assert!(monitor.predict(1.0).is_empty());
}
