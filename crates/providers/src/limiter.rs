//! Per-provider rate limiting over two fixed sliding windows.
//!
//! [`RateLimiter`] tracks a minute window and a day window per provider
//! and admits or denies attempts before they are sent. Windows reset
//! lazily the moment they are observed to be stale; there is no
//! background timer. Admission and recording are separate calls, so a
//! small in-flight race is accepted: this is a soft limit.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use shakes_domain::config::{ProviderName, RateLimit, RateLimitsConfig};

const MINUTE_MS: u64 = 60_000;
const DAY_MS: u64 = 86_400_000;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Clock
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Time source for window bookkeeping. Injected so tests can advance a
/// manual clock through window rollovers.
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> u64;
}

/// Wall-clock time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, Default)]
struct Window {
    started_ms: u64,
    count: u64,
}

#[derive(Debug, Clone, Copy, Default)]
struct ProviderWindows {
    minute: Window,
    day: Window,
}

/// Returned when admission is denied.
#[derive(Debug, Clone)]
pub struct Denied {
    pub reason: String,
    /// Seconds until the offending window rolls over.
    pub retry_after_secs: u64,
}

/// Usage of a single window for observability.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct WindowUsage {
    pub used: u64,
    pub limit: u64,
    pub percentage: f64,
}

/// Usage of both windows for one provider.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct UsageSnapshot {
    pub minute: WindowUsage,
    pub day: WindowUsage,
}

/// Aggregate health across all providers.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ProviderHealth {
    pub healthy: bool,
    pub warnings: Vec<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// RateLimiter
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// In-memory rate limit tracking per provider.
pub struct RateLimiter {
    config: RateLimitsConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<HashMap<ProviderName, ProviderWindows>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitsConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            state: Mutex::new(HashMap::new()),
        }
    }

    /// Decide whether an attempt against `provider` may be sent right now.
    ///
    /// Rolls over any stale window first, then compares both counts to the
    /// configured ceilings. Callers must follow an allowed decision with
    /// [`record_usage`](Self::record_usage) for the same attempt.
    pub fn check_admit(&self, provider: ProviderName) -> Result<(), Denied> {
        let limit = self.config.limit_for(provider);
        let now = self.clock.now_ms();
        let mut state = self.state.lock();
        let windows = entry(&mut state, provider, now);

        roll_over(&mut windows.minute, now, MINUTE_MS);
        if windows.minute.count >= limit.per_minute {
            let elapsed = now - windows.minute.started_ms;
            return Err(Denied {
                reason: format!(
                    "rate limit exceeded: {} requests per minute",
                    limit.per_minute
                ),
                retry_after_secs: remaining_secs(MINUTE_MS, elapsed),
            });
        }

        roll_over(&mut windows.day, now, DAY_MS);
        if windows.day.count >= limit.per_day {
            let elapsed = now - windows.day.started_ms;
            return Err(Denied {
                reason: format!("daily limit exceeded: {} requests per day", limit.per_day),
                retry_after_secs: remaining_secs(DAY_MS, elapsed),
            });
        }

        Ok(())
    }

    /// Record one attempt against both windows.
    pub fn record_usage(&self, provider: ProviderName) {
        let now = self.clock.now_ms();
        let mut state = self.state.lock();
        let windows = entry(&mut state, provider, now);
        windows.minute.count += 1;
        windows.day.count += 1;
    }

    /// Current usage of both windows, rolling over stale ones as a
    /// read-only side effect.
    pub fn usage_snapshot(&self, provider: ProviderName) -> UsageSnapshot {
        let limit = self.config.limit_for(provider);
        let now = self.clock.now_ms();
        let mut state = self.state.lock();
        let windows = entry(&mut state, provider, now);

        roll_over(&mut windows.minute, now, MINUTE_MS);
        roll_over(&mut windows.day, now, DAY_MS);

        UsageSnapshot {
            minute: usage(&windows.minute, limit.per_minute),
            day: usage(&windows.day, limit.per_day),
        }
    }

    /// Among the admitted providers, the one with the lowest mean of
    /// minute/day usage percentages. Load-balancing heuristic, not strict
    /// round robin.
    pub fn best_candidate(&self, providers: &[ProviderName]) -> Option<ProviderName> {
        let mut best: Option<(ProviderName, f64)> = None;
        for &provider in providers {
            if self.check_admit(provider).is_err() {
                continue;
            }
            let snapshot = self.usage_snapshot(provider);
            let mean = (snapshot.minute.percentage + snapshot.day.percentage) / 2.0;
            if best.map(|(_, lowest)| mean < lowest).unwrap_or(true) {
                best = Some((provider, mean));
            }
        }
        best.map(|(provider, _)| provider)
    }

    /// Whether any provider is approaching its limits (minute > 90 % or
    /// daily > 80 %), with one warning string per finding.
    pub fn health(&self) -> ProviderHealth {
        let mut warnings = Vec::new();
        for provider in ProviderName::all() {
            let snapshot = self.usage_snapshot(provider);
            if snapshot.minute.percentage > 90.0 {
                warnings.push(format!(
                    "{provider}: minute limit at {:.1}%",
                    snapshot.minute.percentage
                ));
            }
            if snapshot.day.percentage > 80.0 {
                warnings.push(format!(
                    "{provider}: daily limit at {:.1}%",
                    snapshot.day.percentage
                ));
            }
        }
        ProviderHealth {
            healthy: warnings.is_empty(),
            warnings,
        }
    }

    /// Usage snapshots for every known provider, in catalog order.
    pub fn all_snapshots(&self) -> Vec<(ProviderName, UsageSnapshot)> {
        ProviderName::all()
            .into_iter()
            .map(|p| (p, self.usage_snapshot(p)))
            .collect()
    }

    /// Drop tracked state for one provider, or for all of them.
    pub fn reset(&self, provider: Option<ProviderName>) {
        let mut state = self.state.lock();
        match provider {
            Some(p) => {
                state.remove(&p);
            }
            None => state.clear(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Internal helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn entry(
    state: &mut HashMap<ProviderName, ProviderWindows>,
    provider: ProviderName,
    now: u64,
) -> &mut ProviderWindows {
    state.entry(provider).or_insert_with(|| ProviderWindows {
        minute: Window {
            started_ms: now,
            count: 0,
        },
        day: Window {
            started_ms: now,
            count: 0,
        },
    })
}

/// Zero a window whose age has reached its length.
fn roll_over(window: &mut Window, now: u64, length_ms: u64) {
    if now.saturating_sub(window.started_ms) >= length_ms {
        window.started_ms = now;
        window.count = 0;
    }
}

fn remaining_secs(length_ms: u64, elapsed_ms: u64) -> u64 {
    length_ms.saturating_sub(elapsed_ms).div_ceil(1000)
}

fn usage(window: &Window, limit: u64) -> WindowUsage {
    WindowUsage {
        used: window.count,
        limit,
        percentage: if limit == 0 {
            0.0
        } else {
            window.count as f64 / limit as f64 * 100.0
        },
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
