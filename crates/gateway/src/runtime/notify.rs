//! In-app notification center.
//!
//! Holds the active toast set the dashboard polls. Critical alerts stay
//! up for ten seconds, everything else for five; expiry is evaluated
//! lazily on read against the injected clock, the same way the rate
//! limiter rolls its windows.

use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use shakes_domain::alert::{AlertLevel, QuotaAlert};
use shakes_providers::Clock;

const CRITICAL_TOAST_MS: u64 = 10_000;
const DEFAULT_TOAST_MS: u64 = 5_000;
const MAX_ACTIVE: usize = 20;

struct Toast {
    alert: QuotaAlert,
    expires_at_ms: u64,
}

pub struct NotificationCenter {
    clock: Arc<dyn Clock>,
    toasts: Mutex<Vec<Toast>>,
}

impl NotificationCenter {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            toasts: Mutex::new(Vec::new()),
        }
    }

    /// Add a toast for a fresh alert. Oldest entries are dropped beyond
    /// the active cap.
    pub fn push(&self, alert: &QuotaAlert) {
        let duration = match alert.level {
            AlertLevel::Critical => CRITICAL_TOAST_MS,
            _ => DEFAULT_TOAST_MS,
        };
        let mut toasts = self.toasts.lock();
        toasts.push(Toast {
            alert: alert.clone(),
            expires_at_ms: self.clock.now_ms() + duration,
        });
        if toasts.len() > MAX_ACTIVE {
            let excess = toasts.len() - MAX_ACTIVE;
            toasts.drain(..excess);
        }
    }

    /// The currently visible toasts, pruning expired ones on the way.
    pub fn active(&self) -> Vec<QuotaAlert> {
        let now = self.clock.now_ms();
        let mut toasts = self.toasts.lock();
        toasts.retain(|t| t.expires_at_ms > now);
        toasts.iter().map(|t| t.alert.clone()).collect()
    }

    /// Dismiss one toast by alert id. Returns whether it was present.
    pub fn dismiss(&self, id: Uuid) -> bool {
        let mut toasts = self.toasts.lock();
        let before = toasts.len();
        toasts.retain(|t| t.alert.id != id);
        toasts.len() != before
    }
}
