//! Priority request queue with bounded concurrency and retry.
//!
//! Decouples bulk/background completion demand from synchronous rate-limit
//! admission. A single worker loop admits requests from the front of a
//! priority-partitioned deque up to a runtime-adjustable concurrency
//! ceiling, woken by [`Notify`] on enqueue and on completion rather than
//! polling on a timer.
//!
//! Per-request lifecycle: queued → in-flight → resolved, or back to the
//! front of its priority partition after a backoff when retries remain.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::{oneshot, Notify};

use shakes_domain::chat::{CompletionRequest, CompletionResult, Priority};
use shakes_domain::config::QueueConfig;
use shakes_domain::error::{Error, Result};
use shakes_providers::CompletionClient;

/// Hard bounds for the runtime-adjustable concurrency ceiling.
const MIN_CONCURRENT: usize = 1;
const MAX_CONCURRENT: usize = 20;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One buffered completion request, owned by the queue until resolved.
struct QueuedRequest {
    id: String,
    request: CompletionRequest,
    priority: Priority,
    enqueued_at: DateTime<Utc>,
    retries: u32,
    max_retries: u32,
    tx: oneshot::Sender<Result<CompletionResult>>,
}

/// Observability snapshot of the queue.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct QueueStatus {
    pub queue_size: usize,
    pub in_flight: usize,
    pub high_priority: usize,
    pub normal_priority: usize,
    pub low_priority: usize,
}

fn rank(priority: Priority) -> u8 {
    match priority {
        Priority::High => 0,
        Priority::Normal => 1,
        Priority::Low => 2,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// RequestQueue
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct RequestQueue {
    config: QueueConfig,
    client: Arc<CompletionClient>,
    queue: Mutex<VecDeque<QueuedRequest>>,
    notify: Notify,
    in_flight: AtomicUsize,
    max_concurrent: AtomicUsize,
    next_id: AtomicU64,
}

impl RequestQueue {
    pub fn new(config: QueueConfig, client: Arc<CompletionClient>) -> Self {
        let max_concurrent = config.max_concurrent.clamp(MIN_CONCURRENT, MAX_CONCURRENT);
        Self {
            config,
            client,
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            in_flight: AtomicUsize::new(0),
            max_concurrent: AtomicUsize::new(max_concurrent),
            next_id: AtomicU64::new(0),
        }
    }

    // ── Public API ─────────────────────────────────────────────────

    /// Buffer a request and hand back the pending result.
    ///
    /// Fails fast with a configuration error when no provider has a
    /// credential; nothing is queued in that case.
    pub fn enqueue(
        &self,
        request: CompletionRequest,
        priority: Priority,
    ) -> Result<oneshot::Receiver<Result<CompletionResult>>> {
        if !self.client.registry().has_any_provider() {
            return Err(Error::Config(self.client.registry().setup_message()));
        }

        let (tx, rx) = oneshot::channel();
        let id = format!("req_{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let entry = QueuedRequest {
            id: id.clone(),
            request,
            priority,
            enqueued_at: Utc::now(),
            retries: 0,
            max_retries: self.config.max_retries,
            tx,
        };

        let depth = {
            let mut queue = self.queue.lock();
            let at = partition_end(&queue, priority);
            queue.insert(at, entry);
            queue.len()
        };
        tracing::debug!(id = %id, priority = ?priority, depth, "request queued");
        self.notify.notify_one();
        Ok(rx)
    }

    /// Enqueue and wait for the terminal outcome.
    pub async fn submit(
        &self,
        request: CompletionRequest,
        priority: Priority,
    ) -> Result<CompletionResult> {
        let rx = self.enqueue(request, priority)?;
        rx.await
            .unwrap_or_else(|_| Err(Error::Other("queue dropped the request".into())))
    }

    /// Worker loop. Runs for the lifetime of the process; spawn once.
    pub async fn run(self: Arc<Self>) {
        loop {
            while self.in_flight.load(Ordering::SeqCst) < self.max_concurrent.load(Ordering::SeqCst)
            {
                let Some(entry) = self.queue.lock().pop_front() else {
                    break;
                };
                self.in_flight.fetch_add(1, Ordering::SeqCst);
                let queue = self.clone();
                tokio::spawn(async move {
                    queue.process(entry).await;
                    queue.in_flight.fetch_sub(1, Ordering::SeqCst);
                    queue.notify.notify_one();
                });
            }
            self.notify.notified().await;
        }
    }

    /// Current depth, in-flight count and per-priority breakdown.
    pub fn status(&self) -> QueueStatus {
        let queue = self.queue.lock();
        let count = |p: Priority| queue.iter().filter(|r| r.priority == p).count();
        QueueStatus {
            queue_size: queue.len(),
            in_flight: self.in_flight.load(Ordering::SeqCst),
            high_priority: count(Priority::High),
            normal_priority: count(Priority::Normal),
            low_priority: count(Priority::Low),
        }
    }

    /// Reject every queued request and empty the queue. Emergency reset,
    /// not part of normal operation.
    pub fn clear(&self) -> usize {
        let drained: Vec<QueuedRequest> = self.queue.lock().drain(..).collect();
        let rejected = drained.len();
        for entry in drained {
            let _ = entry.tx.send(Err(Error::QueueCleared));
        }
        tracing::info!(rejected, "queue cleared");
        rejected
    }

    /// Adjust the worker budget at runtime (used by the quota monitor's
    /// degradation actions). Clamped to a sane range.
    pub fn set_max_concurrent(&self, max: usize) {
        let clamped = max.clamp(MIN_CONCURRENT, MAX_CONCURRENT);
        self.max_concurrent.store(clamped, Ordering::SeqCst);
        tracing::info!(max_concurrent = clamped, "queue concurrency updated");
        self.notify.notify_one();
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent.load(Ordering::SeqCst)
    }

    // ── Internal helpers ───────────────────────────────────────────

    /// Drive one request to a terminal state or back into the queue.
    async fn process(&self, mut entry: QueuedRequest) {
        tracing::debug!(
            id = %entry.id,
            attempt = entry.retries + 1,
            of = entry.max_retries + 1,
            queued_ms = (Utc::now() - entry.enqueued_at).num_milliseconds(),
            "processing queued request"
        );

        // When every provider is saturated the failure is transient and
        // self-resolving as windows roll over, so wait out a longer fixed
        // delay instead of burning the exponential backoff.
        let enabled = self.client.registry().enabled_providers();
        let any_admitted = enabled
            .iter()
            .any(|p| self.client.limiter().check_admit(p.name).is_ok());
        if !enabled.is_empty() && !any_admitted {
            tracing::warn!(id = %entry.id, "all providers rate limited, waiting");
            tokio::time::sleep(Duration::from_millis(self.config.all_limited_wait_ms)).await;
            if entry.retries < entry.max_retries {
                entry.retries += 1;
                self.requeue_front(entry);
            } else {
                let _ = entry.tx.send(Err(Error::RetriesExhausted(
                    "all providers rate limited".into(),
                )));
            }
            return;
        }

        match self.client.complete(&entry.request).await {
            Ok(result) => {
                tracing::debug!(id = %entry.id, provider = %result.provider, "request completed");
                let _ = entry.tx.send(Ok(result));
            }
            Err(e @ Error::Config(_)) => {
                // Providers disappeared between admission checks; not retryable.
                let _ = entry.tx.send(Err(e));
            }
            Err(e) if entry.retries < entry.max_retries => {
                entry.retries += 1;
                let backoff = self.backoff(entry.retries);
                tracing::warn!(
                    id = %entry.id,
                    error = %e,
                    retry = entry.retries,
                    backoff_ms = backoff.as_millis() as u64,
                    "request failed, will retry"
                );
                tokio::time::sleep(backoff).await;
                self.requeue_front(entry);
            }
            Err(e) => {
                tracing::error!(id = %entry.id, error = %e, "request failed, retries exhausted");
                let _ = entry.tx.send(Err(e));
            }
        }
    }

    /// Exponential backoff: base · 2^attempt, capped.
    fn backoff(&self, attempt: u32) -> Duration {
        let ms = self
            .config
            .backoff_base_ms
            .saturating_mul(1u64 << attempt.min(16))
            .min(self.config.backoff_cap_ms);
        Duration::from_millis(ms)
    }

    /// Re-insert ahead of same-priority work so a retried request is
    /// serviced before newly arrived peers.
    fn requeue_front(&self, entry: QueuedRequest) {
        let mut queue = self.queue.lock();
        let at = partition_start(&queue, entry.priority);
        queue.insert(at, entry);
        drop(queue);
        self.notify.notify_one();
    }
}

/// First index after every entry of this priority or higher, where a
/// fresh arrival goes (FIFO within its class).
fn partition_end(queue: &VecDeque<QueuedRequest>, priority: Priority) -> usize {
    queue
        .iter()
        .position(|r| rank(r.priority) > rank(priority))
        .unwrap_or(queue.len())
}

/// First index of this priority's partition, where a retry goes.
fn partition_start(queue: &VecDeque<QueuedRequest>, priority: Priority) -> usize {
    queue
        .iter()
        .position(|r| rank(r.priority) >= rank(priority))
        .unwrap_or(queue.len())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
