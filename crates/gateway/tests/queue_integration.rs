//! Integration tests for the request queue: priority ordering, retry
//! ceilings, the all-providers-limited path, and the emergency clear.

mod common;

use common::{fast_queue, roomy, stack, StubAdapter};
use shakes_domain::chat::{CompletionRequest, Priority, TaskClass};
use shakes_domain::config::{ProviderName, RateLimit};
use shakes_domain::error::Error;

fn request(prompt: &str) -> CompletionRequest {
    CompletionRequest::from_prompt(prompt, None, TaskClass::Standard)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Priority ordering
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn mixed_enqueue_order_dequeues_by_priority_then_fifo() {
    let groq = StubAdapter::ok();
    let s = stack(
        &[(ProviderName::Groq, groq.clone(), roomy())],
        fast_queue(0),
    );

    // Enqueue in mixed order before the worker starts, so insertion
    // position alone decides service order.
    let mut receivers = Vec::new();
    for (prompt, priority) in [
        ("low1", Priority::Low),
        ("norm1", Priority::Normal),
        ("high1", Priority::High),
        ("norm2", Priority::Normal),
        ("high2", Priority::High),
    ] {
        receivers.push(s.queue.enqueue(request(prompt), priority).unwrap());
    }
    tokio::spawn(s.queue.clone().run());

    for rx in receivers {
        rx.await.unwrap().unwrap();
    }

    assert_eq!(
        groq.served(),
        vec!["high1", "high2", "norm1", "norm2", "low1"],
        "both highs in arrival order, then normals, then low"
    );
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Retry ceiling
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn failing_request_makes_exactly_max_retries_plus_one_attempts() {
    let groq = StubAdapter::failing("HTTP 500 - boom");
    let s = stack(
        &[(ProviderName::Groq, groq.clone(), roomy())],
        fast_queue(2),
    );
    tokio::spawn(s.queue.clone().run());

    let err = s
        .queue
        .submit(request("doomed"), Priority::Normal)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NoProvider { .. }));
    assert_eq!(groq.calls(), 3, "max_retries = 2 means 3 total attempts");
}

#[tokio::test]
async fn flaky_request_eventually_succeeds() {
    let groq = StubAdapter::flaky("HTTP 503 - transient", 2);
    let s = stack(
        &[(ProviderName::Groq, groq.clone(), roomy())],
        fast_queue(3),
    );
    tokio::spawn(s.queue.clone().run());

    let result = s
        .queue
        .submit(request("persistent"), Priority::Normal)
        .await
        .unwrap();
    assert_eq!(result.provider, "groq");
    assert_eq!(groq.calls(), 3, "two failures, then the success");
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// All providers rate limited
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn saturated_providers_wait_then_exhaust_without_calling_adapters() {
    let groq = StubAdapter::ok();
    // Ceiling of zero: admission is always denied.
    let s = stack(
        &[(
            ProviderName::Groq,
            groq.clone(),
            RateLimit {
                per_minute: 0,
                per_day: 0,
            },
        )],
        fast_queue(1),
    );
    tokio::spawn(s.queue.clone().run());

    let err = s
        .queue
        .submit(request("stuck"), Priority::Normal)
        .await
        .unwrap_err();
    match err {
        Error::RetriesExhausted(message) => {
            assert!(message.contains("rate limited"));
        }
        other => panic!("expected RetriesExhausted, got {other}"),
    }
    assert_eq!(groq.calls(), 0, "denied requests never reach an adapter");
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Administrative operations
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn clear_rejects_everything_pending() {
    let groq = StubAdapter::ok();
    let s = stack(&[(ProviderName::Groq, groq, roomy())], fast_queue(0));
    // Worker deliberately not started; requests stay queued.

    let rx1 = s.queue.enqueue(request("a"), Priority::Normal).unwrap();
    let rx2 = s.queue.enqueue(request("b"), Priority::High).unwrap();
    assert_eq!(s.queue.status().queue_size, 2);

    let rejected = s.queue.clear();
    assert_eq!(rejected, 2);
    assert_eq!(s.queue.status().queue_size, 0);

    for rx in [rx1, rx2] {
        let err = rx.await.unwrap().unwrap_err();
        assert!(matches!(err, Error::QueueCleared));
    }
}

#[tokio::test]
async fn status_breaks_depth_down_by_priority() {
    let groq = StubAdapter::ok();
    let s = stack(&[(ProviderName::Groq, groq, roomy())], fast_queue(0));

    let _rxs: Vec<_> = [
        (Priority::High, "h"),
        (Priority::Normal, "n1"),
        (Priority::Normal, "n2"),
        (Priority::Low, "l"),
    ]
    .into_iter()
    .map(|(priority, prompt)| s.queue.enqueue(request(prompt), priority).unwrap())
    .collect();

    let status = s.queue.status();
    assert_eq!(status.queue_size, 4);
    assert_eq!(status.high_priority, 1);
    assert_eq!(status.normal_priority, 2);
    assert_eq!(status.low_priority, 1);
    assert_eq!(status.in_flight, 0);
}

#[tokio::test]
async fn enqueue_without_any_provider_fails_fast() {
    let s = stack(&[], fast_queue(0));
    let err = s
        .queue
        .enqueue(request("nobody home"), Priority::Normal)
        .unwrap_err();
    assert!(matches!(err, Error::Config(_)));
    assert_eq!(s.queue.status().queue_size, 0, "nothing may be queued");
}
