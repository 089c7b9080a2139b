//! Wait and retry integration tests
//!
//! Timing and counting guarantees of the condition engine and the action
//! executor, driven through the registry like real page code would.

mod common;

use std::time::{Duration, Instant};

use signup_probe::config::BrowserKind;
use signup_probe::poll::{Condition, ConditionPoller};
use signup_probe::report::ProbeEvent;
use signup_probe::Error;

#[tokio::test]
async fn test_satisfied_condition_returns_faster_than_one_interval() {
    let h = common::harness();
    let session = h.registry.acquire("w1", BrowserKind::Chrome).await.unwrap();
    let client = h.backend.client_for("w1").unwrap();
    client.push_eval(common::element()).await;

    let poller = ConditionPoller::new(Duration::from_millis(300));
    let started = Instant::now();
    let outcome = poller
        .wait(
            &session,
            &Condition::clickable("#submit"),
            Duration::from_secs(10),
        )
        .await;

    assert!(outcome.is_satisfied());
    assert!(started.elapsed() < Duration::from_millis(300));
}

#[tokio::test]
async fn test_hopeless_wait_times_out_in_bounded_window() {
    let h = common::harness();
    let session = h.registry.acquire("w1", BrowserKind::Chrome).await.unwrap();
    let client = h.backend.client_for("w1").unwrap();
    client.set_default_eval(common::status("absent")).await;

    let timeout = Duration::from_millis(150);
    let interval = Duration::from_millis(50);
    let poller = ConditionPoller::new(interval);

    let started = Instant::now();
    let result = poller
        .wait_for(&session, &Condition::visible("#ghost"), timeout)
        .await;
    let elapsed = started.elapsed();

    assert!(matches!(result.unwrap_err(), Error::ConditionTimeout { .. }));
    assert!(elapsed >= timeout);
    assert!(elapsed < timeout + interval + Duration::from_millis(100));
}

#[tokio::test]
async fn test_loading_indicator_disappearance_is_polled() {
    let h = common::harness();
    let session = h.registry.acquire("w1", BrowserKind::Chrome).await.unwrap();
    let client = h.backend.client_for("w1").unwrap();

    // The spinner stays up for two observations, then the view swaps.
    client
        .push_evals([
            common::status("lingering"),
            common::status("lingering"),
            common::status("absent"),
        ])
        .await;

    let poller = ConditionPoller::new(Duration::from_millis(50));
    let outcome = poller
        .wait(
            &session,
            &Condition::absent(".loading-spinner"),
            Duration::from_secs(2),
        )
        .await;

    assert!(outcome.is_satisfied());
    assert_eq!(client.eval_count(), 3);
}

#[tokio::test]
async fn test_retry_budget_counts_first_try() {
    let h = common::harness();
    let session = h.registry.acquire("w1", BrowserKind::Chrome).await.unwrap();
    let client = h.backend.client_for("w1").unwrap();

    for _ in 0..3 {
        client
            .push_evals([common::element(), common::status("detached")])
            .await;
    }

    let err = h.executor.click(&session, "#submit").await.unwrap_err();
    assert!(matches!(err, Error::RetryExhausted { attempts: 3, .. }));

    let attempts = h
        .sink
        .count_where(|e| matches!(e, ProbeEvent::ActionAttempt { .. }));
    assert_eq!(attempts, 3);
}

#[tokio::test]
async fn test_transient_recovery_is_logged_once() {
    let h = common::harness();
    let session = h.registry.acquire("w1", BrowserKind::Chrome).await.unwrap();
    let client = h.backend.client_for("w1").unwrap();

    client
        .push_evals([
            common::element(),
            common::status("detached"),
            common::element(),
            common::status("ok"),
        ])
        .await;

    h.executor.type_text(&session, "#email", "x").await.unwrap();

    assert_eq!(
        h.sink
            .count_where(|e| matches!(e, ProbeEvent::RetryScheduled { .. })),
        1
    );
    assert_eq!(
        h.sink
            .count_where(|e| matches!(e, ProbeEvent::WaitStarted { .. })),
        2
    );
}

#[tokio::test]
async fn test_sink_failures_do_not_change_outcomes() {
    // A sink is a pure observer; even one that records nothing leaves the
    // action outcome untouched.
    let h = common::harness();
    let session = h.registry.acquire("w1", BrowserKind::Chrome).await.unwrap();
    let client = h.backend.client_for("w1").unwrap();
    client
        .push_evals([common::element(), common::action_ok()])
        .await;

    h.executor.click(&session, "#submit").await.unwrap();
}
