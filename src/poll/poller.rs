//! Condition polling engine
//!
//! Bridges the eventually-consistent DOM to synchronous callers: evaluate
//! the condition, short-circuit on success, poll through transient errors,
//! abort on fatal ones, give up at the deadline. Sleeping happens only
//! between evaluations and only blocks the calling worker.

use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::config::Config;
use crate::poll::condition::{Condition, ElementHandle};
use crate::session::Session;
use crate::{Error, Result};

/// Interval used when the caller passes zero
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Interval used when nothing is configured
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Result of one poll loop
#[derive(Debug)]
pub enum WaitOutcome {
    /// Condition held; the handle is present for element conditions
    Satisfied(Option<ElementHandle>),
    /// Deadline passed; carries the last transient error for diagnostics
    TimedOut { last_seen: Option<Error> },
    /// A non-recoverable error ended the wait early
    Fatal(Error),
}

impl WaitOutcome {
    /// Whether the condition was satisfied
    pub fn is_satisfied(&self) -> bool {
        matches!(self, WaitOutcome::Satisfied(_))
    }

    /// Collapse the outcome into a `Result`, folding a timeout into a
    /// condition-timeout error that keeps the last observation.
    pub fn into_result(self, condition: &Condition, budget: Duration) -> Result<Option<ElementHandle>> {
        match self {
            WaitOutcome::Satisfied(handle) => Ok(handle),
            WaitOutcome::TimedOut { last_seen } => Err(Error::ConditionTimeout {
                condition: condition.name().to_string(),
                selector: condition.selector().to_string(),
                budget_ms: budget.as_millis() as u64,
                last_seen: last_seen.map(Box::new),
            }),
            WaitOutcome::Fatal(e) => Err(e),
        }
    }
}

/// Condition polling engine
#[derive(Debug, Clone)]
pub struct ConditionPoller {
    poll_interval: Duration,
}

impl ConditionPoller {
    /// Create a poller with the given interval; zero is clamped to the
    /// minimal positive default rather than busy-looping.
    pub fn new(poll_interval: Duration) -> Self {
        let poll_interval = if poll_interval.is_zero() {
            MIN_POLL_INTERVAL
        } else {
            poll_interval
        };
        Self { poll_interval }
    }

    /// Poller with the configured interval
    pub fn from_config(config: &Config) -> Self {
        Self::new(Duration::from_millis(config.poll_interval_ms))
    }

    /// Interval between evaluations
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Wait until `condition` holds on `session`, or the budget runs out.
    ///
    /// A zero `timeout` performs exactly one evaluation and never sleeps.
    /// Success returns immediately without waiting out the interval.
    pub async fn wait(
        &self,
        session: &Session,
        condition: &Condition,
        timeout: Duration,
    ) -> WaitOutcome {
        let started = Instant::now();
        let mut evaluations: u32 = 0;
        let mut last_seen: Option<Error> = None;

        debug!(
            "Waiting for {} (budget {}ms, interval {}ms)",
            condition,
            timeout.as_millis(),
            self.poll_interval.as_millis()
        );

        loop {
            evaluations += 1;
            match Self::evaluate_once(session, condition).await {
                Ok(value) => {
                    debug!(
                        "{} satisfied after {} evaluation(s) in {}ms",
                        condition,
                        evaluations,
                        started.elapsed().as_millis()
                    );
                    return WaitOutcome::Satisfied(value);
                }
                Err(e) if e.is_transient() => {
                    trace!("{} evaluation {}: {}", condition, evaluations, e);
                    last_seen = Some(e);
                }
                Err(e) => {
                    debug!("{} aborted: {}", condition, e);
                    return WaitOutcome::Fatal(e);
                }
            }

            if started.elapsed() >= timeout {
                debug!(
                    "{} timed out after {} evaluation(s) in {}ms",
                    condition,
                    evaluations,
                    started.elapsed().as_millis()
                );
                return WaitOutcome::TimedOut { last_seen };
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Wait and collapse into a `Result` in one step
    pub async fn wait_for(
        &self,
        session: &Session,
        condition: &Condition,
        timeout: Duration,
    ) -> Result<Option<ElementHandle>> {
        self.wait(session, condition, timeout)
            .await
            .into_result(condition, timeout)
    }

    /// One evaluation of the condition against the live DOM
    async fn evaluate_once(
        session: &Session,
        condition: &Condition,
    ) -> Result<Option<ElementHandle>> {
        let observation = session.probe(&condition.probe_script()).await?;
        condition.interpret(observation)
    }
}

impl Default for ConditionPoller {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cdp::mock::{MockCdpClient, ScriptedEval};
    use crate::config::BrowserKind;
    use crate::session::traits::{SessionState, SessionTransport};
    use std::sync::Arc;

    fn ready_session() -> (Arc<Session>, Arc<MockCdpClient>) {
        let client = Arc::new(MockCdpClient::new());
        let session = Session::new(
            "w1",
            BrowserKind::Chrome,
            true,
            SessionTransport {
                client: client.clone(),
                browser: None,
            },
        );
        session.advance(SessionState::Ready).unwrap();
        (Arc::new(session), client)
    }

    fn satisfied_probe() -> ScriptedEval {
        ScriptedEval::Value(serde_json::json!({
            "status": "satisfied",
            "tag": "button",
            "rect": { "x": 10.0, "y": 10.0, "width": 20.0, "height": 20.0 }
        }))
    }

    fn status_probe(status: &str) -> ScriptedEval {
        ScriptedEval::Value(serde_json::json!({ "status": status }))
    }

    #[tokio::test]
    async fn test_already_satisfied_returns_without_sleeping() {
        let (session, client) = ready_session();
        client.push_eval(satisfied_probe()).await;

        let poller = ConditionPoller::new(Duration::from_millis(200));
        let started = std::time::Instant::now();
        let outcome = poller
            .wait(
                &session,
                &Condition::clickable("#submit"),
                Duration::from_secs(5),
            )
            .await;

        assert!(outcome.is_satisfied());
        assert_eq!(client.eval_count(), 1);
        // Strictly less than one poll interval: the fast path never sleeps
        assert!(started.elapsed() < Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_never_true_times_out_within_one_interval() {
        let (session, client) = ready_session();
        client.set_default_eval(status_probe("absent")).await;

        let timeout = Duration::from_millis(120);
        let interval = Duration::from_millis(40);
        let poller = ConditionPoller::new(interval);

        let started = std::time::Instant::now();
        let outcome = poller
            .wait(&session, &Condition::visible("#ghost"), timeout)
            .await;
        let elapsed = started.elapsed();

        let last_seen = match outcome {
            WaitOutcome::TimedOut { last_seen } => last_seen,
            other => panic!("expected timeout, got {:?}", other),
        };
        assert!(matches!(last_seen, Some(Error::ElementAbsent(_))));

        // Bounded overshoot: done within [timeout, timeout + interval),
        // with scheduling slack on top.
        assert!(elapsed >= timeout);
        assert!(elapsed < timeout + interval + Duration::from_millis(80));
        assert!(client.eval_count() >= 3);
    }

    #[tokio::test]
    async fn test_zero_timeout_evaluates_exactly_once() {
        let (session, client) = ready_session();
        client.set_default_eval(status_probe("absent")).await;

        let poller = ConditionPoller::new(Duration::from_millis(500));
        let started = std::time::Instant::now();
        let outcome = poller
            .wait(&session, &Condition::present("#late"), Duration::ZERO)
            .await;

        assert!(matches!(outcome, WaitOutcome::TimedOut { .. }));
        assert_eq!(client.eval_count(), 1);
        assert!(started.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_transient_errors_are_polled_through() {
        let (session, client) = ready_session();
        client
            .push_evals([
                status_probe("absent"),
                status_probe("hidden"),
                satisfied_probe(),
            ])
            .await;

        let poller = ConditionPoller::new(Duration::from_millis(10));
        let outcome = poller
            .wait(
                &session,
                &Condition::visible("#email"),
                Duration::from_secs(5),
            )
            .await;

        assert!(outcome.is_satisfied());
        assert_eq!(client.eval_count(), 3);
    }

    #[tokio::test]
    async fn test_stale_element_mid_poll_does_not_abort() {
        let (session, client) = ready_session();
        client
            .push_evals([status_probe("detached"), satisfied_probe()])
            .await;

        let poller = ConditionPoller::new(Duration::from_millis(10));
        let outcome = poller
            .wait(
                &session,
                &Condition::clickable("#submit"),
                Duration::from_secs(5),
            )
            .await;

        assert!(outcome.is_satisfied());
    }

    #[tokio::test]
    async fn test_dead_session_aborts_immediately() {
        let (session, client) = ready_session();
        client.set_default_eval(status_probe("absent")).await;
        client.kill();

        let poller = ConditionPoller::new(Duration::from_millis(10));
        let started = std::time::Instant::now();
        let outcome = poller
            .wait(
                &session,
                &Condition::visible("#email"),
                Duration::from_secs(30),
            )
            .await;

        // No polling through a dead transport: immediate fatal outcome
        match outcome {
            WaitOutcome::Fatal(Error::SessionUnavailable(_)) => {}
            other => panic!("expected fatal session error, got {:?}", other),
        }
        assert!(started.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_invalid_selector_aborts_immediately() {
        let (session, client) = ready_session();
        client
            .push_eval(ScriptedEval::Value(serde_json::json!({
                "status": "invalid-selector",
                "message": "SyntaxError"
            })))
            .await;

        let poller = ConditionPoller::new(Duration::from_millis(10));
        let outcome = poller
            .wait(
                &session,
                &Condition::present("li:bad("),
                Duration::from_secs(5),
            )
            .await;

        assert!(matches!(outcome, WaitOutcome::Fatal(Error::InvalidSelector(_))));
        assert_eq!(client.eval_count(), 1);
    }

    #[tokio::test]
    async fn test_absence_wait_over_disappearing_indicator() {
        let (session, client) = ready_session();
        client
            .push_evals([
                status_probe("lingering"),
                status_probe("lingering"),
                status_probe("hidden"),
            ])
            .await;

        let poller = ConditionPoller::new(Duration::from_millis(10));
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
    async fn test_zero_interval_is_clamped() {
        let poller = ConditionPoller::new(Duration::ZERO);
        assert_eq!(poller.poll_interval(), MIN_POLL_INTERVAL);
    }

    #[tokio::test]
    async fn test_timeout_result_carries_last_observation() {
        let (session, client) = ready_session();
        client.set_default_eval(status_probe("hidden")).await;

        let poller = ConditionPoller::new(Duration::from_millis(10));
        let condition = Condition::visible("#banner");
        let budget = Duration::from_millis(30);

        let err = poller
            .wait(&session, &condition, budget)
            .await
            .into_result(&condition, budget)
            .unwrap_err();

        match err {
            Error::ConditionTimeout {
                condition,
                selector,
                budget_ms,
                last_seen,
            } => {
                assert_eq!(condition, "visible");
                assert_eq!(selector, "#banner");
                assert_eq!(budget_ms, 30);
                assert!(matches!(*last_seen.unwrap(), Error::ElementHidden(_)));
            }
            other => panic!("expected condition timeout, got {:?}", other),
        }
    }
}
