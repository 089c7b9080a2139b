//! Action executor implementation
//!
//! Performs one logical UI action with built-in readiness waiting and
//! bounded retry, so page-object code never handles synchronization
//! itself. Every attempt re-resolves the element fresh on the page; a
//! handle from a previous attempt is never trusted.

use rand::Rng;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::action::retry::RetryPolicy;
use crate::cdp::traits::EvaluationResult;
use crate::config::Config;
use crate::poll::condition::{escape_selector, Condition};
use crate::poll::poller::ConditionPoller;
use crate::report::{EventSink, ProbeEvent};
use crate::session::Session;
use crate::{Error, Result};

/// One logical UI action
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Native click at the element center
    Click,
    /// Click a checkbox or switch
    Toggle,
    /// Replace the element's value by typing `text`
    TypeText { text: String },
    /// Read the element's value or text content
    ReadText,
    /// Read one attribute
    ReadAttribute { name: String },
}

impl Action {
    /// Stable name for logs and events
    pub fn name(&self) -> &'static str {
        match self {
            Action::Click => "click",
            Action::Toggle => "toggle",
            Action::TypeText { .. } => "type",
            Action::ReadText => "read-text",
            Action::ReadAttribute { .. } => "read-attribute",
        }
    }

    /// Readiness condition this action waits on before touching the
    /// element: interaction needs clickability, typing and reading need
    /// visibility.
    pub fn readiness(&self, selector: &str) -> Condition {
        match self {
            Action::Click | Action::Toggle => Condition::clickable(selector),
            Action::TypeText { .. } | Action::ReadText | Action::ReadAttribute { .. } => {
                Condition::visible(selector)
            }
        }
    }
}

/// What an action produced
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    /// The action ran; nothing to read back
    Done,
    /// Text read from the element
    Text(String),
    /// Attribute value, absent when the attribute is not set
    Attribute(Option<String>),
}

/// Per-condition wait budgets, resolved once from configuration
#[derive(Debug, Clone, Copy)]
struct WaitBudgets {
    presence: Duration,
    visibility: Duration,
    clickable: Duration,
    page_load: Duration,
}

impl WaitBudgets {
    fn from_config(config: &Config) -> Self {
        Self {
            presence: Duration::from_secs(config.presence_timeout_secs),
            visibility: Duration::from_secs(config.visibility_timeout_secs),
            clickable: Duration::from_secs(config.clickable_timeout_secs),
            page_load: Duration::from_secs(config.page_load_timeout_secs),
        }
    }

    fn for_condition(&self, condition: &Condition) -> Duration {
        match condition {
            Condition::Present { .. } => self.presence,
            Condition::Visible { .. } | Condition::Absent { .. } => self.visibility,
            Condition::Clickable { .. } => self.clickable,
            Condition::PageReady => self.page_load,
        }
    }
}

/// Typing cadence bounds in milliseconds
const TYPE_DELAY_MIN_MS: u64 = 15;
const TYPE_DELAY_MAX_MS: u64 = 40;

/// Action executor
pub struct ActionExecutor {
    poller: ConditionPoller,
    policy: RetryPolicy,
    budgets: WaitBudgets,
    sink: Arc<dyn EventSink>,
    screenshot_on_failure: bool,
}

impl ActionExecutor {
    /// Build an executor from the run configuration
    pub fn new(config: &Config, sink: Arc<dyn EventSink>) -> Self {
        Self {
            poller: ConditionPoller::from_config(config),
            policy: RetryPolicy::from_config(config),
            budgets: WaitBudgets::from_config(config),
            sink,
            screenshot_on_failure: config.screenshot_on_failure,
        }
    }

    /// Replace the retry policy
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Navigate and wait for the document-level ready signal before any
    /// element condition gets evaluated.
    #[instrument(skip(self, session))]
    pub async fn goto(&self, session: &Session, url: &str) -> Result<()> {
        session.navigate(url).await?;
        self.wait_until(session, &Condition::PageReady).await?;
        Ok(())
    }

    /// Wait for an arbitrary condition with its configured budget
    pub async fn wait_until(
        &self,
        session: &Session,
        condition: &Condition,
    ) -> Result<Option<crate::poll::condition::ElementHandle>> {
        let budget = self.budgets.for_condition(condition);

        self.sink.record(&ProbeEvent::WaitStarted {
            condition: condition.name().to_string(),
            selector: condition.selector().to_string(),
            budget_ms: budget.as_millis() as u64,
        });

        let started = std::time::Instant::now();
        let outcome = self.poller.wait(session, condition, budget).await;

        match &outcome {
            crate::poll::poller::WaitOutcome::Satisfied(_) => {
                self.sink.record(&ProbeEvent::WaitSatisfied {
                    condition: condition.name().to_string(),
                    selector: condition.selector().to_string(),
                    elapsed_ms: started.elapsed().as_millis() as u64,
                });
            }
            crate::poll::poller::WaitOutcome::TimedOut { last_seen } => {
                self.sink.record(&ProbeEvent::WaitTimedOut {
                    condition: condition.name().to_string(),
                    selector: condition.selector().to_string(),
                    budget_ms: budget.as_millis() as u64,
                    last_seen: last_seen.as_ref().map(|e| e.to_string()),
                });
            }
            crate::poll::poller::WaitOutcome::Fatal(_) => {}
        }

        outcome.into_result(condition, budget)
    }

    /// Perform one logical action against the element behind `selector`.
    ///
    /// Waits for the action's readiness condition, executes, and retries
    /// through transient mid-action failures up to the policy budget.
    /// Attempt counting includes the first try. A wait that times out or
    /// dies stops the whole operation; the action is never attempted
    /// against an element that did not become ready.
    #[instrument(skip(self, session, action), fields(action = action.name()))]
    pub async fn perform(
        &self,
        session: &Session,
        selector: &str,
        action: &Action,
    ) -> Result<ActionOutcome> {
        let condition = action.readiness(selector);
        let mut fallback_spent = false;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            self.sink.record(&ProbeEvent::ActionAttempt {
                action: action.name().to_string(),
                selector: selector.to_string(),
                attempt,
                max_attempts: self.policy.max_attempts(),
            });

            if let Err(e) = self.wait_until(session, &condition).await {
                return self.give_up(session, selector, action, e).await;
            }

            match self
                .execute(session, selector, action, &mut fallback_spent)
                .await
            {
                Ok(outcome) => {
                    self.sink.record(&ProbeEvent::ActionSucceeded {
                        action: action.name().to_string(),
                        selector: selector.to_string(),
                        attempts: attempt,
                    });
                    return Ok(outcome);
                }
                Err(e) if self.policy.permits_retry(&e, attempt) => {
                    let delay = self.policy.delay_after(attempt);
                    self.sink.record(&ProbeEvent::RetryScheduled {
                        action: action.name().to_string(),
                        selector: selector.to_string(),
                        attempt,
                        delay_ms: delay.as_millis() as u64,
                        cause: e.to_string(),
                    });
                    debug!(
                        "{} {} attempt {} failed transiently ({}), retrying",
                        action.name(),
                        selector,
                        attempt,
                        e
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) if e.is_transient() => {
                    // Retry budget exhausted on a transient failure
                    let exhausted = Error::RetryExhausted {
                        attempts: attempt,
                        last: Box::new(e),
                    };
                    return self.give_up(session, selector, action, exhausted).await;
                }
                Err(e) => return self.give_up(session, selector, action, e).await,
            }
        }
    }

    /// Convenience: click
    pub async fn click(&self, session: &Session, selector: &str) -> Result<()> {
        self.perform(session, selector, &Action::Click).await?;
        Ok(())
    }

    /// Convenience: toggle a checkbox
    pub async fn toggle(&self, session: &Session, selector: &str) -> Result<()> {
        self.perform(session, selector, &Action::Toggle).await?;
        Ok(())
    }

    /// Convenience: type text
    pub async fn type_text(&self, session: &Session, selector: &str, text: &str) -> Result<()> {
        self.perform(
            session,
            selector,
            &Action::TypeText {
                text: text.to_string(),
            },
        )
        .await?;
        Ok(())
    }

    /// Convenience: read the element's text
    pub async fn read_text(&self, session: &Session, selector: &str) -> Result<String> {
        match self.perform(session, selector, &Action::ReadText).await? {
            ActionOutcome::Text(text) => Ok(text),
            other => Err(Error::internal(format!(
                "read-text produced unexpected outcome: {:?}",
                other
            ))),
        }
    }

    /// Convenience: read one attribute
    pub async fn read_attribute(
        &self,
        session: &Session,
        selector: &str,
        name: &str,
    ) -> Result<Option<String>> {
        match self
            .perform(
                session,
                selector,
                &Action::ReadAttribute {
                    name: name.to_string(),
                },
            )
            .await?
        {
            ActionOutcome::Attribute(value) => Ok(value),
            other => Err(Error::internal(format!(
                "read-attribute produced unexpected outcome: {:?}",
                other
            ))),
        }
    }

    /// Execute one attempt of the action. The element is re-resolved on the
    /// page here, regardless of what the readiness wait observed.
    async fn execute(
        &self,
        session: &Session,
        selector: &str,
        action: &Action,
        fallback_spent: &mut bool,
    ) -> Result<ActionOutcome> {
        match action {
            Action::Click | Action::Toggle => {
                match self.native_click(session, selector).await {
                    Err(Error::NotInteractable(_)) if !*fallback_spent => {
                        // Occluded after a clean clickability wait. One
                        // dispatch-level fallback, outside the retry budget.
                        *fallback_spent = true;
                        self.sink.record(&ProbeEvent::FallbackClick {
                            selector: selector.to_string(),
                        });
                        self.fallback_click(session, selector).await?;
                        Ok(ActionOutcome::Done)
                    }
                    other => other.map(|_| ActionOutcome::Done),
                }
            }
            Action::TypeText { text } => {
                self.type_into(session, selector, text).await?;
                Ok(ActionOutcome::Done)
            }
            Action::ReadText => {
                let observed = self
                    .observe(session, &read_text_script(selector))
                    .await?;
                Ok(ActionOutcome::Text(observed.text.unwrap_or_default()))
            }
            Action::ReadAttribute { name } => {
                let observed = self
                    .observe(session, &read_attribute_script(selector, name))
                    .await?;
                Ok(ActionOutcome::Attribute(observed.value))
            }
        }
    }

    /// Standard click: re-resolve, hit-test the center, then dispatch real
    /// mouse events there.
    async fn native_click(&self, session: &Session, selector: &str) -> Result<()> {
        let observed = self
            .observe(session, &click_precheck_script(selector))
            .await?;

        let (x, y) = match (observed.x, observed.y) {
            (Some(x), Some(y)) => (x, y),
            _ => {
                return Err(Error::internal(format!(
                    "click precheck returned no coordinates for {}",
                    selector
                )))
            }
        };

        for event_type in ["mousePressed", "mouseReleased"] {
            session
                .call(
                    "Input.dispatchMouseEvent",
                    serde_json::json!({
                        "type": event_type,
                        "x": x,
                        "y": y,
                        "button": "left",
                        "clickCount": 1,
                    }),
                )
                .await?;
        }

        Ok(())
    }

    /// Dispatch-level click that cannot be blocked by overlapping chrome
    async fn fallback_click(&self, session: &Session, selector: &str) -> Result<()> {
        self.observe(session, &fallback_click_script(selector))
            .await?;
        Ok(())
    }

    /// Focus, clear, then type character by character with a small jitter
    /// between keystrokes.
    async fn type_into(&self, session: &Session, selector: &str, text: &str) -> Result<()> {
        self.observe(session, &type_precheck_script(selector))
            .await?;

        for ch in text.chars() {
            session
                .call(
                    "Input.insertText",
                    serde_json::json!({ "text": ch.to_string() }),
                )
                .await?;

            let delay = rand::thread_rng().gen_range(TYPE_DELAY_MIN_MS..=TYPE_DELAY_MAX_MS);
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        Ok(())
    }

    /// Run an execution script and classify the observation it reports
    async fn observe(&self, session: &Session, script: &str) -> Result<ActionObservation> {
        let result = session.probe(script).await?;
        ActionObservation::parse(result)
    }

    /// Final failure path: report, best-effort screenshot, surface the
    /// classified error.
    async fn give_up(
        &self,
        session: &Session,
        selector: &str,
        action: &Action,
        error: Error,
    ) -> Result<ActionOutcome> {
        self.sink.record(&ProbeEvent::ActionFailed {
            action: action.name().to_string(),
            selector: selector.to_string(),
            error: error.to_string(),
        });

        if self.screenshot_on_failure {
            let title = format!("{}-{}", action.name(), selector);
            match session.screenshot().await {
                Ok(png) => self.sink.capture_screenshot(&title, &png),
                Err(e) => warn!("Failure screenshot not captured: {}", e),
            }
        }

        Err(error)
    }
}

impl std::fmt::Debug for ActionExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionExecutor")
            .field("policy", &self.policy)
            .field("budgets", &self.budgets)
            .finish()
    }
}

/// Observation reported by an execution script
#[derive(Debug, Deserialize)]
struct ActionObservation {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    x: Option<f64>,
    #[serde(default)]
    y: Option<f64>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    value: Option<String>,
}

impl ActionObservation {
    fn parse(result: EvaluationResult) -> Result<Self> {
        let observed: ActionObservation = match result {
            EvaluationResult::Object(value) => serde_json::from_value(value)
                .map_err(|e| Error::cdp(format!("Malformed action result: {}", e)))?,
            other => {
                return Err(Error::cdp(format!(
                    "Action script returned a non-object result: {:?}",
                    other
                )))
            }
        };

        let status = observed.status.clone();
        match status.as_str() {
            "ok" => Ok(observed),
            "absent" => Err(Error::element_absent(observed.describe())),
            "detached" => Err(Error::element_detached(observed.describe())),
            "hidden" => Err(Error::element_hidden(observed.describe())),
            "disabled" => Err(Error::element_disabled(observed.describe())),
            "occluded" => Err(Error::not_interactable(observed.describe())),
            "invalid-selector" => Err(Error::invalid_selector(observed.describe())),
            other => Err(Error::cdp(format!("Malformed action status '{}'", other))),
        }
    }

    fn describe(&self) -> String {
        self.message.clone().unwrap_or_else(|| "element".to_string())
    }
}

fn click_precheck_script(selector: &str) -> String {
    let escaped = escape_selector(selector);
    format!(
        r#"
        (() => {{
            let el;
            try {{
                el = document.querySelector('{escaped}');
            }} catch (e) {{
                return {{ status: 'invalid-selector', message: String(e) }};
            }}
            if (!el) return {{ status: 'absent', message: '{escaped}' }};
            if (!el.isConnected) return {{ status: 'detached', message: '{escaped}' }};
            const rect = el.getBoundingClientRect();
            if (rect.width === 0 || rect.height === 0) return {{ status: 'hidden', message: '{escaped}' }};
            const x = rect.x + rect.width / 2;
            const y = rect.y + rect.height / 2;
            const hit = document.elementFromPoint(x, y);
            if (!hit || (hit !== el && !el.contains(hit) && !hit.contains(el))) {{
                return {{ status: 'occluded', message: '{escaped}' }};
            }}
            return {{ status: 'ok', x: x, y: y }};
        }})()
        "#
    )
}

fn fallback_click_script(selector: &str) -> String {
    let escaped = escape_selector(selector);
    format!(
        r#"
        (() => {{
            const el = document.querySelector('{escaped}');
            if (!el) return {{ status: 'absent', message: '{escaped}' }};
            if (!el.isConnected) return {{ status: 'detached', message: '{escaped}' }};
            el.click();
            return {{ status: 'ok' }};
        }})()
        "#
    )
}

fn type_precheck_script(selector: &str) -> String {
    let escaped = escape_selector(selector);
    format!(
        r#"
        (() => {{
            const el = document.querySelector('{escaped}');
            if (!el) return {{ status: 'absent', message: '{escaped}' }};
            if (!el.isConnected) return {{ status: 'detached', message: '{escaped}' }};
            el.focus();
            if ('value' in el && el.value !== '') {{
                el.value = '';
                el.dispatchEvent(new Event('input', {{ bubbles: true }}));
            }}
            return {{ status: 'ok' }};
        }})()
        "#
    )
}

fn read_text_script(selector: &str) -> String {
    let escaped = escape_selector(selector);
    format!(
        r#"
        (() => {{
            const el = document.querySelector('{escaped}');
            if (!el) return {{ status: 'absent', message: '{escaped}' }};
            if (!el.isConnected) return {{ status: 'detached', message: '{escaped}' }};
            const text = ('value' in el && el.value !== '') ? el.value : (el.textContent || '').trim();
            return {{ status: 'ok', text: text }};
        }})()
        "#
    )
}

fn read_attribute_script(selector: &str, name: &str) -> String {
    let escaped = escape_selector(selector);
    let attr = escape_selector(name);
    format!(
        r#"
        (() => {{
            const el = document.querySelector('{escaped}');
            if (!el) return {{ status: 'absent', message: '{escaped}' }};
            if (!el.isConnected) return {{ status: 'detached', message: '{escaped}' }};
            const value = el.getAttribute('{attr}');
            return value === null ? {{ status: 'ok' }} : {{ status: 'ok', value: value }};
        }})()
        "#
    )
}
