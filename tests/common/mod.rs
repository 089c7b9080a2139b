//! Common test utilities
//!
//! Shared harness for integration tests: a registry over the scripted
//! mock backend, an executor reporting into a recording sink, and the
//! probe observations the mock DOM can be scripted with.
//!
//! Not every test binary touches every helper.
#![allow(dead_code)]

use std::sync::Arc;

use signup_probe::action::ActionExecutor;
use signup_probe::cdp::mock::ScriptedEval;
use signup_probe::config::Config;
use signup_probe::report::{EventSink, RecordingSink};
use signup_probe::session::{MockSessionBackend, SessionBackend, SessionRegistry};

/// Configuration with test-friendly budgets
pub fn fast_config() -> Config {
    Config {
        poll_interval_ms: 10,
        retry_attempts: 3,
        retry_delay_ms: 2,
        presence_timeout_secs: 1,
        visibility_timeout_secs: 1,
        clickable_timeout_secs: 1,
        page_load_timeout_secs: 1,
        screenshot_on_failure: false,
        ..Default::default()
    }
}

/// Full harness over the mock backend
pub struct Harness {
    pub registry: Arc<SessionRegistry>,
    pub backend: Arc<MockSessionBackend>,
    pub executor: ActionExecutor,
    pub sink: Arc<RecordingSink>,
}

/// Build a harness with the given configuration
pub fn harness_with(config: Config) -> Harness {
    let backend = Arc::new(MockSessionBackend::new());
    let registry = Arc::new(SessionRegistry::new(
        Arc::clone(&backend) as Arc<dyn SessionBackend>,
        config.clone(),
    ));
    let sink = Arc::new(RecordingSink::new());
    let executor = ActionExecutor::new(&config, Arc::clone(&sink) as Arc<dyn EventSink>);

    Harness {
        registry,
        backend,
        executor,
        sink,
    }
}

/// Build a harness with the fast defaults
pub fn harness() -> Harness {
    harness_with(fast_config())
}

/// Probe observation: element satisfied the condition
pub fn element() -> ScriptedEval {
    ScriptedEval::Value(serde_json::json!({
        "status": "satisfied",
        "tag": "input",
        "rect": { "x": 10.0, "y": 10.0, "width": 100.0, "height": 24.0 }
    }))
}

/// Probe observation: condition satisfied without an element (page-ready,
/// absence)
pub fn satisfied() -> ScriptedEval {
    ScriptedEval::Value(serde_json::json!({ "status": "satisfied" }))
}

/// Action observation: execution precheck passed at a click point
pub fn action_ok() -> ScriptedEval {
    ScriptedEval::Value(serde_json::json!({ "status": "ok", "x": 60.0, "y": 22.0 }))
}

/// Arbitrary probe status
pub fn status(name: &str) -> ScriptedEval {
    ScriptedEval::Value(serde_json::json!({ "status": name }))
}

/// Action observation carrying read-back text
pub fn text_ok(text: &str) -> ScriptedEval {
    ScriptedEval::Value(serde_json::json!({ "status": "ok", "text": text }))
}
