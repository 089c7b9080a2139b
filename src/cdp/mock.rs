//! Mock CDP implementation for testing
//!
//! A scripted stand-in for the WebSocket transport. Tests enqueue the
//! observations each successive `evaluate` call should produce, so poll
//! loops and retry budgets can be exercised deterministically without a
//! browser. When the queue runs dry the configured default observation
//! repeats.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::Mutex;

use crate::cdp::traits::*;
use crate::Error;

/// One scripted reply for an `evaluate` call
#[derive(Debug, Clone)]
pub enum ScriptedEval {
    /// Evaluation succeeds with this JSON value
    Value(serde_json::Value),
    /// Page-side script raises (maps to a fatal script error)
    ScriptError(String),
    /// Transport is gone (maps to a fatal connection error)
    ConnectionLost,
}

impl ScriptedEval {
    fn into_result(self) -> Result<EvaluationResult, Error> {
        match self {
            ScriptedEval::Value(v) => Ok(match v {
                serde_json::Value::String(s) => EvaluationResult::String(s),
                serde_json::Value::Number(n) => {
                    EvaluationResult::Number(n.as_f64().unwrap_or(0.0))
                }
                serde_json::Value::Bool(b) => EvaluationResult::Bool(b),
                serde_json::Value::Null => EvaluationResult::Null,
                other => EvaluationResult::Object(other),
            }),
            ScriptedEval::ScriptError(msg) => Err(Error::script(msg)),
            ScriptedEval::ConnectionLost => Err(Error::websocket("connection closed")),
        }
    }
}

/// Mock CDP client with scripted evaluation results
#[derive(Debug)]
pub struct MockCdpClient {
    alive: AtomicBool,
    fail_close: AtomicBool,
    eval_queue: Mutex<VecDeque<ScriptedEval>>,
    default_eval: Mutex<ScriptedEval>,
    eval_count: AtomicU64,
    evaluated_scripts: Mutex<Vec<String>>,
    called_methods: Mutex<Vec<String>>,
    navigations: Mutex<Vec<String>>,
}

impl MockCdpClient {
    /// Create a new mock client whose evaluations return null by default
    pub fn new() -> Self {
        Self {
            alive: AtomicBool::new(true),
            fail_close: AtomicBool::new(false),
            eval_queue: Mutex::new(VecDeque::new()),
            default_eval: Mutex::new(ScriptedEval::Value(serde_json::Value::Null)),
            eval_count: AtomicU64::new(0),
            evaluated_scripts: Mutex::new(Vec::new()),
            called_methods: Mutex::new(Vec::new()),
            navigations: Mutex::new(Vec::new()),
        }
    }

    /// Enqueue the reply for the next `evaluate` call
    pub async fn push_eval(&self, step: ScriptedEval) {
        self.eval_queue.lock().await.push_back(step);
    }

    /// Enqueue several replies at once, in call order
    pub async fn push_evals<I: IntoIterator<Item = ScriptedEval>>(&self, steps: I) {
        let mut queue = self.eval_queue.lock().await;
        queue.extend(steps);
    }

    /// Reply produced once the queue is empty
    pub async fn set_default_eval(&self, step: ScriptedEval) {
        *self.default_eval.lock().await = step;
    }

    /// Number of `evaluate` calls served so far
    pub fn eval_count(&self) -> u64 {
        self.eval_count.load(Ordering::SeqCst)
    }

    /// Scripts passed to `evaluate`, in call order
    pub async fn evaluated_scripts(&self) -> Vec<String> {
        self.evaluated_scripts.lock().await.clone()
    }

    /// Raw methods passed to `call_method`, in call order
    pub async fn called_methods(&self) -> Vec<String> {
        self.called_methods.lock().await.clone()
    }

    /// URLs navigated to, in call order
    pub async fn navigations(&self) -> Vec<String> {
        self.navigations.lock().await.clone()
    }

    /// Drop the transport out from under the caller
    pub fn kill(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }

    /// Make the next `close` call report a native close failure
    pub fn fail_close(&self) {
        self.fail_close.store(true, Ordering::SeqCst);
    }

    fn check_alive(&self) -> Result<(), Error> {
        if self.alive.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::websocket("Connection is not active"))
        }
    }
}

impl Default for MockCdpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CdpClient for MockCdpClient {
    async fn navigate(&self, url: &str) -> Result<NavigationResult, Error> {
        self.check_alive()?;
        self.navigations.lock().await.push(url.to_string());
        Ok(NavigationResult {
            url: url.to_string(),
            loader_id: Some(uuid::Uuid::new_v4().to_string()),
        })
    }

    async fn evaluate(&self, script: &str, _await_promise: bool) -> Result<EvaluationResult, Error> {
        self.check_alive()?;

        self.eval_count.fetch_add(1, Ordering::SeqCst);
        self.evaluated_scripts.lock().await.push(script.to_string());

        let step = match self.eval_queue.lock().await.pop_front() {
            Some(step) => step,
            None => self.default_eval.lock().await.clone(),
        };

        step.into_result()
    }

    async fn screenshot(&self, format: ScreenshotFormat) -> Result<Vec<u8>, Error> {
        self.check_alive()?;

        // Minimal header bytes are enough for tests
        Ok(match format {
            ScreenshotFormat::Png => vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A],
            ScreenshotFormat::Jpeg(_) => vec![0xFF, 0xD8, 0xFF, 0xE0],
        })
    }

    async fn enable_domain(&self, _domain: &str) -> Result<(), Error> {
        self.check_alive()
    }

    async fn call_method(
        &self,
        method: &str,
        _params: serde_json::Value,
    ) -> Result<serde_json::Value, Error> {
        self.check_alive()?;
        self.called_methods.lock().await.push(method.to_string());
        Ok(serde_json::json!({}))
    }

    async fn close(&self) -> Result<(), Error> {
        self.alive.store(false, Ordering::SeqCst);
        if self.fail_close.load(Ordering::SeqCst) {
            return Err(Error::websocket("native close failed"));
        }
        Ok(())
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}
