//! Session implementation
//!
//! One live browser automation connection, exclusively owned by the worker
//! that created it.

use chrono::{DateTime, Utc};
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cdp::launcher::LaunchedBrowser;
use crate::cdp::traits::{CdpClient, EvaluationResult, NavigationResult, ScreenshotFormat};
use crate::config::BrowserKind;
use crate::session::traits::{SessionState, SessionTransport};
use crate::{Error, Result};

/// One live browser session
///
/// The state machine only moves forward: `Initializing → Ready → Closing →
/// Closed`. Closing is safe to race with an in-flight poll on the same
/// session; the poll then observes a session-unavailable error instead of
/// hanging on a dead transport.
#[derive(Debug)]
pub struct Session {
    id: String,
    worker_id: String,
    kind: BrowserKind,
    headless: bool,
    created_at: DateTime<Utc>,
    state: RwLock<SessionState>,
    client: Arc<dyn CdpClient>,
    browser: Mutex<Option<LaunchedBrowser>>,
}

impl Session {
    /// Wrap a freshly opened transport. The session starts in
    /// `Initializing`; the registry advances it to `Ready` once
    /// capabilities are applied.
    pub fn new(
        worker_id: &str,
        kind: BrowserKind,
        headless: bool,
        transport: SessionTransport,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            worker_id: worker_id.to_string(),
            kind,
            headless,
            created_at: Utc::now(),
            state: RwLock::new(SessionState::Initializing),
            client: transport.client,
            browser: Mutex::new(transport.browser),
        }
    }

    /// Unique session ID
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Owning worker ID
    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Browser engine behind this session
    pub fn kind(&self) -> BrowserKind {
        self.kind
    }

    /// Whether the browser runs headless
    pub fn is_headless(&self) -> bool {
        self.headless
    }

    /// Creation timestamp
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Current liveness state
    pub fn state(&self) -> SessionState {
        *self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Whether the session can serve probes and actions
    pub fn is_ready(&self) -> bool {
        self.state() == SessionState::Ready && self.client.is_alive()
    }

    /// Advance the state machine one forward step.
    pub(crate) fn advance(&self, next: SessionState) -> Result<()> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if !state.can_advance_to(next) {
            return Err(Error::internal(format!(
                "Illegal session transition {} -> {}",
                *state, next
            )));
        }
        debug!("Session {} {} -> {}", self.id, *state, next);
        *state = next;
        Ok(())
    }

    fn ensure_ready(&self) -> Result<()> {
        let state = self.state();
        if state != SessionState::Ready {
            return Err(Error::session_unavailable(format!(
                "session {} is {}",
                self.id, state
            )));
        }
        if !self.client.is_alive() {
            return Err(Error::session_unavailable(format!(
                "session {} transport is dead",
                self.id
            )));
        }
        Ok(())
    }

    /// Transport errors mean the session is gone, not that the page
    /// misbehaved; fold them into the session-unavailable kind so callers
    /// never see raw transport errors.
    fn map_transport_error(&self, err: Error) -> Error {
        match err {
            Error::WebSocket(msg) => {
                Error::session_unavailable(format!("session {}: {}", self.id, msg))
            }
            other => other,
        }
    }

    /// Evaluate a probe script against the current DOM
    pub async fn probe(&self, script: &str) -> Result<EvaluationResult> {
        self.ensure_ready()?;
        self.client
            .evaluate(script, false)
            .await
            .map_err(|e| self.map_transport_error(e))
    }

    /// Call a raw protocol method
    pub async fn call(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
        self.ensure_ready()?;
        self.client
            .call_method(method, params)
            .await
            .map_err(|e| self.map_transport_error(e))
    }

    /// Navigate the page
    pub async fn navigate(&self, url: &str) -> Result<NavigationResult> {
        self.ensure_ready()?;
        self.client
            .navigate(url)
            .await
            .map_err(|e| self.map_transport_error(e))
    }

    /// Capture a PNG screenshot of the current page
    pub async fn screenshot(&self) -> Result<Vec<u8>> {
        self.ensure_ready()?;
        self.client
            .screenshot(ScreenshotFormat::Png)
            .await
            .map_err(|e| self.map_transport_error(e))
    }

    /// Close the session: `Ready → Closing → Closed`, releasing native
    /// resources. Idempotent; closing an already closing or closed session
    /// is a no-op.
    pub async fn close(&self) -> Result<()> {
        {
            let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
            match *state {
                SessionState::Closing | SessionState::Closed => return Ok(()),
                current => {
                    if !current.can_advance_to(SessionState::Closing) {
                        return Ok(());
                    }
                    *state = SessionState::Closing;
                }
            }
        }

        debug!("Closing session {} (worker {})", self.id, self.worker_id);

        let mut failure: Option<Error> = None;

        if let Err(e) = self.client.close().await {
            warn!("Session {} transport close failed: {}", self.id, e);
            failure = Some(e);
        }

        if let Some(browser) = self.browser.lock().await.take() {
            if let Err(e) = browser.shutdown().await {
                warn!("Session {} browser shutdown failed: {}", self.id, e);
                failure.get_or_insert(e);
            }
        }

        let _ = self.advance(SessionState::Closed);

        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
