//! Session layer traits and option types
//!
//! This module defines the backend seam between the registry and whatever
//! actually produces a connected browser: the real launcher in production,
//! a scripted mock in tests.

use async_trait::async_trait;
use std::sync::Arc;

use crate::cdp::traits::CdpClient;
use crate::cdp::launcher::LaunchedBrowser;
use crate::config::{BrowserKind, Config};

/// Liveness state of a session. Transitions are forward-only; `Closed` is
/// terminal and a closed session handle is discarded, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Initializing,
    Ready,
    Closing,
    Closed,
}

impl SessionState {
    /// Whether `next` is a legal forward step from this state
    pub fn can_advance_to(self, next: SessionState) -> bool {
        matches!(
            (self, next),
            (SessionState::Initializing, SessionState::Ready)
                | (SessionState::Initializing, SessionState::Closing)
                | (SessionState::Ready, SessionState::Closing)
                | (SessionState::Closing, SessionState::Closed)
        )
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Initializing => write!(f, "initializing"),
            SessionState::Ready => write!(f, "ready"),
            SessionState::Closing => write!(f, "closing"),
            SessionState::Closed => write!(f, "closed"),
        }
    }
}

/// What a backend hands over for one opened browser
#[derive(Debug)]
pub struct SessionTransport {
    /// Connected client for the page target
    pub client: Arc<dyn CdpClient>,
    /// Owned browser process, absent for attached or mocked transports
    pub browser: Option<LaunchedBrowser>,
}

/// Backend that produces connected browser transports
///
/// One call per session; the registry guarantees at most one in-flight call
/// per worker. A failed `open` must leave nothing behind.
#[async_trait]
pub trait SessionBackend: Send + Sync + std::fmt::Debug {
    async fn open(
        &self,
        worker_id: &str,
        kind: BrowserKind,
        config: &Config,
    ) -> Result<SessionTransport, crate::Error>;
}
