//! Mock session backend for testing
//!
//! Opens scripted mock transports instead of launching browsers. Tests can
//! pre-register a client per worker to script its DOM observations, or let
//! the backend hand out fresh ones.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::cdp::mock::MockCdpClient;
use crate::config::{BrowserKind, Config};
use crate::session::traits::{SessionBackend, SessionTransport};
use crate::Error;

/// Mock session backend
#[derive(Debug, Default)]
pub struct MockSessionBackend {
    /// Clients staged for a worker's next `open`
    preloaded: Mutex<HashMap<String, Arc<MockCdpClient>>>,
    /// Last client handed out per worker
    clients: Mutex<HashMap<String, Arc<MockCdpClient>>>,
    /// Number of `open` calls served
    opens: AtomicUsize,
    /// When set, the next `open` fails like a browser that would not start
    fail_next: AtomicBool,
}

impl MockSessionBackend {
    /// Create a new mock backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-register the client a worker's next session will be built on
    pub fn preload(&self, worker_id: &str, client: Arc<MockCdpClient>) {
        self.preloaded
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(worker_id.to_string(), client);
    }

    /// Client behind a worker's session, if one was opened
    pub fn client_for(&self, worker_id: &str) -> Option<Arc<MockCdpClient>> {
        self.clients
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(worker_id)
            .cloned()
    }

    /// Number of sessions opened so far
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Make the next `open` fail with a session start error
    pub fn fail_next_open(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl SessionBackend for MockSessionBackend {
    async fn open(
        &self,
        worker_id: &str,
        _kind: BrowserKind,
        _config: &Config,
    ) -> Result<SessionTransport, Error> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(Error::session_start("mock browser refused to start"));
        }

        self.opens.fetch_add(1, Ordering::SeqCst);

        // A staged client is consumed; otherwise every open gets a fresh
        // transport, like a freshly launched browser would be.
        let client = self
            .preloaded
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(worker_id)
            .unwrap_or_else(|| Arc::new(MockCdpClient::new()));

        self.clients
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(worker_id.to_string(), Arc::clone(&client));

        Ok(SessionTransport {
            client,
            browser: None,
        })
    }
}
