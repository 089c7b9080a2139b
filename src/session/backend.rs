//! Production session backend
//!
//! Launches one browser process per worker, each on its own DevTools port,
//! or attaches every worker to a shared external endpoint when one is
//! configured.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU16, Ordering};

use crate::cdp::launcher::{LaunchProfile, LaunchedBrowser};
use crate::config::{BrowserKind, Config};
use crate::session::traits::{SessionBackend, SessionTransport};
use crate::Error;

/// First DevTools port handed out to a launched browser
const BASE_DEVTOOLS_PORT: u16 = 9222;

/// Backend that launches real browser processes
#[derive(Debug)]
pub struct LauncherBackend {
    next_port: AtomicU16,
}

impl LauncherBackend {
    /// Create a new launcher backend
    pub fn new() -> Self {
        Self {
            next_port: AtomicU16::new(BASE_DEVTOOLS_PORT),
        }
    }
}

impl Default for LauncherBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionBackend for LauncherBackend {
    async fn open(
        &self,
        worker_id: &str,
        kind: BrowserKind,
        config: &Config,
    ) -> Result<SessionTransport, Error> {
        let browser = match &config.devtools_endpoint {
            Some(endpoint) => {
                LaunchedBrowser::attach(endpoint, config.launch_timeout_secs).await?
            }
            None => {
                let port = self.next_port.fetch_add(1, Ordering::SeqCst);
                let profile = LaunchProfile::build(kind, config, port);
                tracing::debug!(
                    "Worker {} gets {} on port {}",
                    worker_id,
                    profile.executable,
                    port
                );
                LaunchedBrowser::launch(&profile, config.launch_timeout_secs).await?
            }
        };

        Ok(SessionTransport {
            client: browser.client(),
            browser: Some(browser),
        })
    }
}
