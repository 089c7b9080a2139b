//! Browser process launch and attach
//!
//! Brings a DevTools-speaking browser up for one worker: builds the
//! kind-specific command line, spawns the process, polls the DevTools HTTP
//! endpoint until it answers, creates a page target and hands back a
//! connected client. Launch failures are terminal here; nothing retries a
//! browser that would not start.

use super::client::CdpClientImpl;
use super::connection::CdpWebSocketConnection;
use super::traits::CdpClient;
use crate::config::{BrowserKind, Config};
use crate::Error;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How often the DevTools endpoint is probed while the process boots
const STARTUP_PROBE_INTERVAL_MS: u64 = 200;

/// Command line and endpoint for one browser process
#[derive(Debug, Clone)]
pub struct LaunchProfile {
    /// Browser engine
    pub kind: BrowserKind,
    /// Resolved executable
    pub executable: String,
    /// Process arguments
    pub args: Vec<String>,
    /// DevTools port the process will listen on
    pub port: u16,
}

impl LaunchProfile {
    /// Build the launch profile for a browser kind from the run configuration.
    ///
    /// Every kind in the closed set is Chromium-based, so the argument
    /// vocabulary is shared; only the executable differs.
    pub fn build(kind: BrowserKind, config: &Config, port: u16) -> Self {
        let executable = config
            .browser_path
            .clone()
            .unwrap_or_else(|| default_executable(kind).to_string());

        let mut args = vec![
            format!("--remote-debugging-port={}", port),
            format!("--user-data-dir=/tmp/signup-probe-{}", port),
            format!(
                "--window-size={},{}",
                config.window_width, config.window_height
            ),
            "--no-first-run".to_string(),
            "--no-default-browser-check".to_string(),
            "--disable-notifications".to_string(),
            "--disable-infobars".to_string(),
            "--disable-popup-blocking".to_string(),
            "--disable-background-networking".to_string(),
        ];

        if config.headless {
            args.push("--headless=new".to_string());
            args.push("--disable-gpu".to_string());
        }

        Self {
            kind,
            executable,
            args,
            port,
        }
    }

    /// DevTools HTTP endpoint for this profile
    pub fn http_endpoint(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }
}

fn default_executable(kind: BrowserKind) -> &'static str {
    match kind {
        BrowserKind::Chrome => "google-chrome",
        BrowserKind::Chromium => "chromium",
        BrowserKind::Edge => "microsoft-edge",
    }
}

/// One launched (or attached) browser process with a connected page client
#[derive(Debug)]
pub struct LaunchedBrowser {
    /// Child process, absent when attached to an external browser
    child: Option<tokio::process::Child>,
    /// DevTools HTTP endpoint
    endpoint: String,
    /// Connected client for the page target
    client: Arc<dyn CdpClient>,
}

impl LaunchedBrowser {
    /// Spawn a browser process from a profile and connect to a fresh page.
    pub async fn launch(profile: &LaunchProfile, startup_timeout_secs: u64) -> Result<Self, Error> {
        info!(
            "Launching {} ({}) on port {}",
            profile.kind, profile.executable, profile.port
        );

        let child = tokio::process::Command::new(&profile.executable)
            .args(&profile.args)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::session_start(format!(
                    "Failed to spawn {}: {} (is it installed?)",
                    profile.executable, e
                ))
            })?;

        let endpoint = profile.http_endpoint();
        Self::await_devtools(&endpoint, startup_timeout_secs).await?;

        let client = Self::connect_page(&endpoint).await?;

        Ok(Self {
            child: Some(child),
            endpoint,
            client,
        })
    }

    /// Attach to an already-running browser's DevTools endpoint.
    pub async fn attach(endpoint: &str, startup_timeout_secs: u64) -> Result<Self, Error> {
        let endpoint = endpoint
            .replace("ws://", "http://")
            .replace("wss://", "https://");

        info!("Attaching to browser at {}", endpoint);

        Self::await_devtools(&endpoint, startup_timeout_secs).await?;
        let client = Self::connect_page(&endpoint).await?;

        Ok(Self {
            child: None,
            endpoint,
            client,
        })
    }

    /// Poll the /json/version endpoint until the browser answers.
    async fn await_devtools(endpoint: &str, startup_timeout_secs: u64) -> Result<(), Error> {
        let http = reqwest::Client::new();
        let url = format!("{}/json/version", endpoint);
        let deadline = tokio::time::Instant::now()
            + tokio::time::Duration::from_secs(startup_timeout_secs.max(1));

        loop {
            match http.get(&url).send().await {
                Ok(response) if response.status().is_success() => {
                    debug!("DevTools endpoint up at {}", endpoint);
                    return Ok(());
                }
                Ok(response) => {
                    debug!("DevTools endpoint answered {}", response.status());
                }
                Err(e) => {
                    debug!("DevTools endpoint not up yet: {}", e);
                }
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(Error::session_start(format!(
                    "Browser did not expose DevTools at {} within {}s",
                    endpoint, startup_timeout_secs
                )));
            }

            tokio::time::sleep(tokio::time::Duration::from_millis(STARTUP_PROBE_INTERVAL_MS))
                .await;
        }
    }

    /// Create a blank page target and connect a client to it.
    async fn connect_page(endpoint: &str) -> Result<Arc<dyn CdpClient>, Error> {
        let http = reqwest::Client::new();
        let url = format!("{}/json/new?about:blank", endpoint);

        let target: serde_json::Value = http
            .put(&url)
            .send()
            .await
            .map_err(|e| Error::session_start(format!("Failed to create page target: {}", e)))?
            .json()
            .await
            .map_err(|e| Error::session_start(format!("Failed to parse target response: {}", e)))?;

        let ws_url = target
            .get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::session_start("No webSocketDebuggerUrl in target response"))?;

        let connection = CdpWebSocketConnection::connect(ws_url)
            .await
            .map_err(|e| Error::session_start(format!("Failed to connect to page: {}", e)))?;

        let client = Arc::new(CdpClientImpl::new(connection));
        client.enable_domain("Page").await?;
        client.enable_domain("Runtime").await?;

        Ok(client)
    }

    /// Connected client for the page target
    pub fn client(&self) -> Arc<dyn CdpClient> {
        Arc::clone(&self.client)
    }

    /// DevTools HTTP endpoint
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Close the page connection and take the process down.
    pub async fn shutdown(mut self) -> Result<(), Error> {
        if let Err(e) = self.client.close().await {
            debug!("Page connection close reported: {}", e);
        }

        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill().await {
                warn!("Failed to kill browser process: {}", e);
                return Err(Error::internal(format!(
                    "Browser process did not terminate: {}",
                    e
                )));
            }
        }

        Ok(())
    }
}
