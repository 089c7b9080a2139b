//! Configuration management for Signup-Probe

use crate::{Error, Result};
use serde::Deserialize;
use std::env;
use std::str::FromStr;

/// Browser engine to drive. Closed set: anything Chromium-flavored that
/// speaks the DevTools protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserKind {
    Chrome,
    Chromium,
    Edge,
}

impl Default for BrowserKind {
    fn default() -> Self {
        BrowserKind::Chrome
    }
}

impl FromStr for BrowserKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "chrome" => Ok(BrowserKind::Chrome),
            "chromium" => Ok(BrowserKind::Chromium),
            "edge" => Ok(BrowserKind::Edge),
            other => Err(Error::configuration(format!(
                "Unknown browser kind: {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for BrowserKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BrowserKind::Chrome => write!(f, "chrome"),
            BrowserKind::Chromium => write!(f, "chromium"),
            BrowserKind::Edge => write!(f, "edge"),
        }
    }
}

/// Probe configuration
///
/// Resolved once per run; read-only afterwards. Element timeouts are in
/// seconds, the polling interval and retry delay in milliseconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Browser engine to launch
    pub browser: BrowserKind,

    /// Headless mode (no GUI)
    pub headless: bool,

    /// Browser executable path override
    pub browser_path: Option<String>,

    /// Attach to an already-running browser's DevTools endpoint instead of
    /// launching one (e.g. "http://localhost:9222")
    pub devtools_endpoint: Option<String>,

    /// Download directory for the session
    pub download_dir: Option<String>,

    /// Window width
    pub window_width: u32,

    /// Window height
    pub window_height: u32,

    /// Budget for waiting until an element exists, in seconds
    pub presence_timeout_secs: u64,

    /// Budget for waiting until an element is visible, in seconds
    pub visibility_timeout_secs: u64,

    /// Budget for waiting until an element is clickable, in seconds
    pub clickable_timeout_secs: u64,

    /// Budget for page-ready after navigation, in seconds
    pub page_load_timeout_secs: u64,

    /// Interval between condition evaluations, in milliseconds
    pub poll_interval_ms: u64,

    /// Maximum action attempts, first try included
    pub retry_attempts: u32,

    /// Delay between action attempts, in milliseconds
    pub retry_delay_ms: u64,

    /// Budget for the browser to come up, in seconds
    pub launch_timeout_secs: u64,

    /// Capture a screenshot when an action finally fails
    pub screenshot_on_failure: bool,

    /// Directory screenshots are written to
    pub screenshot_dir: String,

    /// Environment base URL
    pub base_url: String,

    /// Signup page path, relative to the base URL
    pub signup_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            browser: BrowserKind::Chrome,
            headless: true,
            browser_path: None,
            devtools_endpoint: None,
            download_dir: None,
            window_width: 1920,
            window_height: 1080,
            presence_timeout_secs: 10,
            visibility_timeout_secs: 10,
            clickable_timeout_secs: 15,
            page_load_timeout_secs: 30,
            poll_interval_ms: 500,
            retry_attempts: 3,
            retry_delay_ms: 250,
            launch_timeout_secs: 30,
            screenshot_on_failure: true,
            screenshot_dir: "screenshots".to_string(),
            base_url: "http://localhost:8080".to_string(),
            signup_path: "/signup".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();

        if let Ok(browser) = env::var("PROBE_BROWSER") {
            config.browser = browser.parse()?;
        }

        if let Ok(headless) = env::var("PROBE_HEADLESS") {
            config.headless = headless
                .parse()
                .map_err(|_| Error::configuration("Invalid PROBE_HEADLESS"))?;
        }

        if let Ok(path) = env::var("PROBE_BROWSER_PATH") {
            config.browser_path = Some(path);
        }

        if let Ok(endpoint) = env::var("PROBE_CDP_ENDPOINT") {
            config.devtools_endpoint = Some(endpoint);
        }

        if let Ok(dir) = env::var("PROBE_DOWNLOAD_DIR") {
            config.download_dir = Some(dir);
        }

        if let Ok(timeout) = env::var("PROBE_VISIBILITY_TIMEOUT") {
            config.visibility_timeout_secs = timeout
                .parse()
                .map_err(|_| Error::configuration("Invalid PROBE_VISIBILITY_TIMEOUT"))?;
        }

        if let Ok(timeout) = env::var("PROBE_CLICKABLE_TIMEOUT") {
            config.clickable_timeout_secs = timeout
                .parse()
                .map_err(|_| Error::configuration("Invalid PROBE_CLICKABLE_TIMEOUT"))?;
        }

        if let Ok(timeout) = env::var("PROBE_PRESENCE_TIMEOUT") {
            config.presence_timeout_secs = timeout
                .parse()
                .map_err(|_| Error::configuration("Invalid PROBE_PRESENCE_TIMEOUT"))?;
        }

        if let Ok(interval) = env::var("PROBE_POLL_INTERVAL_MS") {
            config.poll_interval_ms = interval
                .parse()
                .map_err(|_| Error::configuration("Invalid PROBE_POLL_INTERVAL_MS"))?;
        }

        if let Ok(attempts) = env::var("PROBE_RETRY_ATTEMPTS") {
            config.retry_attempts = attempts
                .parse()
                .map_err(|_| Error::configuration("Invalid PROBE_RETRY_ATTEMPTS"))?;
        }

        if let Ok(screenshot) = env::var("PROBE_SCREENSHOT_ON_FAILURE") {
            config.screenshot_on_failure = screenshot
                .parse()
                .map_err(|_| Error::configuration("Invalid PROBE_SCREENSHOT_ON_FAILURE"))?;
        }

        if let Ok(url) = env::var("PROBE_BASE_URL") {
            config.base_url = url;
        }

        if let Ok(path) = env::var("PROBE_SIGNUP_PATH") {
            config.signup_path = path;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::configuration(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::configuration(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Full URL of the signup page
    pub fn signup_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.signup_path.trim_start_matches('/')
        )
    }

    fn validate(&self) -> Result<()> {
        if self.retry_attempts == 0 {
            return Err(Error::configuration("retry_attempts must be at least 1"));
        }
        if self.base_url.is_empty() {
            return Err(Error::configuration("base_url must not be empty"));
        }
        Ok(())
    }
}
