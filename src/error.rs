//! Unified error types for Signup-Probe

use thiserror::Error;

/// Unified Result type
pub type Result<T> = std::result::Result<T, Error>;

/// Retry classification of an error.
///
/// Transient errors are expected to resolve on their own shortly (the SPA
/// re-rendered, the element has not been attached yet) and are absorbed by
/// the poll/retry loops. Fatal errors abort immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Transient,
    Fatal,
}

/// Unified error type for Signup-Probe
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// WebSocket errors
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// CDP protocol errors
    #[error("CDP error: {0}")]
    Cdp(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Browser session could not be started
    #[error("Session start failed: {0}")]
    SessionStart(String),

    /// Session is gone: never registered, closed, or its transport died
    #[error("Session unavailable: {0}")]
    SessionUnavailable(String),

    /// No element matches the selector (yet)
    #[error("Element not found: {0}")]
    ElementAbsent(String),

    /// Element left the DOM between observation and use
    #[error("Element detached: {0}")]
    ElementDetached(String),

    /// Element exists but is not rendered visible
    #[error("Element not visible: {0}")]
    ElementHidden(String),

    /// Element is visible but disabled for interaction
    #[error("Element disabled: {0}")]
    ElementDisabled(String),

    /// Element refused the interaction (occluded or off-screen)
    #[error("Element not interactable: {0}")]
    NotInteractable(String),

    /// Selector string the DOM engine rejects
    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    /// Page-side JavaScript raised
    #[error("Script execution failed: {0}")]
    Script(String),

    /// Readiness condition never satisfied within its budget
    #[error("'{condition}' not satisfied for {selector} within {budget_ms}ms")]
    ConditionTimeout {
        condition: String,
        selector: String,
        budget_ms: u64,
        /// Last transient error observed while polling, for diagnostics
        last_seen: Option<Box<Error>>,
    },

    /// Action kept failing transiently until the retry budget ran out
    #[error("Action failed after {attempts} attempt(s): {last}")]
    RetryExhausted { attempts: u32, last: Box<Error> },

    /// Navigation failed
    #[error("Navigation failed: {0}")]
    Navigation(String),

    /// Semantic locator name with no selector registered
    #[error("Unknown locator: {0}")]
    UnknownLocator(String),

    /// Flow-level verification assertion failed
    #[error("Verification failed: {0}")]
    Verification(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new WebSocket error
    pub fn websocket<S: Into<String>>(msg: S) -> Self {
        Error::WebSocket(msg.into())
    }

    /// Create a new CDP error
    pub fn cdp<S: Into<String>>(msg: S) -> Self {
        Error::Cdp(msg.into())
    }

    /// Create a new session start error
    pub fn session_start<S: Into<String>>(msg: S) -> Self {
        Error::SessionStart(msg.into())
    }

    /// Create a new session unavailable error
    pub fn session_unavailable<S: Into<String>>(msg: S) -> Self {
        Error::SessionUnavailable(msg.into())
    }

    /// Create a new element absent error
    pub fn element_absent<S: Into<String>>(selector: S) -> Self {
        Error::ElementAbsent(selector.into())
    }

    /// Create a new element detached error
    pub fn element_detached<S: Into<String>>(selector: S) -> Self {
        Error::ElementDetached(selector.into())
    }

    /// Create a new element hidden error
    pub fn element_hidden<S: Into<String>>(selector: S) -> Self {
        Error::ElementHidden(selector.into())
    }

    /// Create a new element disabled error
    pub fn element_disabled<S: Into<String>>(selector: S) -> Self {
        Error::ElementDisabled(selector.into())
    }

    /// Create a new not interactable error
    pub fn not_interactable<S: Into<String>>(selector: S) -> Self {
        Error::NotInteractable(selector.into())
    }

    /// Create a new invalid selector error
    pub fn invalid_selector<S: Into<String>>(selector: S) -> Self {
        Error::InvalidSelector(selector.into())
    }

    /// Create a new script execution error
    pub fn script<S: Into<String>>(msg: S) -> Self {
        Error::Script(msg.into())
    }

    /// Create a new navigation error
    pub fn navigation<S: Into<String>>(msg: S) -> Self {
        Error::Navigation(msg.into())
    }

    /// Create a new verification error
    pub fn verification<S: Into<String>>(msg: S) -> Self {
        Error::Verification(msg.into())
    }

    /// Create a new configuration error
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Error::Configuration(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Error::Internal(msg.into())
    }

    /// Classify this error for the poll/retry loops.
    ///
    /// The set of transient kinds is closed: an element that is not there,
    /// not attached anymore, not rendered, not enabled, or momentarily not
    /// interactable. Everything else aborts immediately — in particular a
    /// dead session or transport, which retrying would only turn into a
    /// full timeout.
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::ElementAbsent(_)
            | Error::ElementDetached(_)
            | Error::ElementHidden(_)
            | Error::ElementDisabled(_)
            | Error::NotInteractable(_) => ErrorClass::Transient,
            _ => ErrorClass::Fatal,
        }
    }

    /// Whether this error may resolve by waiting
    pub fn is_transient(&self) -> bool {
        self.class() == ErrorClass::Transient
    }
}
