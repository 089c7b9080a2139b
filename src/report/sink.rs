//! Event sink implementations
//!
//! The sink is a pure observer. Implementations log, accumulate, or write
//! to disk, and swallow their own failures; nothing here feeds back into
//! the wait/retry control flow.

use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Structured events emitted by the synchronization engine
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeEvent {
    /// A readiness wait began
    WaitStarted {
        condition: String,
        selector: String,
        budget_ms: u64,
    },
    /// The wait's condition held
    WaitSatisfied {
        condition: String,
        selector: String,
        elapsed_ms: u64,
    },
    /// The wait's budget ran out
    WaitTimedOut {
        condition: String,
        selector: String,
        budget_ms: u64,
        last_seen: Option<String>,
    },
    /// One action attempt is starting (attempt counting includes the first)
    ActionAttempt {
        action: String,
        selector: String,
        attempt: u32,
        max_attempts: u32,
    },
    /// A transient failure scheduled another attempt
    RetryScheduled {
        action: String,
        selector: String,
        attempt: u32,
        delay_ms: u64,
        cause: String,
    },
    /// The one-shot dispatch fallback for a click that reported
    /// not-interactable
    FallbackClick { selector: String },
    /// The action completed
    ActionSucceeded {
        action: String,
        selector: String,
        attempts: u32,
    },
    /// The action failed for good
    ActionFailed {
        action: String,
        selector: String,
        error: String,
    },
}

/// Fire-and-forget observer of probe events
pub trait EventSink: Send + Sync + std::fmt::Debug {
    /// Record one event. Must not panic; must not influence the caller.
    fn record(&self, event: &ProbeEvent);

    /// Best-effort screenshot capture, keyed by a title. Failure to store
    /// the image never masks the failure that triggered it.
    fn capture_screenshot(&self, title: &str, png: &[u8]);
}

/// Sink that drops everything
#[derive(Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn record(&self, _event: &ProbeEvent) {}

    fn capture_screenshot(&self, _title: &str, _png: &[u8]) {}
}

/// Sink that logs events through `tracing` and writes screenshots under a
/// directory.
#[derive(Debug)]
pub struct FileScreenshotSink {
    screenshot_dir: PathBuf,
}

impl FileScreenshotSink {
    pub fn new<P: Into<PathBuf>>(screenshot_dir: P) -> Self {
        Self {
            screenshot_dir: screenshot_dir.into(),
        }
    }

    fn sanitize(title: &str) -> String {
        title
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
            .collect()
    }
}

impl EventSink for FileScreenshotSink {
    fn record(&self, event: &ProbeEvent) {
        match event {
            ProbeEvent::WaitStarted {
                condition,
                selector,
                budget_ms,
            } => debug!("wait {}({}) started, budget {}ms", condition, selector, budget_ms),
            ProbeEvent::WaitSatisfied {
                condition,
                selector,
                elapsed_ms,
            } => debug!("wait {}({}) satisfied in {}ms", condition, selector, elapsed_ms),
            ProbeEvent::WaitTimedOut {
                condition,
                selector,
                budget_ms,
                last_seen,
            } => warn!(
                "wait {}({}) timed out after {}ms, last seen: {}",
                condition,
                selector,
                budget_ms,
                last_seen.as_deref().unwrap_or("nothing")
            ),
            ProbeEvent::ActionAttempt {
                action,
                selector,
                attempt,
                max_attempts,
            } => info!("{} {} attempt {} of {}", action, selector, attempt, max_attempts),
            ProbeEvent::RetryScheduled {
                action,
                selector,
                attempt,
                delay_ms,
                cause,
            } => warn!(
                "{} {} attempt {} failed ({}), retrying in {}ms",
                action, selector, attempt, cause, delay_ms
            ),
            ProbeEvent::FallbackClick { selector } => {
                warn!("click {} falling back to direct dispatch", selector)
            }
            ProbeEvent::ActionSucceeded {
                action,
                selector,
                attempts,
            } => info!("{} {} succeeded after {} attempt(s)", action, selector, attempts),
            ProbeEvent::ActionFailed {
                action,
                selector,
                error,
            } => warn!("{} {} failed: {}", action, selector, error),
        }
    }

    fn capture_screenshot(&self, title: &str, png: &[u8]) {
        let filename = format!(
            "{}-{}.png",
            Self::sanitize(title),
            chrono::Utc::now().format("%Y%m%dT%H%M%S%.3f")
        );
        let path = self.screenshot_dir.join(filename);

        if let Err(e) = std::fs::create_dir_all(&self.screenshot_dir) {
            warn!("Could not create screenshot directory: {}", e);
            return;
        }
        match std::fs::write(&path, png) {
            Ok(()) => info!("Screenshot saved to {}", path.display()),
            Err(e) => warn!("Could not save screenshot {}: {}", path.display(), e),
        }
    }
}

/// Sink that accumulates events in memory, for assertions in tests
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ProbeEvent>>,
    screenshots: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded events, in order
    pub fn events(&self) -> Vec<ProbeEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Titles of captured screenshots, in order
    pub fn screenshot_titles(&self) -> Vec<String> {
        self.screenshots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Count of events matching a predicate
    pub fn count_where<F: Fn(&ProbeEvent) -> bool>(&self, f: F) -> usize {
        self.events().iter().filter(|e| f(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn record(&self, event: &ProbeEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event.clone());
    }

    fn capture_screenshot(&self, title: &str, _png: &[u8]) {
        self.screenshots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(title.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_sink_keeps_order() {
        let sink = RecordingSink::new();
        sink.record(&ProbeEvent::ActionAttempt {
            action: "click".to_string(),
            selector: "#a".to_string(),
            attempt: 1,
            max_attempts: 3,
        });
        sink.record(&ProbeEvent::ActionSucceeded {
            action: "click".to_string(),
            selector: "#a".to_string(),
            attempts: 1,
        });

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], ProbeEvent::ActionAttempt { .. }));
        assert!(matches!(events[1], ProbeEvent::ActionSucceeded { .. }));
    }

    #[test]
    fn test_recording_sink_screenshots() {
        let sink = RecordingSink::new();
        sink.capture_screenshot("signup-failure", &[0x89, 0x50]);
        assert_eq!(sink.screenshot_titles(), vec!["signup-failure"]);
    }

    #[test]
    fn test_title_sanitization() {
        assert_eq!(
            FileScreenshotSink::sanitize("click #submit failed!"),
            "click__submit_failed_"
        );
        assert_eq!(FileScreenshotSink::sanitize("wait-timeout"), "wait-timeout");
    }

    #[test]
    fn test_null_sink_is_silent() {
        let sink = NullSink;
        sink.record(&ProbeEvent::FallbackClick {
            selector: "#a".to_string(),
        });
        sink.capture_screenshot("anything", &[]);
    }
}
