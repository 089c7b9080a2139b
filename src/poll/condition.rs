//! Readiness conditions and their DOM probes
//!
//! A condition is a named, stateless predicate over the current DOM.
//! Each compiles to a single JavaScript probe that observes the page and
//! reports back a tagged status object; the poller turns that observation
//! into success, a transient error worth polling through, or a fatal one.

use serde::Deserialize;

use crate::cdp::traits::EvaluationResult;
use crate::{Error, Result};

/// Screen-space rectangle of a matched element
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ElementRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Handle to an element that satisfied a condition.
///
/// A handle never outlives the wait that produced it; actions re-resolve
/// the selector fresh rather than trusting an old handle.
#[derive(Debug, Clone)]
pub struct ElementHandle {
    /// Selector that matched
    pub selector: String,
    /// Lowercase tag name
    pub tag: String,
    /// Bounding rectangle at observation time
    pub rect: ElementRect,
}

impl ElementHandle {
    /// Viewport coordinates of the element center
    pub fn center(&self) -> (f64, f64) {
        (
            self.rect.x + self.rect.width / 2.0,
            self.rect.y + self.rect.height / 2.0,
        )
    }
}

/// A named predicate over the current DOM state
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Element exists in the DOM, visible or not
    Present { selector: String },
    /// Element exists, has nonzero dimensions and is not styled away
    Visible { selector: String },
    /// Visible and enabled for interaction
    Clickable { selector: String },
    /// No matching element, or only hidden ones. Used to wait out
    /// transient loading indicators.
    Absent { selector: String },
    /// Document-level load-complete signal, checked after navigation
    /// before any element condition.
    PageReady,
}

impl Condition {
    pub fn present<S: Into<String>>(selector: S) -> Self {
        Condition::Present {
            selector: selector.into(),
        }
    }

    pub fn visible<S: Into<String>>(selector: S) -> Self {
        Condition::Visible {
            selector: selector.into(),
        }
    }

    pub fn clickable<S: Into<String>>(selector: S) -> Self {
        Condition::Clickable {
            selector: selector.into(),
        }
    }

    pub fn absent<S: Into<String>>(selector: S) -> Self {
        Condition::Absent {
            selector: selector.into(),
        }
    }

    /// Stable name for logs and timeout errors
    pub fn name(&self) -> &'static str {
        match self {
            Condition::Present { .. } => "present",
            Condition::Visible { .. } => "visible",
            Condition::Clickable { .. } => "clickable",
            Condition::Absent { .. } => "absent",
            Condition::PageReady => "page-ready",
        }
    }

    /// Selector the condition observes
    pub fn selector(&self) -> &str {
        match self {
            Condition::Present { selector }
            | Condition::Visible { selector }
            | Condition::Clickable { selector }
            | Condition::Absent { selector } => selector,
            Condition::PageReady => "document",
        }
    }

    /// JavaScript probe for one evaluation of this condition.
    ///
    /// The probe never throws: selector syntax errors are caught page-side
    /// and reported as a status so they can be told apart from a dead
    /// transport.
    pub fn probe_script(&self) -> String {
        match self {
            Condition::PageReady => r#"
                (() => {
                    return { status: document.readyState === 'complete' ? 'satisfied' : 'loading' };
                })()
                "#
            .to_string(),
            _ => element_probe_script(self.selector(), self.name()),
        }
    }

    /// Interpret one probe observation.
    ///
    /// `Ok(Some(handle))` / `Ok(None)` mean satisfied; a transient error
    /// means keep polling; a fatal error aborts the wait.
    pub fn interpret(&self, result: EvaluationResult) -> Result<Option<ElementHandle>> {
        let report = ProbeReport::parse(result)?;
        let selector = self.selector();
        let status = report.status.clone();

        match (self, status.as_str()) {
            // The probe saw everything it needed
            (_, "satisfied") => Ok(report.into_handle(selector)),

            // Invalid selectors never fix themselves
            (_, "invalid-selector") => Err(Error::invalid_selector(format!(
                "{}: {}",
                selector,
                report.message.unwrap_or_default()
            ))),

            // Absence inverts the element statuses: gone or hidden is success
            (Condition::Absent { .. }, "absent")
            | (Condition::Absent { .. }, "detached")
            | (Condition::Absent { .. }, "hidden") => Ok(None),
            (Condition::Absent { .. }, "lingering") => {
                Err(Error::element_hidden(format!("{} still visible", selector)))
            }

            (_, "absent") => Err(Error::element_absent(selector)),
            (_, "detached") => Err(Error::element_detached(selector)),
            (_, "hidden") => Err(Error::element_hidden(selector)),
            (_, "disabled") => Err(Error::element_disabled(selector)),
            (Condition::PageReady, "loading") => {
                Err(Error::element_absent("document not ready yet"))
            }

            (_, other) => Err(Error::cdp(format!(
                "Malformed probe status '{}' for {}",
                other, selector
            ))),
        }
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name(), self.selector())
    }
}

/// Probe observation as reported from the page
#[derive(Debug, Deserialize)]
struct ProbeReport {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    tag: Option<String>,
    #[serde(default)]
    rect: Option<ElementRect>,
}

impl ProbeReport {
    /// A probe that cannot be parsed is a protocol problem, not a page
    /// state; treat it as fatal.
    fn parse(result: EvaluationResult) -> Result<Self> {
        match result {
            EvaluationResult::Object(value) => serde_json::from_value(value)
                .map_err(|e| Error::cdp(format!("Malformed probe result: {}", e))),
            other => Err(Error::cdp(format!(
                "Probe returned a non-object result: {:?}",
                other
            ))),
        }
    }

    fn into_handle(self, selector: &str) -> Option<ElementHandle> {
        match (self.tag, self.rect) {
            (Some(tag), Some(rect)) => Some(ElementHandle {
                selector: selector.to_string(),
                tag,
                rect,
            }),
            _ => None,
        }
    }
}

/// Escape a selector for embedding in a single-quoted JS string
pub(crate) fn escape_selector(selector: &str) -> String {
    selector.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Shared element probe. The checks run in order and stop at the first
/// status that settles the condition: existence, attachment, rendering,
/// interactivity.
fn element_probe_script(selector: &str, condition: &str) -> String {
    let escaped = escape_selector(selector);
    format!(
        r#"
        (() => {{
            const condition = '{condition}';
            let el;
            try {{
                el = document.querySelector('{escaped}');
            }} catch (e) {{
                return {{ status: 'invalid-selector', message: String(e) }};
            }}
            if (!el) return {{ status: 'absent' }};
            if (!el.isConnected) return {{ status: 'detached' }};

            const rect = el.getBoundingClientRect();
            const describe = () => ({{
                status: 'satisfied',
                tag: el.tagName.toLowerCase(),
                rect: {{ x: rect.x, y: rect.y, width: rect.width, height: rect.height }}
            }});

            if (condition === 'present') return describe();

            const style = window.getComputedStyle(el);
            const visible = rect.width > 0 && rect.height > 0
                && style.display !== 'none'
                && style.visibility !== 'hidden';

            if (condition === 'absent') {{
                return visible ? {{ status: 'lingering' }} : {{ status: 'hidden' }};
            }}
            if (!visible) return {{ status: 'hidden' }};
            if (condition === 'clickable' && el.disabled) return {{ status: 'disabled' }};

            return describe();
        }})()
        "#
    )
}
