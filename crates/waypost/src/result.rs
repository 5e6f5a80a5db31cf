//! Result and error types for Waypost.
//!
//! Two families live here. [`WaypostError`] is for boundary problems (bad
//! configuration, unreadable scenario files, I/O) and travels through `?`.
//! [`ErrorKind`] and [`Failure`] describe runtime outcomes of waits and
//! actions; those are reported as values and never thrown.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for Waypost operations
pub type WaypostResult<T> = Result<T, WaypostError>;

/// Errors that can occur at the Waypost boundary
#[derive(Debug, Error)]
pub enum WaypostError {
    /// Configuration failed validation
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Scenario definition is invalid
    #[error("Scenario error in {scenario}: {message}")]
    Scenario {
        /// Scenario name or file
        scenario: String,
        /// Error message
        message: String,
    },

    /// Locator chain constructed without entries
    #[error("Locator chain must contain at least one locator")]
    EmptyChain,

    /// URL pattern could not be parsed
    #[error("Invalid URL pattern {pattern:?}: {message}")]
    InvalidPattern {
        /// Offending pattern
        pattern: String,
        /// Error message
        message: String,
    },

    /// Browser session failure outside of a wait or action
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Artifact could not be stored
    #[error("Artifact error: {message}")]
    Artifact {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl WaypostError {
    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a scenario error
    #[must_use]
    pub fn scenario(scenario: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Scenario {
            scenario: scenario.into(),
            message: message.into(),
        }
    }
}

// =============================================================================
// RUNTIME TAXONOMY
// =============================================================================

/// Closed set of runtime failure kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Condition did not hold before the deadline
    Timeout,
    /// Locator chain fully exhausted without a match
    NotFound,
    /// Element found but not clickable or editable
    NotInteractable,
    /// Element reference no longer attached to the page
    StaleReference,
    /// Navigation could not be completed
    NavigationFailed,
    /// An expectation about the page was violated
    AssertionViolated,
    /// Run was cancelled from outside
    Cancelled,
}

impl ErrorKind {
    /// All kinds, in declaration order
    pub const ALL: [Self; 7] = [
        Self::Timeout,
        Self::NotFound,
        Self::NotInteractable,
        Self::StaleReference,
        Self::NavigationFailed,
        Self::AssertionViolated,
        Self::Cancelled,
    ];

    /// Classification used when the caller supplies no classifier
    #[must_use]
    pub const fn default_class(self) -> FailureClass {
        match self {
            Self::Timeout | Self::NotInteractable | Self::StaleReference => FailureClass::Transient,
            Self::NotFound | Self::NavigationFailed | Self::AssertionViolated | Self::Cancelled => {
                FailureClass::Fatal
            }
        }
    }

    /// Stable snake_case name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::NotFound => "not_found",
            Self::NotInteractable => "not_interactable",
            Self::StaleReference => "stale_reference",
            Self::NavigationFailed => "navigation_failed",
            Self::AssertionViolated => "assertion_violated",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether retrying a failure can plausibly help
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// Caused by timing or rendering; likely to succeed on retry
    Transient,
    /// A genuine defect or violated expectation; retry is pointless
    Fatal,
}

/// A single classified failure produced by a wait, action or step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    /// Failure kind
    pub kind: ErrorKind,
    /// Human readable detail
    pub message: String,
}

impl Failure {
    /// Create a failure
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Timeout failure
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    /// Not-found failure
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Not-interactable failure
    #[must_use]
    pub fn not_interactable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotInteractable, message)
    }

    /// Assertion failure
    #[must_use]
    pub fn assertion(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AssertionViolated, message)
    }
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl From<SessionError> for Failure {
    fn from(err: SessionError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

// =============================================================================
// SESSION ERRORS
// =============================================================================

/// Errors reported by a browser session
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Handle refers to an element that was replaced or removed
    #[error("stale element reference: {handle}")]
    StaleElement {
        /// Element handle id
        handle: String,
    },

    /// Another element would receive the click
    #[error("click on {handle} intercepted by {by}")]
    ClickIntercepted {
        /// Element handle id
        handle: String,
        /// Element that received the click
        by: String,
    },

    /// Element cannot receive the interaction
    #[error("element {handle} not interactable: {message}")]
    NotInteractable {
        /// Element handle id
        handle: String,
        /// Detail
        message: String,
    },

    /// Snapshot query failed mechanically (navigation in progress, transient protocol error)
    #[error("page query failed: {message}")]
    QueryFailed {
        /// Detail
        message: String,
    },

    /// Navigation was rejected
    #[error("navigation to {url} failed: {message}")]
    NavigationFailed {
        /// Target URL
        url: String,
        /// Detail
        message: String,
    },

    /// Session is gone
    #[error("session disconnected: {message}")]
    Disconnected {
        /// Detail
        message: String,
    },

    /// Artifact capture is not available
    #[error("artifact capture failed: {message}")]
    CaptureFailed {
        /// Detail
        message: String,
    },
}

impl SessionError {
    /// Map onto the runtime taxonomy
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::StaleElement { .. } | Self::QueryFailed { .. } => ErrorKind::StaleReference,
            Self::ClickIntercepted { .. } | Self::NotInteractable { .. } => {
                ErrorKind::NotInteractable
            }
            Self::NavigationFailed { .. } | Self::Disconnected { .. } => {
                ErrorKind::NavigationFailed
            }
            Self::CaptureFailed { .. } => ErrorKind::AssertionViolated,
        }
    }

    /// Whether a wait may keep polling after this error
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self.kind().default_class(), FailureClass::Transient)
    }

    /// Whether a direct click failed because another element covered the target
    #[must_use]
    pub const fn is_intercepted(&self) -> bool {
        matches!(self, Self::ClickIntercepted { .. })
    }
}

/// Serialize a `Duration` as whole milliseconds
pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod error_kind_tests {
        use super::*;

        #[test]
        fn test_default_classification() {
            assert_eq!(ErrorKind::Timeout.default_class(), FailureClass::Transient);
            assert_eq!(
                ErrorKind::NotInteractable.default_class(),
                FailureClass::Transient
            );
            assert_eq!(
                ErrorKind::StaleReference.default_class(),
                FailureClass::Transient
            );
            assert_eq!(ErrorKind::NotFound.default_class(), FailureClass::Fatal);
            assert_eq!(
                ErrorKind::NavigationFailed.default_class(),
                FailureClass::Fatal
            );
            assert_eq!(
                ErrorKind::AssertionViolated.default_class(),
                FailureClass::Fatal
            );
            assert_eq!(ErrorKind::Cancelled.default_class(), FailureClass::Fatal);
        }

        #[test]
        fn test_display_matches_serde_name() {
            for kind in ErrorKind::ALL {
                let json = serde_json::to_string(&kind).unwrap();
                assert_eq!(json, format!("\"{kind}\""));
            }
        }
    }

    mod session_error_tests {
        use super::*;

        #[test]
        fn test_stale_and_query_failures_are_transient() {
            let stale = SessionError::StaleElement {
                handle: "e1".into(),
            };
            let query = SessionError::QueryFailed {
                message: "navigation in progress".into(),
            };
            assert!(stale.is_transient());
            assert!(query.is_transient());
            assert_eq!(stale.kind(), ErrorKind::StaleReference);
        }

        #[test]
        fn test_disconnect_is_fatal() {
            let err = SessionError::Disconnected {
                message: "browser exited".into(),
            };
            assert!(!err.is_transient());
            assert_eq!(err.kind(), ErrorKind::NavigationFailed);
        }

        #[test]
        fn test_intercepted_maps_to_not_interactable() {
            let err = SessionError::ClickIntercepted {
                handle: "submit".into(),
                by: "div.overlay".into(),
            };
            assert!(err.is_intercepted());
            assert_eq!(err.kind(), ErrorKind::NotInteractable);
            let failure: Failure = err.into();
            assert!(failure.message.contains("div.overlay"));
        }
    }

    mod waypost_error_tests {
        use super::*;

        #[test]
        fn test_config_error_display() {
            let err = WaypostError::config("timeout must be positive");
            assert!(err.to_string().contains("Configuration error"));
        }

        #[test]
        fn test_session_error_from() {
            let err: WaypostError = SessionError::QueryFailed {
                message: "boom".into(),
            }
            .into();
            assert!(err.to_string().contains("boom"));
        }

        #[test]
        fn test_io_error_from() {
            let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
            let err: WaypostError = io.into();
            assert!(err.to_string().contains("I/O"));
        }
    }
}
