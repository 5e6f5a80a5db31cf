//! Bounded retries with exponential backoff.
//!
//! A [`RetryPolicy`] re-invokes an operation while its failures are
//! classified as [`FailureClass::Transient`]. The operation is called anew on
//! every attempt, so anything it resolves (locator chains, element handles)
//! is resolved again.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::result::{duration_ms, ErrorKind, Failure, FailureClass};

// =============================================================================
// BACKOFF
// =============================================================================

/// Exponential backoff between attempts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    /// Delay before the second attempt
    pub initial: Duration,
    /// Growth factor per retry
    pub multiplier: f64,
    /// Ceiling
    pub max: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(200),
            multiplier: 2.0,
            max: Duration::from_secs(2),
        }
    }
}

impl Backoff {
    /// Create a backoff
    #[must_use]
    pub const fn new(initial: Duration, multiplier: f64, max: Duration) -> Self {
        Self {
            initial,
            multiplier,
            max,
        }
    }

    /// Same delay every time
    #[must_use]
    pub const fn fixed(delay: Duration) -> Self {
        Self::new(delay, 1.0, delay)
    }

    /// No delay at all
    #[must_use]
    pub const fn none() -> Self {
        Self::fixed(Duration::ZERO)
    }

    /// Delay after the `retry`-th failed attempt: `min(initial * multiplier^(retry-1), max)`
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry.saturating_sub(1)).unwrap_or(i32::MAX);
        let factor = if self.multiplier.is_finite() && self.multiplier > 0.0 {
            self.multiplier.powi(exponent)
        } else {
            1.0
        };
        let secs = self.initial.as_secs_f64() * factor;
        if !secs.is_finite() || secs >= self.max.as_secs_f64() {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        }
    }
}

// =============================================================================
// CLASSIFIER
// =============================================================================

/// Caller-supplied Transient/Fatal decision
#[derive(Clone)]
pub struct Classifier(Arc<dyn Fn(&Failure) -> FailureClass + Send + Sync>);

impl Classifier {
    /// Wrap a classification function
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Failure) -> FailureClass + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Classify a failure
    #[must_use]
    pub fn classify(&self, failure: &Failure) -> FailureClass {
        (self.0)(failure)
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(|failure| failure.kind.default_class())
    }
}

impl fmt::Debug for Classifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Classifier(..)")
    }
}

// =============================================================================
// RESULTS
// =============================================================================

/// How an action was ultimately carried out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStrategy {
    /// Native interaction
    Direct,
    /// Programmatic fallback from script
    Script,
}

impl ExecutionStrategy {
    /// Stable tag
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Script => "script",
        }
    }
}

impl fmt::Display for ExecutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value-level result of a retried operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryOutcome<T> {
    /// Final value or final failure
    pub result: Result<T, Failure>,
    /// Attempts made
    pub attempts: u32,
    /// Total time including backoff sleeps
    pub elapsed: Duration,
    /// Stopped because attempts ran out on a transient failure
    pub retries_exhausted: bool,
}

/// Outcome of one user-facing action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult {
    /// Attempts made
    pub attempted: u32,
    /// Whether the action took effect
    pub succeeded: bool,
    /// Strategy that succeeded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy_used: Option<ExecutionStrategy>,
    /// Terminal failure kind
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
    /// Human readable detail
    #[serde(default)]
    pub message: String,
    /// Total time spent
    #[serde(rename = "elapsed_ms", with = "duration_ms")]
    pub elapsed: Duration,
    /// Transient failures outlasted the attempt budget
    #[serde(default)]
    pub retries_exhausted: bool,
}

impl ActionResult {
    /// Successful single-attempt result
    #[must_use]
    pub fn ok(message: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            attempted: 1,
            succeeded: true,
            strategy_used: None,
            error: None,
            message: message.into(),
            elapsed,
            retries_exhausted: false,
        }
    }

    /// Failed single-attempt result
    #[must_use]
    pub fn failed(failure: Failure, elapsed: Duration) -> Self {
        Self {
            attempted: 1,
            succeeded: false,
            strategy_used: None,
            error: Some(failure.kind),
            message: failure.message,
            elapsed,
            retries_exhausted: false,
        }
    }

    /// Fold a retry outcome into an action result
    #[must_use]
    pub fn from_outcome(outcome: RetryOutcome<Option<ExecutionStrategy>>, what: &str) -> Self {
        match outcome.result {
            Ok(strategy) => Self {
                attempted: outcome.attempts,
                succeeded: true,
                strategy_used: strategy,
                error: None,
                message: what.to_string(),
                elapsed: outcome.elapsed,
                retries_exhausted: false,
            },
            Err(failure) => Self {
                attempted: outcome.attempts,
                succeeded: false,
                strategy_used: None,
                error: Some(failure.kind),
                message: failure.message,
                elapsed: outcome.elapsed,
                retries_exhausted: outcome.retries_exhausted,
            },
        }
    }

    /// The failure this result represents, if any
    #[must_use]
    pub fn failure(&self) -> Option<Failure> {
        if self.succeeded {
            return None;
        }
        Some(Failure::new(
            self.error.unwrap_or(ErrorKind::AssertionViolated),
            self.message.clone(),
        ))
    }
}

// =============================================================================
// POLICY
// =============================================================================

/// Retry policy for fallible actions
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Backoff,
    classifier: Classifier,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

impl RetryPolicy {
    /// Policy with `max_attempts` (at least one) and default backoff
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: Backoff::default(),
            classifier: Classifier::default(),
        }
    }

    /// Single attempt, no retries
    #[must_use]
    pub fn once() -> Self {
        Self::new(1)
    }

    /// Set backoff
    #[must_use]
    pub const fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Set classifier
    #[must_use]
    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Maximum number of attempts
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Backoff
    #[must_use]
    pub const fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    /// Classify a failure with the configured classifier
    #[must_use]
    pub fn classify(&self, failure: &Failure) -> FailureClass {
        self.classifier.classify(failure)
    }

    /// Run `op` until it succeeds, fails fatally, or attempts run out.
    ///
    /// `op` receives the 1-based attempt number.
    pub fn run<T, F>(&self, mut op: F) -> RetryOutcome<T>
    where
        F: FnMut(u32) -> Result<T, Failure>,
    {
        let start = Instant::now();
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let failure = match op(attempt) {
                Ok(value) => {
                    return RetryOutcome {
                        result: Ok(value),
                        attempts: attempt,
                        elapsed: start.elapsed(),
                        retries_exhausted: false,
                    };
                }
                Err(failure) => failure,
            };

            let class = self.classify(&failure);
            if class == FailureClass::Fatal {
                debug!(attempt, %failure, "fatal failure, not retrying");
                return RetryOutcome {
                    result: Err(failure),
                    attempts: attempt,
                    elapsed: start.elapsed(),
                    retries_exhausted: false,
                };
            }
            if attempt >= self.max_attempts {
                debug!(attempt, %failure, "retries exhausted");
                return RetryOutcome {
                    result: Err(failure),
                    attempts: attempt,
                    elapsed: start.elapsed(),
                    retries_exhausted: true,
                };
            }

            let delay = self.backoff.delay_for(attempt);
            debug!(attempt, %failure, ?delay, "transient failure, retrying");
            if !delay.is_zero() {
                std::thread::sleep(delay);
            }
        }
    }

    /// Run an action and report it as an [`ActionResult`]
    pub fn execute<F>(&self, what: &str, op: F) -> ActionResult
    where
        F: FnMut(u32) -> Result<Option<ExecutionStrategy>, Failure>,
    {
        ActionResult::from_outcome(self.run(op), what)
    }
}
