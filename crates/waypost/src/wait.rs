//! Condition polling.
//!
//! [`wait_until`] re-queries the session and re-evaluates the condition until
//! it holds or the timeout elapses. Waiting is blocking and measured with
//! [`Instant`] only. A timeout is an outcome, not an error: callers get a
//! [`WaitOutcome`] either way.

use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::condition::{evaluate, target, Condition};
use crate::result::ErrorKind;
use crate::session::BrowserSession;
use crate::snapshot::{ElementHandle, Snapshot};

// =============================================================================
// CONSTANTS
// =============================================================================

/// Default timeout for wait operations (10 seconds)
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 10_000;

/// Default polling interval (100ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Default ceiling for a growing poll interval (1 second)
pub const DEFAULT_MAX_POLL_INTERVAL_MS: u64 = 1_000;

/// Upper bound for the post-success settle delay
pub const MAX_SETTLE_DELAY: Duration = Duration::from_secs(2);

// =============================================================================
// WAIT OPTIONS
// =============================================================================

/// Options for a single wait
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaitOptions {
    /// Give up after this long
    pub timeout: Duration,
    /// Initial spacing between polls
    pub poll_interval: Duration,
    /// Multiplier applied to the spacing after every poll (1.0 = fixed)
    pub poll_backoff: f64,
    /// Ceiling for the spacing
    pub max_poll_interval: Duration,
    /// Pause applied once after success; capped at [`MAX_SETTLE_DELAY`]
    pub settle_delay: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_WAIT_TIMEOUT_MS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            poll_backoff: 1.0,
            max_poll_interval: Duration::from_millis(DEFAULT_MAX_POLL_INTERVAL_MS),
            settle_delay: Duration::ZERO,
        }
    }
}

impl WaitOptions {
    /// Create default options
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set poll interval
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Grow the poll interval by `multiplier` after each poll, up to `max`
    #[must_use]
    pub const fn with_poll_backoff(mut self, multiplier: f64, max: Duration) -> Self {
        self.poll_backoff = multiplier;
        self.max_poll_interval = max;
        self
    }

    /// Set settle delay
    #[must_use]
    pub const fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Spacing to use after a poll that used `current`
    #[must_use]
    pub fn next_poll(&self, current: Duration) -> Duration {
        if !self.poll_backoff.is_finite() || self.poll_backoff <= 1.0 {
            return current;
        }
        let ceiling = self.max_poll_interval.max(self.poll_interval);
        let grown = current.as_secs_f64() * self.poll_backoff;
        if grown >= ceiling.as_secs_f64() {
            ceiling
        } else {
            Duration::from_secs_f64(grown)
        }
    }
}

// =============================================================================
// WAIT OUTCOME
// =============================================================================

/// Result of one wait call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitOutcome {
    /// Condition held before the timeout
    pub succeeded: bool,
    /// Time spent polling (settle delay excluded)
    pub elapsed: Duration,
    /// Why the wait failed, if it did
    pub last_error: Option<ErrorKind>,
    /// Element the condition was satisfied by
    pub target: Option<ElementHandle>,
    /// Number of snapshot queries issued
    pub polls: u32,
    /// Most recent successful snapshot
    pub last_snapshot: Option<Snapshot>,
}

impl WaitOutcome {
    fn success(
        elapsed: Duration,
        target: Option<ElementHandle>,
        polls: u32,
        snapshot: Snapshot,
    ) -> Self {
        Self {
            succeeded: true,
            elapsed,
            last_error: None,
            target,
            polls,
            last_snapshot: Some(snapshot),
        }
    }

    fn failure(
        elapsed: Duration,
        kind: ErrorKind,
        polls: u32,
        snapshot: Option<Snapshot>,
    ) -> Self {
        Self {
            succeeded: false,
            elapsed,
            last_error: Some(kind),
            target: None,
            polls,
            last_snapshot: snapshot,
        }
    }
}

// =============================================================================
// ENGINE
// =============================================================================

/// Poll `condition` against fresh snapshots until it holds or `options.timeout`
/// elapses.
///
/// Transient query failures are recorded and polling continues; a fatal one
/// ends the wait immediately with that kind. If every poll failed
/// mechanically the outcome carries the last query error rather than
/// [`ErrorKind::Timeout`].
pub fn wait_until(
    session: &mut dyn BrowserSession,
    condition: &Condition,
    options: &WaitOptions,
) -> WaitOutcome {
    let start = Instant::now();
    let mut poll = options.poll_interval;
    let mut polls = 0u32;
    let mut last_snapshot: Option<Snapshot> = None;
    let mut last_query_error: Option<ErrorKind> = None;

    loop {
        polls += 1;
        match session.query_snapshot() {
            Ok(snapshot) => {
                if evaluate(condition, &snapshot) {
                    let found = target(condition, &snapshot);
                    let elapsed = start.elapsed();
                    debug!(%condition, polls, ?elapsed, "condition satisfied");
                    settle(options.settle_delay);
                    return WaitOutcome::success(elapsed, found, polls, snapshot);
                }
                last_snapshot = Some(snapshot);
            }
            Err(err) if err.is_transient() => {
                debug!(%condition, polls, error = %err, "transient query failure");
                last_query_error = Some(err.kind());
            }
            Err(err) => {
                warn!(%condition, polls, error = %err, "fatal query failure, abandoning wait");
                return WaitOutcome::failure(start.elapsed(), err.kind(), polls, last_snapshot);
            }
        }

        let elapsed = start.elapsed();
        if elapsed >= options.timeout {
            break;
        }
        std::thread::sleep(poll.min(options.timeout - elapsed));
        poll = options.next_poll(poll);
    }

    let kind = match (&last_snapshot, last_query_error) {
        (None, Some(kind)) => kind,
        _ => ErrorKind::Timeout,
    };
    let elapsed = start.elapsed();
    debug!(%condition, polls, ?elapsed, %kind, "wait timed out");
    WaitOutcome::failure(elapsed, kind, polls, last_snapshot)
}

fn settle(delay: Duration) {
    let delay = delay.min(MAX_SETTLE_DELAY);
    if !delay.is_zero() {
        std::thread::sleep(delay);
    }
}

/// Wait engine bound to a set of default options
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WaitEngine {
    options: WaitOptions,
}

impl WaitEngine {
    /// Create an engine with the given defaults
    #[must_use]
    pub const fn new(options: WaitOptions) -> Self {
        Self { options }
    }

    /// Default options
    #[must_use]
    pub const fn options(&self) -> &WaitOptions {
        &self.options
    }

    /// Wait with the engine defaults
    pub fn wait_until(
        &self,
        session: &mut dyn BrowserSession,
        condition: &Condition,
    ) -> WaitOutcome {
        wait_until(session, condition, &self.options)
    }

    /// Wait with the engine defaults but a different timeout
    pub fn wait_for(
        &self,
        session: &mut dyn BrowserSession,
        condition: &Condition,
        timeout: Duration,
    ) -> WaitOutcome {
        wait_until(session, condition, &self.options.with_timeout(timeout))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::locator::Locator;
    use crate::result::SessionError;
    use crate::session::{Capture, Interaction};
    use std::collections::VecDeque;

    /// Replays queued query results, then repeats the fallback forever
    struct Replay {
        queue: VecDeque<Result<Snapshot, SessionError>>,
        fallback: Result<Snapshot, SessionError>,
        queries: u32,
    }

    impl Replay {
        fn new(fallback: Result<Snapshot, SessionError>) -> Self {
            Self {
                queue: VecDeque::new(),
                fallback,
                queries: 0,
            }
        }

        fn then(mut self, next: Result<Snapshot, SessionError>) -> Self {
            self.queue.push_back(next);
            self
        }
    }

    impl BrowserSession for Replay {
        fn navigate(&mut self, _url: &str) -> Result<(), SessionError> {
            Ok(())
        }

        fn query_snapshot(&mut self) -> Result<Snapshot, SessionError> {
            self.queries += 1;
            self.queue
                .pop_front()
                .unwrap_or_else(|| self.fallback.clone())
        }

        fn dispatch(&mut self, _interaction: Interaction) -> Result<(), SessionError> {
            Ok(())
        }

        fn capture_artifact(&mut self) -> Result<Capture, SessionError> {
            Ok(Capture::new(vec![0], 1, 1))
        }
    }

    fn empty() -> Snapshot {
        Snapshot::new("http://app/")
    }

    fn with_button() -> Snapshot {
        empty().with_element(ElementHandle::new("e1", "button").with_attr("id", "go"))
    }

    fn stale() -> SessionError {
        SessionError::StaleElement {
            handle: "e1".into(),
        }
    }

    fn quick(timeout_ms: u64, poll_ms: u64) -> WaitOptions {
        WaitOptions::new()
            .with_timeout(Duration::from_millis(timeout_ms))
            .with_poll_interval(Duration::from_millis(poll_ms))
    }

    mod options_tests {
        use super::*;

        #[test]
        fn test_defaults() {
            let o = WaitOptions::default();
            assert_eq!(o.timeout, Duration::from_millis(DEFAULT_WAIT_TIMEOUT_MS));
            assert_eq!(o.poll_interval, Duration::from_millis(DEFAULT_POLL_INTERVAL_MS));
            assert!((o.poll_backoff - 1.0).abs() < f64::EPSILON);
            assert_eq!(o.settle_delay, Duration::ZERO);
        }

        #[test]
        fn test_fixed_poll_does_not_grow() {
            let o = quick(1000, 20);
            assert_eq!(o.next_poll(Duration::from_millis(20)), Duration::from_millis(20));
        }

        #[test]
        fn test_backoff_grows_to_ceiling() {
            let o = quick(1000, 10).with_poll_backoff(2.0, Duration::from_millis(35));
            let p1 = o.next_poll(Duration::from_millis(10));
            assert_eq!(p1, Duration::from_millis(20));
            let p2 = o.next_poll(p1);
            assert_eq!(p2, Duration::from_millis(35));
            assert_eq!(o.next_poll(p2), Duration::from_millis(35));
        }
    }

    mod wait_until_tests {
        use super::*;

        #[test]
        fn test_early_success_on_first_poll() {
            let mut session = Replay::new(Ok(with_button()));
            let out = wait_until(
                &mut session,
                &Condition::clickable(Locator::id("go")),
                &quick(1000, 50),
            );
            assert!(out.succeeded);
            assert_eq!(out.polls, 1);
            assert!(out.elapsed < Duration::from_millis(50));
            assert_eq!(out.target.unwrap().id, "e1");
            assert!(out.last_error.is_none());
        }

        #[test]
        fn test_always_false_respects_timeout_bounds() {
            let timeout = Duration::from_millis(150);
            let poll = Duration::from_millis(30);
            let mut session = Replay::new(Ok(empty()));
            let out = wait_until(
                &mut session,
                &Condition::present(Locator::id("go")),
                &WaitOptions::new().with_timeout(timeout).with_poll_interval(poll),
            );
            assert!(!out.succeeded);
            assert_eq!(out.last_error, Some(ErrorKind::Timeout));
            assert!(out.elapsed >= timeout);
            assert!(out.elapsed < timeout + poll + Duration::from_millis(50));
            assert!(out.target.is_none());
        }

        #[test]
        fn test_success_after_a_few_polls() {
            let mut session = Replay::new(Ok(with_button()))
                .then(Ok(empty()))
                .then(Ok(empty()));
            let out = wait_until(
                &mut session,
                &Condition::present(Locator::id("go")),
                &quick(1000, 5),
            );
            assert!(out.succeeded);
            assert_eq!(out.polls, 3);
        }

        #[test]
        fn test_transient_query_errors_keep_polling() {
            let mut session = Replay::new(Ok(with_button()))
                .then(Err(stale()))
                .then(Err(SessionError::QueryFailed {
                    message: "navigation in progress".into(),
                }));
            let out = wait_until(
                &mut session,
                &Condition::present(Locator::id("go")),
                &quick(1000, 5),
            );
            assert!(out.succeeded);
            assert_eq!(session.queries, 3);
        }

        #[test]
        fn test_only_transient_errors_reports_last_kind() {
            let mut session = Replay::new(Err(stale()));
            let out = wait_until(&mut session, &Condition::PageReady, &quick(60, 10));
            assert!(!out.succeeded);
            assert_eq!(out.last_error, Some(ErrorKind::StaleReference));
            assert!(out.last_snapshot.is_none());
        }

        #[test]
        fn test_fatal_query_error_ends_wait_immediately() {
            let mut session = Replay::new(Err(SessionError::Disconnected {
                message: "browser exited".into(),
            }));
            let out = wait_until(&mut session, &Condition::PageReady, &quick(5000, 10));
            assert!(!out.succeeded);
            assert_eq!(out.last_error, Some(ErrorKind::NavigationFailed));
            assert_eq!(out.polls, 1);
            assert!(out.elapsed < Duration::from_millis(500));
        }

        #[test]
        fn test_settle_delay_not_counted() {
            let mut session = Replay::new(Ok(empty()));
            let options = quick(1000, 10).with_settle_delay(Duration::from_millis(60));
            let wall = Instant::now();
            let out = wait_until(&mut session, &Condition::PageReady, &options);
            assert!(out.succeeded);
            assert!(wall.elapsed() >= Duration::from_millis(60));
            assert!(out.elapsed < Duration::from_millis(60));
        }

        #[test]
        fn test_page_condition_has_no_target() {
            let mut session = Replay::new(Ok(with_button()));
            let out = wait_until(&mut session, &Condition::PageReady, &quick(100, 10));
            assert!(out.succeeded);
            assert!(out.target.is_none());
        }

        #[test]
        fn test_engine_wait_for_overrides_timeout() {
            let engine = WaitEngine::new(quick(10_000, 10));
            let mut session = Replay::new(Ok(empty()));
            let wall = Instant::now();
            let out = engine.wait_for(
                &mut session,
                &Condition::present(Locator::id("nope")),
                Duration::from_millis(40),
            );
            assert!(!out.succeeded);
            assert!(wall.elapsed() < Duration::from_secs(2));
        }
    }
}
