//! User-facing actions on top of waits and retries.
//!
//! Every attempt re-resolves its locator chain through the wait engine, so a
//! re-rendered element is found again instead of being reused stale.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::condition::{evaluate, Condition};
use crate::locator::{resolve, LocatorChain};
use crate::result::{ErrorKind, Failure};
use crate::retry::{ActionResult, ExecutionStrategy, RetryPolicy};
use crate::session::{BrowserSession, Interaction};
use crate::snapshot::{ElementHandle, Snapshot};
use crate::wait::{wait_until, WaitOptions, WaitOutcome};

/// Default page-load timeout (30 seconds)
pub const DEFAULT_PAGE_LOAD_TIMEOUT_MS: u64 = 30_000;

// =============================================================================
// ACTIONS
// =============================================================================

/// A user-facing action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Click an element
    Click(LocatorChain),
    /// Replace the contents of a form control
    TypeText {
        /// Field to type into
        target: LocatorChain,
        /// Text to enter
        text: String,
    },
    /// Load a URL (absolute, or relative to the base URL)
    Navigate(String),
    /// Bring an element into the viewport
    ScrollIntoView(LocatorChain),
    /// Attach a local file to a file input
    UploadFile {
        /// File input
        target: LocatorChain,
        /// Local file
        path: PathBuf,
    },
}

impl Action {
    /// Click
    pub fn click(chain: impl Into<LocatorChain>) -> Self {
        Self::Click(chain.into())
    }

    /// Type text
    pub fn type_text(chain: impl Into<LocatorChain>, text: impl Into<String>) -> Self {
        Self::TypeText {
            target: chain.into(),
            text: text.into(),
        }
    }

    /// Navigate
    pub fn navigate(url: impl Into<String>) -> Self {
        Self::Navigate(url.into())
    }

    /// Short name
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Click(_) => "click",
            Self::TypeText { .. } => "type_text",
            Self::Navigate(_) => "navigate",
            Self::ScrollIntoView(_) => "scroll_into_view",
            Self::UploadFile { .. } => "upload_file",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Click(chain) | Self::ScrollIntoView(chain) => {
                write!(f, "{} {chain}", self.name())
            }
            // typed text may be a credential; never print it
            Self::TypeText { target, .. } => write!(f, "type_text {target}"),
            Self::Navigate(url) => write!(f, "navigate {url}"),
            Self::UploadFile { target, path } => {
                write!(f, "upload_file {} -> {target}", path.display())
            }
        }
    }
}

// =============================================================================
// CONFIG
// =============================================================================

/// Defaults an executor applies to every action
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Base for relative navigation targets
    pub base_url: Option<String>,
    /// Element wait options
    pub wait: WaitOptions,
    /// Timeout for PageReady after navigation
    pub page_load_timeout: Duration,
    /// Retry policy for actions
    pub retry: RetryPolicy,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            wait: WaitOptions::default(),
            page_load_timeout: Duration::from_millis(DEFAULT_PAGE_LOAD_TIMEOUT_MS),
            retry: RetryPolicy::default(),
        }
    }
}

impl ExecutorConfig {
    /// Default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set base URL
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into().trim_end_matches('/').to_string());
        self
    }

    /// Set wait options
    #[must_use]
    pub const fn with_wait(mut self, wait: WaitOptions) -> Self {
        self.wait = wait;
        self
    }

    /// Set page-load timeout
    #[must_use]
    pub const fn with_page_load_timeout(mut self, timeout: Duration) -> Self {
        self.page_load_timeout = timeout;
        self
    }

    /// Set retry policy
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Resolve `url` against the base URL
    pub fn resolve_url(&self, url: &str) -> Result<String, Failure> {
        if url.starts_with("http://") || url.starts_with("https://") || url.starts_with("about:")
        {
            return Ok(url.to_string());
        }
        let Some(base) = self.base_url.as_deref() else {
            return Err(Failure::new(
                ErrorKind::NavigationFailed,
                format!("relative URL {url:?} but no base URL configured"),
            ));
        };
        if url.is_empty() {
            Ok(format!("{base}/"))
        } else if url.starts_with('/') {
            Ok(format!("{base}{url}"))
        } else {
            Ok(format!("{base}/{url}"))
        }
    }
}

// =============================================================================
// EXECUTOR
// =============================================================================

/// Performs actions against one session
pub struct ActionExecutor<'s> {
    session: &'s mut dyn BrowserSession,
    config: ExecutorConfig,
}

impl fmt::Debug for ActionExecutor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionExecutor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<'s> ActionExecutor<'s> {
    /// Executor over `session`
    pub fn new(session: &'s mut dyn BrowserSession, config: ExecutorConfig) -> Self {
        Self { session, config }
    }

    /// Executor defaults
    #[must_use]
    pub const fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Direct access to the session
    pub fn session(&mut self) -> &mut dyn BrowserSession {
        &mut *self.session
    }

    /// Fresh snapshot of the current page
    pub fn snapshot(&mut self) -> Result<Snapshot, Failure> {
        self.session.query_snapshot().map_err(Failure::from)
    }

    /// Perform an action with the executor defaults
    pub fn perform(&mut self, action: &Action) -> ActionResult {
        let wait = self.config.wait;
        let retry = self.config.retry.clone();
        self.perform_with(action, &wait, &retry)
    }

    /// Perform an action with explicit wait options and retry policy
    pub fn perform_with(
        &mut self,
        action: &Action,
        wait: &WaitOptions,
        retry: &RetryPolicy,
    ) -> ActionResult {
        debug!(%action, max_attempts = retry.max_attempts(), "performing action");
        let what = action.to_string();
        let result = match action {
            Action::Click(chain) => retry.execute(&what, |attempt| self.click_once(chain, wait, attempt)),
            Action::TypeText { target, text } => {
                retry.execute(&what, |_| self.type_once(target, text, wait))
            }
            Action::Navigate(url) => match self.config.resolve_url(url) {
                Ok(absolute) => retry.execute(&what, |_| self.navigate_once(&absolute, wait)),
                Err(failure) => ActionResult::failed(failure, Duration::ZERO),
            },
            Action::ScrollIntoView(chain) => retry.execute(&what, |_| self.scroll_once(chain, wait)),
            Action::UploadFile { target, path } => {
                retry.execute(&what, |_| self.upload_once(target, path, wait))
            }
        };
        debug!(
            %action,
            succeeded = result.succeeded,
            attempted = result.attempted,
            error = ?result.error,
            "action finished"
        );
        result
    }

    /// Wait for a condition with the default options and the given timeout
    pub fn wait_for(&mut self, condition: &Condition, timeout: Duration) -> ActionResult {
        let options = self.config.wait.with_timeout(timeout);
        let outcome = wait_until(self.session, condition, &options);
        if outcome.succeeded {
            ActionResult::ok(condition.describe(), outcome.elapsed)
        } else {
            let elapsed = outcome.elapsed;
            ActionResult::failed(wait_failure(condition, &outcome), elapsed)
        }
    }

    /// Evaluate a condition once against a fresh snapshot
    pub fn check(&mut self, condition: &Condition) -> ActionResult {
        let start = Instant::now();
        match self.session.query_snapshot() {
            Ok(snapshot) if evaluate(condition, &snapshot) => {
                ActionResult::ok(condition.describe(), start.elapsed())
            }
            Ok(snapshot) => ActionResult::failed(
                Failure::assertion(format!(
                    "expected {condition} on {}",
                    snapshot.url
                )),
                start.elapsed(),
            ),
            Err(err) => ActionResult::failed(err.into(), start.elapsed()),
        }
    }

    // -------------------------------------------------------------------------
    // single attempts
    // -------------------------------------------------------------------------

    fn await_element(
        &mut self,
        condition: &Condition,
        wait: &WaitOptions,
    ) -> Result<ElementHandle, Failure> {
        let outcome = wait_until(self.session, condition, wait);
        if outcome.succeeded {
            if let Some(target) = outcome.target {
                return Ok(target);
            }
        }
        Err(wait_failure(condition, &outcome))
    }

    fn dispatch(&mut self, interaction: Interaction) -> Result<(), Failure> {
        self.session.dispatch(interaction).map_err(Failure::from)
    }

    fn click_once(
        &mut self,
        chain: &LocatorChain,
        wait: &WaitOptions,
        attempt: u32,
    ) -> Result<Option<ExecutionStrategy>, Failure> {
        // a covered element still gets the direct click; interception falls back to script
        let element = self.await_element(&Condition::enabled(chain.clone()), wait)?;
        let handle = element.id;
        match self.session.dispatch(Interaction::Click {
            handle: handle.clone(),
        }) {
            Ok(()) => Ok(Some(ExecutionStrategy::Direct)),
            Err(err) if err.is_intercepted() => {
                debug!(%chain, attempt, error = %err, "direct click intercepted, using script click");
                self.dispatch(Interaction::ScriptClick { handle })?;
                Ok(Some(ExecutionStrategy::Script))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn type_once(
        &mut self,
        chain: &LocatorChain,
        text: &str,
        wait: &WaitOptions,
    ) -> Result<Option<ExecutionStrategy>, Failure> {
        let element = self.await_element(&Condition::editable(chain.clone()), wait)?;
        let handle = element.id;
        self.dispatch(Interaction::Clear {
            handle: handle.clone(),
        })?;
        self.dispatch(Interaction::SendKeys {
            handle: handle.clone(),
            text: text.to_string(),
        })?;

        let snapshot = self.snapshot()?;
        let Some(field) = snapshot.element(&handle) else {
            return Err(Failure::new(
                ErrorKind::StaleReference,
                format!("{chain} was replaced while typing"),
            ));
        };
        let actual = field.value.as_deref().unwrap_or_default();
        if actual == text {
            Ok(Some(ExecutionStrategy::Direct))
        } else {
            Err(Failure::not_interactable(format!(
                "{chain} holds {} characters after typing, expected {}",
                actual.chars().count(),
                text.chars().count()
            )))
        }
    }

    fn navigate_once(
        &mut self,
        url: &str,
        wait: &WaitOptions,
    ) -> Result<Option<ExecutionStrategy>, Failure> {
        self.session.navigate(url).map_err(Failure::from)?;
        let options = wait.with_timeout(self.config.page_load_timeout);
        let outcome = wait_until(self.session, &Condition::PageReady, &options);
        if outcome.succeeded {
            Ok(Some(ExecutionStrategy::Direct))
        } else {
            let kind = outcome.last_error.unwrap_or(ErrorKind::Timeout);
            Err(Failure::new(
                kind,
                format!("{url} did not finish loading within {:?}", options.timeout),
            ))
        }
    }

    fn scroll_once(
        &mut self,
        chain: &LocatorChain,
        wait: &WaitOptions,
    ) -> Result<Option<ExecutionStrategy>, Failure> {
        let element = self.await_element(&Condition::present(chain.clone()), wait)?;
        self.dispatch(Interaction::ScrollIntoView { handle: element.id })?;
        self.await_element(&Condition::visible(chain.clone()), wait)?;
        Ok(Some(ExecutionStrategy::Direct))
    }

    fn upload_once(
        &mut self,
        chain: &LocatorChain,
        path: &Path,
        wait: &WaitOptions,
    ) -> Result<Option<ExecutionStrategy>, Failure> {
        if !path.is_file() {
            return Err(Failure::assertion(format!(
                "upload source {} does not exist",
                path.display()
            )));
        }
        let element = self.await_element(&Condition::present(chain.clone()), wait)?;
        self.dispatch(Interaction::UploadFile {
            handle: element.id,
            path: path.to_path_buf(),
        })?;
        Ok(Some(ExecutionStrategy::Direct))
    }
}

/// Turn an unsuccessful wait into a classified failure.
///
/// Element conditions that timed out are split by the last snapshot: nothing
/// matched the chain (NotFound) or something matched but was not in the
/// required state (NotInteractable). Everything else keeps the wait's kind.
#[must_use]
pub fn wait_failure(condition: &Condition, outcome: &WaitOutcome) -> Failure {
    let kind = outcome.last_error.unwrap_or(ErrorKind::Timeout);
    let elapsed = outcome.elapsed;
    if kind == ErrorKind::Timeout {
        if let (Some(chain), Some(snapshot)) = (condition.chain(), outcome.last_snapshot.as_ref()) {
            return if resolve(chain, snapshot).is_none() {
                Failure::not_found(format!("no element matched {chain} within {elapsed:?}"))
            } else {
                Failure::not_interactable(format!(
                    "{chain} was found but never satisfied {condition} within {elapsed:?}"
                ))
            };
        }
    }
    Failure::new(kind, format!("{condition} not satisfied after {elapsed:?}"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::locator::Locator;
    use crate::retry::Backoff;
    use crate::scripted::{ElementBehavior, PageModel, ScriptedSession, SiteModel};

    fn config() -> ExecutorConfig {
        ExecutorConfig::new()
            .with_base_url("http://localhost:3000")
            .with_wait(
                WaitOptions::new()
                    .with_timeout(Duration::from_millis(150))
                    .with_poll_interval(Duration::from_millis(5)),
            )
            .with_page_load_timeout(Duration::from_millis(200))
            .with_retry(RetryPolicy::new(3).with_backoff(Backoff::fixed(Duration::from_millis(1))))
    }

    fn login_site() -> SiteModel {
        let mut site = SiteModel::new("http://localhost:3000")
            .page(
                "/login",
                PageModel::new("Login")
                    .with_not_ready_polls(2)
                    .element(
                        ElementHandle::new("email", "input")
                            .with_attr("type", "email")
                            .matching("input[type=email]"),
                    )
                    .element_with(
                        ElementHandle::new("password", "input").with_attr("name", "password"),
                        ElementBehavior::new().drop_keys(1),
                    )
                    .element_with(
                        ElementHandle::new("submit", "button").with_attr("type", "submit"),
                        ElementBehavior::new().navigates_to("/dashboard").intercept_clicks(1),
                    )
                    .element_with(
                        ElementHandle::new("terms", "a").with_text("Terms"),
                        ElementBehavior::new().offscreen(),
                    )
                    .element(
                        ElementHandle::new("avatar", "input")
                            .with_attr("type", "file")
                            .matching("input[type=file]"),
                    )
                    .element(
                        ElementHandle::new("locked", "button")
                            .with_attr("id", "locked")
                            .with_enabled(false),
                    ),
            )
            .page("/dashboard", PageModel::new("Dashboard"));
        site.start = Some("/login".to_string());
        site
    }

    mod url_tests {
        use super::*;

        #[test]
        fn test_resolve_relative_and_absolute() {
            let c = config();
            assert_eq!(c.resolve_url("/login").unwrap(), "http://localhost:3000/login");
            assert_eq!(c.resolve_url("forum").unwrap(), "http://localhost:3000/forum");
            assert_eq!(c.resolve_url("https://x.test/a").unwrap(), "https://x.test/a");
        }

        #[test]
        fn test_relative_without_base_fails() {
            let err = ExecutorConfig::new().resolve_url("/login").unwrap_err();
            assert_eq!(err.kind, ErrorKind::NavigationFailed);
        }
    }

    mod action_tests {
        use super::*;

        #[test]
        fn test_click_falls_back_to_script() {
            let mut session = ScriptedSession::new(login_site());
            let mut exec = ActionExecutor::new(&mut session, config());
            let chain = LocatorChain::single(Locator::css("button[type=submit]")).or(Locator::tag("button"));
            let r = exec.perform(&Action::click(chain));
            assert!(r.succeeded, "{r:?}");
            assert_eq!(r.strategy_used, Some(ExecutionStrategy::Script));
            assert_eq!(r.attempted, 1);
            assert_eq!(session.current_path(), Some("/dashboard"));
        }

        #[test]
        fn test_covered_element_clicked_by_script() {
            let mut site = SiteModel::new("http://localhost:3000")
                .page(
                    "/",
                    PageModel::new("Home").element_with(
                        ElementHandle::new("cta", "button")
                            .with_attr("id", "cta")
                            .obscured("div.toast"),
                        ElementBehavior::new().navigates_to("/next"),
                    ),
                )
                .page("/next", PageModel::new("Next"));
            site.start = Some("/".to_string());
            let mut session = ScriptedSession::new(site);
            let mut exec = ActionExecutor::new(&mut session, config());

            let r = exec.perform(&Action::click(Locator::id("cta")));
            assert!(r.succeeded, "{r:?}");
            assert_eq!(r.strategy_used, Some(ExecutionStrategy::Script));
            assert_eq!(r.attempted, 1);
            assert!(matches!(
                session.interactions(),
                [Interaction::Click { .. }, Interaction::ScriptClick { .. }]
            ));
            assert_eq!(session.current_path(), Some("/next"));
        }

        #[test]
        fn test_click_missing_element_is_not_found_and_not_retried() {
            let mut session = ScriptedSession::new(login_site());
            let mut exec = ActionExecutor::new(&mut session, config());
            let r = exec.perform(&Action::click(Locator::id("nope")));
            assert!(!r.succeeded);
            assert_eq!(r.error, Some(ErrorKind::NotFound));
            assert_eq!(r.attempted, 1);
            assert!(!r.retries_exhausted);
        }

        #[test]
        fn test_click_disabled_element_exhausts_retries() {
            let mut session = ScriptedSession::new(login_site());
            let mut exec = ActionExecutor::new(&mut session, config());
            let r = exec.perform(&Action::click(Locator::id("locked")));
            assert!(!r.succeeded);
            assert_eq!(r.error, Some(ErrorKind::NotInteractable));
            assert_eq!(r.attempted, 3);
            assert!(r.retries_exhausted);
        }

        #[test]
        fn test_type_text_retries_dropped_keys() {
            let mut session = ScriptedSession::new(login_site());
            let mut exec = ActionExecutor::new(&mut session, config());
            let r = exec.perform(&Action::type_text(Locator::name("password"), "s3cret"));
            assert!(r.succeeded, "{r:?}");
            assert_eq!(r.attempted, 2);
            assert!(!r.message.contains("s3cret"));
            assert_eq!(session.field_value("password"), Some("s3cret"));
        }

        #[test]
        fn test_type_text_uses_fallback_locator() {
            let mut session = ScriptedSession::new(login_site());
            let mut exec = ActionExecutor::new(&mut session, config());
            let chain = LocatorChain::single(Locator::name("email")).or(Locator::css("input[type=email]"));
            let r = exec.perform(&Action::type_text(chain, "test@example.com"));
            assert!(r.succeeded);
            assert_eq!(session.field_value("email"), Some("test@example.com"));
        }

        #[test]
        fn test_navigate_waits_for_page_ready() {
            let mut session = ScriptedSession::new(login_site());
            let mut exec = ActionExecutor::new(&mut session, config());
            let r = exec.perform(&Action::navigate("/login"));
            assert!(r.succeeded, "{r:?}");
            assert_eq!(session.navigations(), ["http://localhost:3000/login"]);
            // two loading snapshots, then ready
            assert!(session.queries() >= 3);
        }

        #[test]
        fn test_navigate_unknown_page_is_fatal() {
            let mut session = ScriptedSession::new(login_site());
            let mut exec = ActionExecutor::new(&mut session, config());
            let r = exec.perform(&Action::navigate("/missing"));
            assert_eq!(r.error, Some(ErrorKind::NavigationFailed));
            assert_eq!(r.attempted, 1);
        }

        #[test]
        fn test_scroll_into_view_reveals() {
            let mut session = ScriptedSession::new(login_site());
            let mut exec = ActionExecutor::new(&mut session, config());
            let r = exec.perform(&Action::ScrollIntoView(Locator::link_text("Terms").into()));
            assert!(r.succeeded, "{r:?}");
        }

        #[test]
        fn test_upload_file() {
            let dir = tempfile::tempdir().unwrap();
            let file = dir.path().join("notes.pdf");
            std::fs::write(&file, b"%PDF").unwrap();
            let mut session = ScriptedSession::new(login_site());
            let mut exec = ActionExecutor::new(&mut session, config());
            let r = exec.perform(&Action::UploadFile {
                target: LocatorChain::single(Locator::id("avatar"))
                    .or(Locator::css("input[type=file]")),
                path: file,
            });
            assert!(r.succeeded, "{r:?}");
            assert_eq!(session.field_value("avatar"), Some("notes.pdf"));
        }

        #[test]
        fn test_upload_missing_file_does_not_dispatch() {
            let mut session = ScriptedSession::new(login_site());
            let mut exec = ActionExecutor::new(&mut session, config());
            let r = exec.perform(&Action::UploadFile {
                target: Locator::tag("input").into(),
                path: PathBuf::from("/definitely/not/here.pdf"),
            });
            assert_eq!(r.error, Some(ErrorKind::AssertionViolated));
            assert_eq!(r.attempted, 1);
            assert!(session.interactions().is_empty());
        }
    }

    mod wait_and_check_tests {
        use super::*;

        #[test]
        fn test_wait_for_url_times_out() {
            let mut session = ScriptedSession::new(login_site());
            let mut exec = ActionExecutor::new(&mut session, config());
            let r = exec.wait_for(
                &Condition::url_matches("/dashboard").unwrap(),
                Duration::from_millis(30),
            );
            assert!(!r.succeeded);
            assert_eq!(r.error, Some(ErrorKind::Timeout));
        }

        #[test]
        fn test_check_is_single_evaluation() {
            let mut session = ScriptedSession::new(login_site());
            let mut exec = ActionExecutor::new(&mut session, config());
            let r = exec.check(&Condition::page_contains("Login"));
            assert!(r.succeeded);
            let r = exec.check(&Condition::page_contains("Welcome back"));
            assert_eq!(r.error, Some(ErrorKind::AssertionViolated));
            assert_eq!(session.queries(), 2);
        }
    }
}
