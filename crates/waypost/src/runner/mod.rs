//! Scenario execution.
//!
//! A [`ScenarioRunner`] owns one session for the duration of a scenario,
//! runs its steps in order and produces a [`ScenarioRecord`].
//! [`SuiteRunner`] fans scenarios out over worker threads, one session each.

mod record;
mod suite;

pub use record::{RecordBuilder, ScenarioRecord, ScenarioStatus, StepRecord, StepStatus};
pub use suite::{SessionFactory, SuiteRunner};

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::artifact::{ArtifactRef, ArtifactSink};
use crate::condition::Condition;
use crate::executor::{Action, ActionExecutor, ExecutorConfig};
use crate::result::{ErrorKind, Failure};
use crate::retry::ActionResult;
use crate::session::BrowserSession;

// =============================================================================
// CANCELLATION
// =============================================================================

/// Cooperative cancellation signal, checked between steps
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Fresh, unraised token
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the signal
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether the signal has been raised
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// =============================================================================
// STEPS
// =============================================================================

/// Step body implemented by caller code
pub type StepFn = Box<dyn FnMut(&mut ActionExecutor<'_>) -> ActionResult + Send>;

/// What a step does
pub enum StepBody {
    /// Perform an action
    Action(Action),
    /// Wait for a condition (step timeout, else the default wait timeout)
    WaitFor(Condition),
    /// Evaluate a condition once
    Assert(Condition),
    /// Arbitrary caller code
    Custom(StepFn),
}

impl fmt::Debug for StepBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Action(a) => f.debug_tuple("Action").field(a).finish(),
            Self::WaitFor(c) => f.debug_tuple("WaitFor").field(c).finish(),
            Self::Assert(c) => f.debug_tuple("Assert").field(c).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// A named scenario step
#[derive(Debug)]
pub struct Step {
    /// Step name
    pub name: String,
    /// Failure aborts the scenario
    pub critical: bool,
    /// Overrides the default wait timeout for this step
    pub timeout: Option<Duration>,
    /// What to do
    pub body: StepBody,
}

impl Step {
    /// Step with an explicit body
    pub fn new(name: impl Into<String>, body: StepBody) -> Self {
        Self {
            name: name.into(),
            critical: false,
            timeout: None,
            body,
        }
    }

    /// Action step
    pub fn action(name: impl Into<String>, action: Action) -> Self {
        Self::new(name, StepBody::Action(action))
    }

    /// Wait step
    pub fn wait_for(name: impl Into<String>, condition: Condition, timeout: Duration) -> Self {
        Self::new(name, StepBody::WaitFor(condition)).with_timeout(timeout)
    }

    /// Assertion step
    pub fn assert(name: impl Into<String>, condition: Condition) -> Self {
        Self::new(name, StepBody::Assert(condition))
    }

    /// Step running caller code that reports an [`ActionResult`]
    pub fn custom<F>(name: impl Into<String>, f: F) -> Self
    where
        F: FnMut(&mut ActionExecutor<'_>) -> ActionResult + Send + 'static,
    {
        Self::new(name, StepBody::Custom(Box::new(f)))
    }

    /// Step running caller code that reports a plain boolean
    pub fn check<F>(name: impl Into<String>, mut f: F) -> Self
    where
        F: FnMut(&mut ActionExecutor<'_>) -> bool + Send + 'static,
    {
        let label: String = name.into();
        let message = label.clone();
        Self::custom(label, move |exec| {
            let start = Instant::now();
            if f(exec) {
                ActionResult::ok(message.clone(), start.elapsed())
            } else {
                ActionResult::failed(
                    Failure::assertion(format!("check {message:?} returned false")),
                    start.elapsed(),
                )
            }
        })
    }

    /// Mark as critical
    #[must_use]
    pub const fn critical(mut self) -> Self {
        self.critical = true;
        self
    }

    /// Set critical flag
    #[must_use]
    pub const fn with_critical(mut self, critical: bool) -> Self {
        self.critical = critical;
        self
    }

    /// Set a per-step timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// An ordered list of steps with an optional overall deadline
#[derive(Debug)]
pub struct Scenario {
    /// Scenario name
    pub name: String,
    /// Steps in execution order
    pub steps: Vec<Step>,
    /// Abort remaining steps once this much time has passed
    pub deadline: Option<Duration>,
}

impl Scenario {
    /// Empty scenario
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            deadline: None,
        }
    }

    /// Append a step
    #[must_use]
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Set the scenario deadline
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

// =============================================================================
// RUNNER
// =============================================================================

/// Runs scenarios against one exclusively owned session
pub struct ScenarioRunner<'s> {
    session: &'s mut dyn BrowserSession,
    config: ExecutorConfig,
    artifacts: Option<Arc<dyn ArtifactSink>>,
    cancel: CancelToken,
}

impl fmt::Debug for ScenarioRunner<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScenarioRunner")
            .field("config", &self.config)
            .field("artifacts", &self.artifacts.is_some())
            .field("cancel", &self.cancel)
            .finish_non_exhaustive()
    }
}

impl<'s> ScenarioRunner<'s> {
    /// Runner over `session`; artifacts disabled
    pub fn new(session: &'s mut dyn BrowserSession, config: ExecutorConfig) -> Self {
        Self {
            session,
            config,
            artifacts: None,
            cancel: CancelToken::new(),
        }
    }

    /// Capture artifacts on failure into `sink`
    #[must_use]
    pub fn with_artifacts(mut self, sink: Arc<dyn ArtifactSink>) -> Self {
        self.artifacts = Some(sink);
        self
    }

    /// Observe `token` between steps
    #[must_use]
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token this runner observes
    #[must_use]
    pub const fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Run every step of `scenario` and finalize its record
    pub fn run(&mut self, mut scenario: Scenario) -> ScenarioRecord {
        let started = Instant::now();
        let deadline = scenario.deadline.map(|d| started + d);
        let mut builder = RecordBuilder::start(scenario.name.clone());
        let name = scenario.name.clone();
        info!(scenario = %name, run_id = %builder.run_id(), steps = scenario.steps.len(), "scenario started");

        let mut exec = ActionExecutor::new(&mut *self.session, self.config.clone());
        let mut status = ScenarioStatus::Passed;

        for step in &mut scenario.steps {
            if self.cancel.is_cancelled() {
                info!(scenario = %name, before = %step.name, "scenario cancelled");
                status = ScenarioStatus::Cancelled;
                break;
            }
            let remaining = match deadline {
                Some(at) => {
                    let now = Instant::now();
                    if now >= at {
                        warn!(scenario = %name, before = %step.name, "scenario deadline exceeded");
                        status = ScenarioStatus::DeadlineExceeded;
                        break;
                    }
                    Some(at - now)
                }
                None => None,
            };

            let outcome = run_step(&mut exec, step, remaining);
            let step_status = if outcome.succeeded {
                StepStatus::Succeeded
            } else if outcome.error == Some(ErrorKind::Cancelled) {
                StepStatus::Cancelled
            } else {
                StepStatus::Failed
            };

            let artifact = match (&self.artifacts, step_status) {
                (Some(sink), StepStatus::Failed | StepStatus::Cancelled) => {
                    capture(exec.session(), sink.as_ref(), &name, &step.name)
                }
                _ => None,
            };

            if step_status.is_succeeded() {
                info!(scenario = %name, step = %step.name, elapsed = ?outcome.elapsed, "step succeeded");
            } else {
                warn!(
                    scenario = %name,
                    step = %step.name,
                    critical = step.critical,
                    error = ?outcome.error,
                    message = %outcome.message,
                    "step failed"
                );
            }

            builder.push(StepRecord {
                name: step.name.clone(),
                critical: step.critical,
                status: step_status,
                outcome,
                artifact,
            });

            match step_status {
                StepStatus::Succeeded => {}
                StepStatus::Cancelled => {
                    status = ScenarioStatus::Cancelled;
                    break;
                }
                StepStatus::Failed => {
                    status = ScenarioStatus::Failed;
                    if step.critical {
                        warn!(scenario = %name, step = %step.name, "critical step failed, aborting scenario");
                        break;
                    }
                }
            }
        }

        let record = builder.finish(status, started.elapsed());
        info!(scenario = %name, status = %record.status(), steps = record.steps().len(), "scenario finished");
        record
    }
}

fn run_step(exec: &mut ActionExecutor<'_>, step: &mut Step, remaining: Option<Duration>) -> ActionResult {
    let cap = |t: Duration| remaining.map_or(t, |r| t.min(r));
    let timeout = cap(step.timeout.unwrap_or(exec.config().wait.timeout));
    match &mut step.body {
        StepBody::Action(action) => {
            let wait = exec.config().wait.with_timeout(timeout);
            let retry = exec.config().retry.clone();
            exec.perform_with(action, &wait, &retry)
        }
        StepBody::WaitFor(condition) => exec.wait_for(condition, timeout),
        StepBody::Assert(condition) => exec.check(condition),
        StepBody::Custom(f) => f(exec),
    }
}

fn capture(
    session: &mut dyn BrowserSession,
    sink: &dyn ArtifactSink,
    scenario: &str,
    step: &str,
) -> Option<ArtifactRef> {
    let image = match session.capture_artifact() {
        Ok(image) => image,
        Err(err) => {
            warn!(scenario, step, error = %err, "artifact capture failed");
            return None;
        }
    };
    match sink.save(&format!("{scenario}_{step}"), &image.data) {
        Ok(reference) => {
            info!(scenario, step, path = %reference.path.display(), "artifact saved");
            Some(reference)
        }
        Err(err) => {
            warn!(scenario, step, error = %err, "artifact could not be saved");
            None
        }
    }
}
