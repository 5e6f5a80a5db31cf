//! Waypost: element-wait and retry engine for browser-driven end-to-end tests
//!
//! Waypost sits between test scenarios and a browser session. It resolves
//! ordered locator chains, waits for typed conditions by polling, performs
//! actions with bounded retries and classified failures, and runs scenarios
//! into structured records.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌────────────────┐   ┌──────────────┐   ┌────────────────┐
//! │ Scenario     │──►│ ScenarioRunner │──►│ Action       │──►│ BrowserSession │
//! │ (YAML/Rust)  │   │ (steps, cancel │   │ Executor     │   │ (scripted or   │
//! │              │   │  deadline)     │   │ wait + retry │   │  real backend) │
//! └──────────────┘   └───────┬────────┘   └──────────────┘   └────────────────┘
//!                            ▼
//!                    ScenarioRecord ──► ReportSink / ArtifactSink
//! ```
//!
//! # Example
//!
//! ```
//! use waypost::prelude::*;
//! use std::time::Duration;
//!
//! let site = SiteModel::new("http://app.test")
//!     .page("/", PageModel::new("Home").with_body_text("Welcome"));
//! let mut session = ScriptedSession::new(site);
//! let scenario = Scenario::new("home")
//!     .step(Step::action("open", Action::navigate("/")).critical())
//!     .step(Step::wait_for("greeting", Condition::page_contains("Welcome"), Duration::from_secs(1)));
//!
//! let config = ExecutorConfig::new().with_base_url("http://app.test");
//! let record = ScenarioRunner::new(&mut session, config).run(scenario);
//! assert!(record.status().is_passed());
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

mod artifact;
/// Conditions over page snapshots
pub mod condition;
mod config;
mod executor;
/// Locators and ordered fallback chains
pub mod locator;
mod reporter;
mod result;
mod retry;
/// Scenario execution
pub mod runner;
mod scenario_file;
mod scripted;
mod session;
mod snapshot;
mod wait;

pub use artifact::{sanitize_name, sha256_hex, ArtifactRef, ArtifactSink, FsArtifactSink, MemoryArtifactSink};
pub use condition::{Condition, TextScope, UrlPattern};
pub use config::{ArtifactSettings, Credentials, RetrySettings, RunConfig};
pub use executor::{
    wait_failure, Action, ActionExecutor, ExecutorConfig, DEFAULT_PAGE_LOAD_TIMEOUT_MS,
};
pub use locator::{Locator, LocatorChain, Resolution, Strategy};
pub use reporter::{JsonReporter, ReportSink, SuiteSummary};
pub use result::{ErrorKind, Failure, FailureClass, SessionError, WaypostError, WaypostResult};
pub use retry::{ActionResult, Backoff, Classifier, ExecutionStrategy, RetryOutcome, RetryPolicy};
pub use runner::{
    CancelToken, RecordBuilder, Scenario, ScenarioRecord, ScenarioRunner, ScenarioStatus,
    SessionFactory, Step, StepBody, StepFn, StepRecord, StepStatus, SuiteRunner,
};
pub use scenario_file::{Placeholders, ScenarioFile, StepKind, StepSpec};
pub use scripted::{ElementBehavior, ElementModel, PageModel, ScriptedSession, SiteModel};
pub use session::{BrowserSession, Capture, Interaction};
pub use snapshot::{ElementHandle, ReadyState, Snapshot};
pub use wait::{
    wait_until, WaitEngine, WaitOptions, WaitOutcome, DEFAULT_MAX_POLL_INTERVAL_MS,
    DEFAULT_POLL_INTERVAL_MS, DEFAULT_WAIT_TIMEOUT_MS, MAX_SETTLE_DELAY,
};

/// Common imports for writing scenarios
pub mod prelude {
    pub use super::artifact::*;
    pub use super::condition::{Condition, TextScope, UrlPattern};
    pub use super::config::*;
    pub use super::executor::*;
    pub use super::locator::{Locator, LocatorChain, Strategy};
    pub use super::reporter::*;
    pub use super::result::{ErrorKind, Failure, FailureClass, SessionError, WaypostError, WaypostResult};
    pub use super::retry::*;
    pub use super::runner::*;
    pub use super::scenario_file::*;
    pub use super::scripted::*;
    pub use super::session::*;
    pub use super::snapshot::*;
    pub use super::wait::*;
}
