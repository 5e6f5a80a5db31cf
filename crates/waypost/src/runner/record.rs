//! Scenario records.
//!
//! A [`ScenarioRecord`] is assembled step by step while a scenario runs and
//! can only be created by finalizing a [`RecordBuilder`]. Once built it has
//! no mutators.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

use crate::artifact::ArtifactRef;
use crate::result::duration_ms;
use crate::retry::ActionResult;

/// Terminal state of one step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Step took effect
    Succeeded,
    /// Step failed; the outcome carries the kind
    Failed,
    /// Step was interrupted by cancellation
    Cancelled,
}

impl StepStatus {
    /// Check if status is succeeded
    #[must_use]
    pub const fn is_succeeded(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    /// Check if status is failed
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed)
    }

    /// Stable snake_case name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal state of a scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioStatus {
    /// Every step succeeded
    Passed,
    /// At least one step failed
    Failed,
    /// Stopped by a cancellation signal
    Cancelled,
    /// Scenario deadline passed before all steps ran
    DeadlineExceeded,
}

impl ScenarioStatus {
    /// Check if status is passing
    #[must_use]
    pub const fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }

    /// Stable snake_case name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::DeadlineExceeded => "deadline_exceeded",
        }
    }
}

impl fmt::Display for ScenarioStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One executed step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Step name
    pub name: String,
    /// Whether failure aborts the scenario
    pub critical: bool,
    /// Terminal state
    pub status: StepStatus,
    /// What happened
    pub outcome: ActionResult,
    /// Diagnostic capture taken on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<ArtifactRef>,
}

/// Finalized result of one scenario run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioRecord {
    run_id: Uuid,
    scenario: String,
    status: ScenarioStatus,
    started_at: String,
    #[serde(rename = "duration_ms", with = "duration_ms")]
    duration: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    steps: Vec<StepRecord>,
}

impl ScenarioRecord {
    /// Unique id of this run
    #[must_use]
    pub const fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Scenario name
    #[must_use]
    pub fn scenario(&self) -> &str {
        &self.scenario
    }

    /// Final status
    #[must_use]
    pub const fn status(&self) -> ScenarioStatus {
        self.status
    }

    /// RFC 3339 start time
    #[must_use]
    pub fn started_at(&self) -> &str {
        &self.started_at
    }

    /// Wall time of the run
    #[must_use]
    pub const fn duration(&self) -> Duration {
        self.duration
    }

    /// Why the scenario could not run at all, if it could not
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Steps in execution order
    #[must_use]
    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    /// Steps that failed
    #[must_use]
    pub fn failures(&self) -> Vec<&StepRecord> {
        self.steps.iter().filter(|s| s.status.is_failed()).collect()
    }

    /// Every artifact captured during the run
    pub fn artifacts(&self) -> impl Iterator<Item = &ArtifactRef> {
        self.steps.iter().filter_map(|s| s.artifact.as_ref())
    }

    /// Number of succeeded steps
    #[must_use]
    pub fn succeeded_count(&self) -> usize {
        self.steps.iter().filter(|s| s.status.is_succeeded()).count()
    }

    /// One-line summary
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{}: {}/{} steps succeeded ({})",
            self.scenario,
            self.succeeded_count(),
            self.steps.len(),
            self.status
        )
    }
}

/// Append-only builder for a [`ScenarioRecord`]
#[derive(Debug)]
pub struct RecordBuilder {
    run_id: Uuid,
    scenario: String,
    started_at: String,
    steps: Vec<StepRecord>,
}

impl RecordBuilder {
    /// Start a record for `scenario`
    #[must_use]
    pub fn start(scenario: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            scenario: scenario.into(),
            started_at: chrono::Utc::now().to_rfc3339(),
            steps: Vec::new(),
        }
    }

    /// Run id assigned at start
    #[must_use]
    pub const fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Append a step
    pub fn push(&mut self, step: StepRecord) {
        self.steps.push(step);
    }

    /// Steps appended so far
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Nothing appended yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Finalize
    #[must_use]
    pub fn finish(self, status: ScenarioStatus, duration: Duration) -> ScenarioRecord {
        ScenarioRecord {
            run_id: self.run_id,
            scenario: self.scenario,
            status,
            started_at: self.started_at,
            duration,
            error: None,
            steps: self.steps,
        }
    }

    /// Finalize a scenario that could not start
    #[must_use]
    pub fn abort(self, message: impl Into<String>, duration: Duration) -> ScenarioRecord {
        ScenarioRecord {
            error: Some(message.into()),
            ..self.finish(ScenarioStatus::Failed, duration)
        }
    }
}
