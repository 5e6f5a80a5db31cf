//! Reporting of scenario records.
//!
//! Reporting is a side channel: a [`ReportSink`] error is logged by callers
//! and never changes a scenario's status.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::artifact::sanitize_name;
use crate::result::{WaypostError, WaypostResult};
use crate::runner::{ScenarioRecord, ScenarioStatus};

/// Consumer of finished scenario records
pub trait ReportSink: Send + Sync {
    /// Accept one record
    fn submit(&self, record: &ScenarioRecord) -> WaypostResult<()>;
}

/// Writes one pretty JSON file per record: `<dir>/<scenario>-<run id>.json`
#[derive(Debug, Clone)]
pub struct JsonReporter {
    dir: PathBuf,
}

impl JsonReporter {
    /// Reporter writing into `dir` (created on first submit)
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Output directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File a record is written to
    #[must_use]
    pub fn path_for(&self, record: &ScenarioRecord) -> PathBuf {
        self.dir.join(format!(
            "{}-{}.json",
            sanitize_name(record.scenario()),
            record.run_id()
        ))
    }
}

impl ReportSink for JsonReporter {
    fn submit(&self, record: &ScenarioRecord) -> WaypostResult<()> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            WaypostError::config(format!("cannot create {}: {e}", self.dir.display()))
        })?;
        let path = self.path_for(record);
        std::fs::write(&path, serde_json::to_string_pretty(record)?)?;
        debug!(path = %path.display(), scenario = record.scenario(), "report written");
        Ok(())
    }
}

// =============================================================================
// SUMMARY
// =============================================================================

/// Aggregate view over a suite's records
#[derive(Debug, Clone, Serialize)]
pub struct SuiteSummary {
    suite_name: String,
    passed: usize,
    failed: usize,
    cancelled: usize,
    deadline_exceeded: usize,
    #[serde(rename = "duration_ms", with = "crate::result::duration_ms")]
    duration: Duration,
}

impl SuiteSummary {
    /// Summarize `records`
    #[must_use]
    pub fn from_records(suite_name: impl Into<String>, records: &[ScenarioRecord]) -> Self {
        let count = |status: ScenarioStatus| records.iter().filter(|r| r.status() == status).count();
        Self {
            suite_name: suite_name.into(),
            passed: count(ScenarioStatus::Passed),
            failed: count(ScenarioStatus::Failed),
            cancelled: count(ScenarioStatus::Cancelled),
            deadline_exceeded: count(ScenarioStatus::DeadlineExceeded),
            duration: records.iter().map(ScenarioRecord::duration).sum(),
        }
    }

    /// Scenarios that passed
    #[must_use]
    pub const fn passed_count(&self) -> usize {
        self.passed
    }

    /// Scenarios that did not pass, whatever the reason
    #[must_use]
    pub const fn failed_count(&self) -> usize {
        self.failed + self.cancelled + self.deadline_exceeded
    }

    /// Total scenarios
    #[must_use]
    pub const fn total_count(&self) -> usize {
        self.passed + self.failed_count()
    }

    /// Fraction passed; 1.0 for an empty suite
    #[must_use]
    pub fn pass_rate(&self) -> f64 {
        if self.total_count() == 0 {
            return 1.0;
        }
        self.passed as f64 / self.total_count() as f64
    }

    /// Every scenario passed
    #[must_use]
    pub const fn all_passed(&self) -> bool {
        self.failed_count() == 0
    }

    /// Sum of scenario durations
    #[must_use]
    pub const fn total_duration(&self) -> Duration {
        self.duration
    }

    /// One-line summary
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{}: {}/{} passed ({:.1}%)",
            self.suite_name,
            self.passed_count(),
            self.total_count(),
            self.pass_rate() * 100.0
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::result::Failure;
    use crate::retry::ActionResult;
    use crate::runner::{RecordBuilder, StepRecord, StepStatus};

    fn record(name: &str, status: ScenarioStatus) -> ScenarioRecord {
        let mut b = RecordBuilder::start(name);
        let outcome = if status.is_passed() {
            ActionResult::ok("open", Duration::from_millis(3))
        } else {
            ActionResult::failed(Failure::timeout("slow"), Duration::from_millis(3))
        };
        b.push(StepRecord {
            name: "open".into(),
            critical: true,
            status: if status.is_passed() { StepStatus::Succeeded } else { StepStatus::Failed },
            outcome,
            artifact: None,
        });
        b.finish(status, Duration::from_millis(100))
    }

    mod json_reporter_tests {
        use super::*;

        #[test]
        fn test_writes_one_file_per_record() {
            let dir = tempfile::tempdir().unwrap();
            let reporter = JsonReporter::new(dir.path().join("reports"));
            let a = record("login flow", ScenarioStatus::Passed);
            let b = record("login flow", ScenarioStatus::Failed);
            reporter.submit(&a).unwrap();
            reporter.submit(&b).unwrap();

            let path = reporter.path_for(&a);
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            assert!(name.starts_with("login_flow-"));
            assert!(name.ends_with(".json"));
            assert_ne!(path, reporter.path_for(&b));

            let back: ScenarioRecord =
                serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
            assert_eq!(back, a);
        }
    }

    mod summary_tests {
        use super::*;

        #[test]
        fn test_counts_and_rate() {
            let records = vec![
                record("a", ScenarioStatus::Passed),
                record("b", ScenarioStatus::Failed),
                record("c", ScenarioStatus::Passed),
                record("d", ScenarioStatus::Cancelled),
            ];
            let s = SuiteSummary::from_records("smoke", &records);
            assert_eq!(s.passed_count(), 2);
            assert_eq!(s.failed_count(), 2);
            assert!(!s.all_passed());
            assert_eq!(s.total_duration(), Duration::from_millis(400));
            assert_eq!(s.summary(), "smoke: 2/4 passed (50.0%)");
        }

        #[test]
        fn test_empty_suite_passes() {
            let s = SuiteSummary::from_records("none", &[]);
            assert!(s.all_passed());
            assert!((s.pass_rate() - 1.0).abs() < f64::EPSILON);
        }
    }
}
