//! Terminal output for scenario runs

use console::{style, Style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use waypost::{ScenarioRecord, StepStatus, SuiteSummary};

/// Prints progress and results to stderr
#[derive(Debug)]
pub struct ProgressReporter {
    term: Term,
    progress_bar: Option<ProgressBar>,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl ProgressReporter {
    /// Create a new progress reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            progress_bar: None,
            use_color,
            quiet,
        }
    }

    /// Start a progress bar over `total` scenarios
    pub fn start_progress(&mut self, total: u64, message: &str) {
        if self.quiet {
            return;
        }

        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        pb.set_message(message.to_string());
        self.progress_bar = Some(pb);
    }

    /// A scenario finished; safe to call from worker threads
    pub fn scenario_finished(&self, record: &ScenarioRecord) {
        if let Some(ref pb) = self.progress_bar {
            pb.set_message(record.scenario().to_string());
            pb.inc(1);
        }
    }

    /// Clear the progress bar
    pub fn finish(&self) {
        if let Some(ref pb) = self.progress_bar {
            pb.finish_and_clear();
        }
    }

    fn prefix(&self, glyph: &str, plain: &str, color: fn(Style) -> Style) -> String {
        if self.use_color {
            color(Style::new()).bold().apply_to(glyph).to_string()
        } else {
            plain.to_string()
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = self.prefix("✓", "PASS", Style::green);
        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print a failure message, even in quiet mode
    pub fn failure(&self, message: &str) {
        let prefix = self.prefix("✗", "FAIL", Style::red);
        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = self.prefix("⚠", "WARN", Style::yellow);
        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// One line per scenario, plus one per failed step
    pub fn record(&self, record: &ScenarioRecord) {
        if record.status().is_passed() {
            self.success(&record.summary());
            return;
        }
        self.failure(&record.summary());
        if let Some(error) = record.error() {
            let _ = self.term.write_line(&format!("    {error}"));
        }
        for step in record.steps().iter().filter(|s| s.status != StepStatus::Succeeded) {
            let kind = step
                .outcome
                .error
                .map_or_else(|| step.status.to_string(), |k| k.to_string());
            let mut line = format!("    {} [{kind}] {}", step.name, step.outcome.message);
            if let Some(artifact) = &step.artifact {
                line.push_str(&format!(" (artifact: {})", artifact.path.display()));
            }
            let _ = self.term.write_line(&line);
        }
    }

    /// Final suite line
    pub fn summary(&self, summary: &SuiteSummary) {
        if self.quiet && summary.all_passed() {
            return;
        }
        let _ = self.term.write_line("");
        let secs = summary.total_duration().as_secs_f64();
        let status = if summary.all_passed() { "PASSED" } else { "FAILED" };
        let status = if self.use_color {
            let color = if summary.all_passed() { Style::new().green() } else { Style::new().red() };
            color.bold().apply_to(status).to_string()
        } else {
            status.to_string()
        };
        let _ = self.term.write_line(&format!(
            "{status} {} in {secs:.2}s",
            summary.summary()
        ));
    }

    /// Print a check result for one file
    pub fn checked(&self, path: &str, result: Result<usize, String>) {
        match result {
            Ok(steps) => self.success(&format!("{path} ({steps} steps)")),
            Err(message) => {
                self.failure(path);
                let _ = self.term.write_line(&format!("    {}", style(message).dim()));
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::time::Duration;
    use waypost::{ActionResult, Failure, RecordBuilder, ScenarioStatus, StepRecord};

    fn failed_record() -> ScenarioRecord {
        let mut b = RecordBuilder::start("login");
        b.push(StepRecord {
            name: "submit".into(),
            critical: true,
            status: StepStatus::Failed,
            outcome: ActionResult::failed(Failure::not_found("no button"), Duration::from_millis(5)),
            artifact: None,
        });
        b.finish(ScenarioStatus::Failed, Duration::from_millis(5))
    }

    #[test]
    fn test_new_reporter() {
        let reporter = ProgressReporter::new(false, true);
        assert!(!reporter.use_color);
        assert!(reporter.quiet);
        assert!(ProgressReporter::default().use_color);
    }

    #[test]
    fn test_record_and_summary_do_not_panic() {
        let reporter = ProgressReporter::new(false, false);
        let record = failed_record();
        reporter.record(&record);
        reporter.summary(&SuiteSummary::from_records("suite", &[record]));
        reporter.checked("a.yaml", Ok(3));
        reporter.checked("b.yaml", Err("bad".into()));
    }

    #[test]
    fn test_progress_lifecycle() {
        let mut reporter = ProgressReporter::new(false, false);
        reporter.start_progress(2, "running");
        reporter.scenario_finished(&failed_record());
        reporter.finish();

        let mut quiet = ProgressReporter::new(false, true);
        quiet.start_progress(2, "running");
        assert!(quiet.progress_bar.is_none());
    }
}
