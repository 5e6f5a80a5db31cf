//! Parallel-by-session scenario execution.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tracing::{debug, warn};

use super::{CancelToken, RecordBuilder, Scenario, ScenarioRecord, ScenarioRunner};
use crate::artifact::ArtifactSink;
use crate::executor::ExecutorConfig;
use crate::result::WaypostResult;
use crate::session::BrowserSession;

/// Creates one fresh session per scenario
pub trait SessionFactory: Sync {
    /// Open a session for the named scenario
    fn create(&self, scenario: &str) -> WaypostResult<Box<dyn BrowserSession>>;
}

impl<F> SessionFactory for F
where
    F: Fn(&str) -> WaypostResult<Box<dyn BrowserSession>> + Sync,
{
    fn create(&self, scenario: &str) -> WaypostResult<Box<dyn BrowserSession>> {
        self(scenario)
    }
}

/// Runs many scenarios on worker threads, each with its own session.
///
/// Only the configuration, the artifact sink and the cancel token are shared.
pub struct SuiteRunner {
    config: ExecutorConfig,
    artifacts: Option<Arc<dyn ArtifactSink>>,
    workers: usize,
    cancel: CancelToken,
}

impl fmt::Debug for SuiteRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SuiteRunner")
            .field("config", &self.config)
            .field("artifacts", &self.artifacts.is_some())
            .field("workers", &self.workers)
            .finish_non_exhaustive()
    }
}

impl SuiteRunner {
    /// Suite runner with a single worker
    #[must_use]
    pub fn new(config: ExecutorConfig) -> Self {
        Self {
            config,
            artifacts: None,
            workers: 1,
            cancel: CancelToken::new(),
        }
    }

    /// Number of scenarios run at once
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Capture artifacts on failure
    #[must_use]
    pub fn with_artifacts(mut self, sink: Arc<dyn ArtifactSink>) -> Self {
        self.artifacts = Some(sink);
        self
    }

    /// Share a cancel token with every scenario
    #[must_use]
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Run all scenarios; records come back in input order
    pub fn run_all(
        &self,
        scenarios: Vec<Scenario>,
        factory: &dyn SessionFactory,
    ) -> Vec<ScenarioRecord> {
        self.run_all_with(scenarios, factory, &|_| {})
    }

    /// Like [`run_all`](Self::run_all), calling `on_done` as each scenario finishes
    pub fn run_all_with(
        &self,
        scenarios: Vec<Scenario>,
        factory: &dyn SessionFactory,
        on_done: &(dyn Fn(&ScenarioRecord) + Sync),
    ) -> Vec<ScenarioRecord> {
        let total = scenarios.len();
        let workers = self.workers.min(total.max(1));
        debug!(total, workers, "running suite");

        let queue: Mutex<VecDeque<(usize, Scenario)>> =
            Mutex::new(scenarios.into_iter().enumerate().collect());
        let results: Mutex<Vec<Option<ScenarioRecord>>> = Mutex::new((0..total).map(|_| None).collect());

        std::thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| loop {
                    let next = queue
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .pop_front();
                    let Some((index, scenario)) = next else {
                        break;
                    };
                    let record = self.run_one(scenario, factory);
                    on_done(&record);
                    results.lock().unwrap_or_else(PoisonError::into_inner)[index] = Some(record);
                });
            }
        });

        results
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .into_iter()
            .flatten()
            .collect()
    }

    fn run_one(&self, scenario: Scenario, factory: &dyn SessionFactory) -> ScenarioRecord {
        let started = Instant::now();
        match factory.create(&scenario.name) {
            Ok(mut session) => {
                let mut runner = ScenarioRunner::new(session.as_mut(), self.config.clone())
                    .with_cancel_token(self.cancel.clone());
                if let Some(sink) = &self.artifacts {
                    runner = runner.with_artifacts(Arc::clone(sink));
                }
                runner.run(scenario)
            }
            Err(err) => {
                warn!(scenario = %scenario.name, error = %err, "could not open session");
                RecordBuilder::start(scenario.name).abort(err.to_string(), started.elapsed())
            }
        }
    }
}
