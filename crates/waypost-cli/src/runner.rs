//! Command implementations

use std::path::PathBuf;
use tracing::{info, warn};
use waypost::{
    BrowserSession, JsonReporter, ReportSink, RunConfig, Scenario, ScenarioFile, ScriptedSession,
    SiteModel, SuiteRunner, SuiteSummary, WaypostResult,
};

use crate::commands::{CheckArgs, ConfigArgs, ConfigFormat, RunArgs};
use crate::error::{CliError, CliResult};
use crate::output::ProgressReporter;

/// Resolve configuration and apply `run` flag overrides
pub fn resolve_config(args: &RunArgs) -> CliResult<RunConfig> {
    let mut config = RunConfig::resolve(args.config.as_deref())?;
    if let Some(base_url) = &args.base_url {
        config.base_url.clone_from(base_url);
    }
    if let Some(timeout) = args.timeout_ms {
        config.timeout_ms = timeout;
    }
    if let Some(attempts) = args.retry_attempts {
        config.retry.max_attempts = attempts;
    }
    if args.headless {
        config.headless = true;
    }
    if args.no_artifacts {
        config.artifacts.on_failure = false;
    }
    config.validate()?;
    Ok(config)
}

fn compile_all(paths: &[PathBuf], config: &RunConfig) -> CliResult<Vec<Scenario>> {
    let vars = config.placeholders();
    paths
        .iter()
        .map(|path| -> CliResult<Scenario> {
            let file = ScenarioFile::load(path)?;
            // each scenario gets its own ${unique}
            Ok(file.compile(&vars.refreshed())?)
        })
        .collect()
}

/// `waypost run`: returns whether every scenario passed
pub fn run(args: &RunArgs, reporter: &mut ProgressReporter) -> CliResult<bool> {
    if args.jobs == 0 {
        return Err(CliError::invalid_argument("--jobs must be at least 1"));
    }
    let config = resolve_config(args)?;
    let scenarios = compile_all(&args.scenarios, &config)?;

    let Some(site_path) = &args.site else {
        return Err(CliError::backend(
            "no live browser backend is built in; pass --site FILE to run against a site model",
        ));
    };
    let mut site = SiteModel::load(site_path)?;
    if site.base_url.is_empty() {
        site.base_url = config.base_url.trim_end_matches('/').to_string();
    }
    info!(
        scenarios = scenarios.len(),
        jobs = args.jobs,
        site = %site_path.display(),
        headless = config.headless,
        "starting run"
    );

    let mut suite = SuiteRunner::new(config.executor_config()).with_workers(args.jobs);
    if let Some(sink) = config.artifact_sink() {
        suite = suite.with_artifacts(sink);
    }
    let factory = |_: &str| -> WaypostResult<Box<dyn BrowserSession>> {
        Ok(Box::new(ScriptedSession::new(site.clone())))
    };

    reporter.start_progress(scenarios.len() as u64, "running scenarios");
    let progress = &*reporter;
    let records = suite.run_all_with(scenarios, &factory, &|record| {
        progress.scenario_finished(record);
    });
    reporter.finish();

    let json = JsonReporter::new(&args.output);
    for record in &records {
        reporter.record(record);
        if let Err(err) = json.submit(record) {
            warn!(scenario = record.scenario(), error = %err, "report not written");
            reporter.warning(&format!("report for {} not written: {err}", record.scenario()));
        }
    }

    let summary = SuiteSummary::from_records("waypost", &records);
    reporter.summary(&summary);
    Ok(summary.all_passed())
}

/// `waypost check`: returns whether every file is valid
pub fn check(args: &CheckArgs, reporter: &ProgressReporter) -> CliResult<bool> {
    let config = RunConfig::resolve(args.config.as_deref())?;
    config.validate()?;
    let vars = config.placeholders();

    let mut all_valid = true;
    for path in &args.scenarios {
        let result = ScenarioFile::load(path)
            .and_then(|file| file.validate(&vars).map(|()| file.setup.len() + file.steps.len()))
            .map_err(|e| e.to_string());
        all_valid &= result.is_ok();
        reporter.checked(&path.display().to_string(), result);
    }
    Ok(all_valid)
}

/// `waypost config`: the resolved configuration, password redacted
pub fn show_config(args: &ConfigArgs) -> CliResult<String> {
    let config = RunConfig::resolve(args.config.as_deref())?.redacted();
    Ok(match args.format {
        ConfigFormat::Yaml => serde_yaml_ng::to_string(&config)?,
        ConfigFormat::Json => serde_json::to_string_pretty(&config)? + "\n",
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SITE: &str = r"
base_url: http://localhost:3000
pages:
  /:
    title: Home
    body_text: Welcome to the study hub
";

    const HOME: &str = r"
name: home
steps:
  - name: open
    navigate: /
  - name: greeting
    assert: { text_contains: { substring: study hub } }
";

    fn run_args(dir: &TempDir, scenarios: Vec<PathBuf>, site: Option<PathBuf>) -> RunArgs {
        RunArgs {
            scenarios,
            config: None,
            site,
            jobs: 2,
            output: dir.path().join("reports"),
            base_url: None,
            timeout_ms: Some(500),
            retry_attempts: None,
            headless: false,
            no_artifacts: true,
        }
    }

    fn write(dir: &TempDir, name: &str, text: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, text).unwrap();
        path
    }

    mod run_tests {
        use super::*;

        #[test]
        fn test_run_against_site_writes_reports() {
            let dir = TempDir::new().unwrap();
            let site = write(&dir, "site.yaml", SITE);
            let home = write(&dir, "home.yaml", HOME);
            let args = run_args(&dir, vec![home.clone(), home], Some(site));
            let mut reporter = ProgressReporter::new(false, true);

            assert!(run(&args, &mut reporter).unwrap());
            let reports = std::fs::read_dir(dir.path().join("reports")).unwrap().count();
            assert_eq!(reports, 2);
        }

        #[test]
        fn test_run_without_site_is_a_backend_error() {
            let dir = TempDir::new().unwrap();
            let home = write(&dir, "home.yaml", HOME);
            let args = run_args(&dir, vec![home], None);
            let err = run(&args, &mut ProgressReporter::new(false, true)).unwrap_err();
            assert!(matches!(err, CliError::Backend { .. }));
        }

        #[test]
        fn test_overrides_are_validated() {
            let dir = TempDir::new().unwrap();
            let mut args = run_args(&dir, vec![], None);
            args.base_url = Some("ftp://nowhere".into());
            assert!(resolve_config(&args).is_err());

            args.base_url = Some("https://staging.test".into());
            args.retry_attempts = Some(5);
            let config = resolve_config(&args).unwrap();
            assert_eq!(config.base_url, "https://staging.test");
            assert_eq!(config.retry.max_attempts, 5);
            assert!(!config.artifacts.on_failure);
        }

        #[test]
        fn test_zero_jobs_rejected() {
            let dir = TempDir::new().unwrap();
            let mut args = run_args(&dir, vec![], None);
            args.jobs = 0;
            let err = run(&args, &mut ProgressReporter::new(false, true)).unwrap_err();
            assert!(matches!(err, CliError::InvalidArgument { .. }));
        }
    }

    mod check_tests {
        use super::*;

        #[test]
        fn test_check_reports_invalid_files() {
            let dir = TempDir::new().unwrap();
            let good = write(&dir, "home.yaml", HOME);
            let bad = write(&dir, "bad.yaml", "name: bad\nsteps: []\n");
            let reporter = ProgressReporter::new(false, true);

            let args = CheckArgs { scenarios: vec![good.clone()], config: None };
            assert!(check(&args, &reporter).unwrap());
            let args = CheckArgs { scenarios: vec![good, bad], config: None };
            assert!(!check(&args, &reporter).unwrap());
        }
    }

    mod config_tests {
        use super::*;

        #[test]
        fn test_show_config_redacts_password() {
            let dir = TempDir::new().unwrap();
            let file = write(
                &dir,
                "waypost.yaml",
                "credentials:\n  email: qa@example.test\n  password: hunter2\n",
            );
            let args = ConfigArgs { config: Some(file), format: ConfigFormat::Json };
            let shown = show_config(&args).unwrap();
            assert!(shown.contains("qa@example.test"));
            assert!(!shown.contains("hunter2"));
        }
    }
}
