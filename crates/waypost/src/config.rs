//! Run configuration.
//!
//! Resolved in layers: built-in defaults, then an optional YAML file, then
//! `WAYPOST_*` environment variables. The CLI applies its own flags last and
//! calls [`RunConfig::validate`] before anything runs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::artifact::{ArtifactSink, FsArtifactSink};
use crate::executor::ExecutorConfig;
use crate::result::{WaypostError, WaypostResult};
use crate::retry::{Backoff, RetryPolicy};
use crate::scenario_file::Placeholders;
use crate::wait::{WaitOptions, MAX_SETTLE_DELAY};

const REDACTED: &str = "********";

/// Account used by `${credentials.*}` or `${admin.*}` placeholders
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    /// Account email
    pub email: String,
    /// Account password; never printed
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &REDACTED)
            .finish()
    }
}

/// Failure artifact settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactSettings {
    /// Capture the page when a step fails
    pub on_failure: bool,
    /// Where captures are written
    pub dir: PathBuf,
}

impl Default for ArtifactSettings {
    fn default() -> Self {
        Self {
            on_failure: true,
            dir: PathBuf::from("screenshots"),
        }
    }
}

/// Action retry settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Attempts per action, including the first
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_backoff_ms: u64,
    /// Growth factor between retries
    pub multiplier: f64,
    /// Delay ceiling
    pub max_backoff_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let backoff = Backoff::default();
        Self {
            max_attempts: 3,
            initial_backoff_ms: backoff.initial.as_millis() as u64,
            multiplier: backoff.multiplier,
            max_backoff_ms: backoff.max.as_millis() as u64,
        }
    }
}

/// Resolved configuration for a test run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Base URL for relative navigation
    pub base_url: String,
    /// Default element wait timeout
    pub timeout_ms: u64,
    /// Initial spacing between polls
    pub poll_interval_ms: u64,
    /// Timeout for the page to become ready after navigation
    pub page_load_timeout_ms: u64,
    /// Pause after a successful wait
    pub settle_delay_ms: u64,
    /// Whether a real browser backend should run without a window
    pub headless: bool,
    /// Login credentials
    pub credentials: Credentials,
    /// Administrator account
    pub admin: Credentials,
    /// Failure artifacts
    pub artifacts: ArtifactSettings,
    /// Action retries
    pub retry: RetrySettings,
}

impl Default for RunConfig {
    fn default() -> Self {
        let wait = WaitOptions::default();
        Self {
            base_url: "http://localhost:3000".to_string(),
            timeout_ms: wait.timeout.as_millis() as u64,
            poll_interval_ms: wait.poll_interval.as_millis() as u64,
            page_load_timeout_ms: crate::executor::DEFAULT_PAGE_LOAD_TIMEOUT_MS,
            settle_delay_ms: 0,
            headless: false,
            credentials: Credentials::default(),
            admin: Credentials::default(),
            artifacts: ArtifactSettings::default(),
            retry: RetrySettings::default(),
        }
    }
}

impl RunConfig {
    /// Default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a YAML document; missing keys keep their defaults
    pub fn from_yaml(text: &str) -> WaypostResult<Self> {
        Ok(serde_yaml_ng::from_str(text)?)
    }

    /// Load a YAML file
    pub fn from_yaml_file(path: &Path) -> WaypostResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            WaypostError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_yaml(&text)
            .map_err(|e| WaypostError::config(format!("{}: {e}", path.display())))
    }

    /// Defaults, then `file` if given, then the process environment
    pub fn resolve(file: Option<&Path>) -> WaypostResult<Self> {
        let mut config = match file {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    /// Overlay `WAYPOST_*` variables from the process environment
    pub fn apply_env(&mut self) -> WaypostResult<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Overlay `WAYPOST_*` variables from `lookup`
    pub fn apply_env_from(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> WaypostResult<()> {
        if let Some(v) = lookup("WAYPOST_BASE_URL") {
            self.base_url = v;
        }
        if let Some(v) = lookup("WAYPOST_EMAIL") {
            self.credentials.email = v;
        }
        if let Some(v) = lookup("WAYPOST_PASSWORD") {
            self.credentials.password = v;
        }
        if let Some(v) = lookup("WAYPOST_ADMIN_EMAIL") {
            self.admin.email = v;
        }
        if let Some(v) = lookup("WAYPOST_ADMIN_PASSWORD") {
            self.admin.password = v;
        }
        if let Some(v) = lookup("WAYPOST_ARTIFACT_DIR") {
            self.artifacts.dir = PathBuf::from(v);
        }
        env_number(&lookup, "WAYPOST_TIMEOUT_MS", &mut self.timeout_ms)?;
        env_number(&lookup, "WAYPOST_POLL_INTERVAL_MS", &mut self.poll_interval_ms)?;
        env_number(&lookup, "WAYPOST_PAGE_LOAD_TIMEOUT_MS", &mut self.page_load_timeout_ms)?;
        env_number(&lookup, "WAYPOST_SETTLE_DELAY_MS", &mut self.settle_delay_ms)?;
        env_number(&lookup, "WAYPOST_RETRY_ATTEMPTS", &mut self.retry.max_attempts)?;
        env_flag(&lookup, "WAYPOST_HEADLESS", &mut self.headless)?;
        env_flag(&lookup, "WAYPOST_ARTIFACTS_ON_FAILURE", &mut self.artifacts.on_failure)?;
        Ok(())
    }

    /// Reject settings that cannot produce a meaningful run
    pub fn validate(&self) -> WaypostResult<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(WaypostError::config(format!(
                "base_url must start with http:// or https://, got {:?}",
                self.base_url
            )));
        }
        if self.timeout_ms == 0 {
            return Err(WaypostError::config("timeout_ms must be greater than zero"));
        }
        if self.page_load_timeout_ms == 0 {
            return Err(WaypostError::config(
                "page_load_timeout_ms must be greater than zero",
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(WaypostError::config("poll_interval_ms must be greater than zero"));
        }
        if self.poll_interval_ms > self.timeout_ms {
            return Err(WaypostError::config(format!(
                "poll_interval_ms ({}) exceeds timeout_ms ({})",
                self.poll_interval_ms, self.timeout_ms
            )));
        }
        if self.settle_delay_ms > MAX_SETTLE_DELAY.as_millis() as u64 {
            return Err(WaypostError::config(format!(
                "settle_delay_ms must be at most {}",
                MAX_SETTLE_DELAY.as_millis()
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(WaypostError::config("retry.max_attempts must be at least 1"));
        }
        if !self.retry.multiplier.is_finite() || self.retry.multiplier < 1.0 {
            return Err(WaypostError::config("retry.multiplier must be at least 1.0"));
        }
        Ok(())
    }

    /// Wait options derived from the timing settings
    #[must_use]
    pub fn wait_options(&self) -> WaitOptions {
        WaitOptions::new()
            .with_timeout(Duration::from_millis(self.timeout_ms))
            .with_poll_interval(Duration::from_millis(self.poll_interval_ms))
            .with_settle_delay(Duration::from_millis(self.settle_delay_ms))
    }

    /// Retry policy derived from the retry settings
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry.max_attempts).with_backoff(Backoff::new(
            Duration::from_millis(self.retry.initial_backoff_ms),
            self.retry.multiplier,
            Duration::from_millis(self.retry.max_backoff_ms),
        ))
    }

    /// Executor defaults for this run
    #[must_use]
    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig::new()
            .with_base_url(&self.base_url)
            .with_wait(self.wait_options())
            .with_page_load_timeout(Duration::from_millis(self.page_load_timeout_ms))
            .with_retry(self.retry_policy())
    }

    /// Placeholder values for scenario files
    #[must_use]
    pub fn placeholders(&self) -> Placeholders {
        Placeholders::new(
            self.base_url.trim_end_matches('/'),
            &self.credentials.email,
            &self.credentials.password,
        )
        .with_admin(&self.admin.email, &self.admin.password)
    }

    /// Filesystem artifact sink, when capture on failure is enabled
    #[must_use]
    pub fn artifact_sink(&self) -> Option<Arc<dyn ArtifactSink>> {
        self.artifacts
            .on_failure
            .then(|| Arc::new(FsArtifactSink::new(&self.artifacts.dir)) as Arc<dyn ArtifactSink>)
    }

    /// Copy safe to print
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        for account in [&mut copy.credentials, &mut copy.admin] {
            if !account.password.is_empty() {
                account.password = REDACTED.to_string();
            }
        }
        copy
    }
}

fn env_number<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    slot: &mut T,
) -> WaypostResult<()> {
    if let Some(raw) = lookup(key) {
        *slot = raw
            .trim()
            .parse()
            .map_err(|_| WaypostError::config(format!("{key}: expected a number, got {raw:?}")))?;
        debug!(key, "applied environment override");
    }
    Ok(())
}

fn env_flag(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    slot: &mut bool,
) -> WaypostResult<()> {
    if let Some(raw) = lookup(key) {
        *slot = match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" | "" => false,
            _ => {
                return Err(WaypostError::config(format!(
                    "{key}: expected true or false, got {raw:?}"
                )))
            }
        };
        debug!(key, "applied environment override");
    }
    Ok(())
}
