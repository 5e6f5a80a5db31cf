//! YAML scenario files.
//!
//! ```yaml
//! name: login
//! deadline_ms: 60000
//! setup:
//!   - name: accept cookies
//!     click: [{ id: accept-cookies }]
//! steps:
//!   - name: open login page
//!     critical: true
//!     navigate: /login
//!   - name: enter email
//!     type_text:
//!       target: [{ name: email }, { css: "input[type=email]" }]
//!       text: "${credentials.email}"
//!   - name: left login page
//!     wait_for: { url_matches: "!/login" }
//!     timeout_ms: 10000
//! ```
//!
//! Text values, URL patterns and locator values may use `${base_url}`,
//! `${credentials.email}`, `${credentials.password}`, `${admin.email}`,
//! `${admin.password}` and `${unique}`. Anything else inside `${...}` is
//! rejected when the file is compiled.
//!
//! `include:` lists other scenario files, relative to this one, whose steps
//! run first. A shared `login.yaml` can then be the preamble of every
//! scenario that needs a signed-in session. Included steps and `setup:` steps
//! are always critical.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::condition::{Condition, TextScope, UrlPattern};
use crate::executor::Action;
use crate::locator::{Locator, LocatorChain};
use crate::result::{WaypostError, WaypostResult};
use crate::runner::{Scenario, Step, StepBody};

// =============================================================================
// FILE MODEL
// =============================================================================

/// What a step in a scenario file does
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Load a URL
    Navigate(String),
    /// Click an element
    Click(LocatorChain),
    /// Type into a field
    TypeText {
        /// Field
        target: LocatorChain,
        /// Text, may contain placeholders
        text: String,
    },
    /// Scroll an element into view
    ScrollIntoView(LocatorChain),
    /// Attach a file
    UploadFile {
        /// File input
        target: LocatorChain,
        /// Local path, may contain placeholders
        path: String,
    },
    /// Wait until a condition holds
    WaitFor(Condition),
    /// Check a condition once
    Assert(Condition),
}

/// One step as written in the file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSpec {
    /// Step name
    pub name: String,
    /// Failure aborts the scenario
    #[serde(default)]
    pub critical: bool,
    /// Per-step timeout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Step body
    #[serde(flatten)]
    pub kind: StepKind,
}

/// A scenario file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioFile {
    /// Scenario name
    pub name: String,
    /// Overall deadline
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline_ms: Option<u64>,
    /// Scenario files whose steps run before `setup`; emptied by [`ScenarioFile::load`]
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<PathBuf>,
    /// Preamble steps; a failure aborts the scenario
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub setup: Vec<StepSpec>,
    /// Steps in order
    pub steps: Vec<StepSpec>,
    /// Where the file was loaded from
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

// =============================================================================
// PLACEHOLDERS
// =============================================================================

/// Values substituted into `${...}` placeholders
#[derive(Clone, PartialEq, Eq)]
pub struct Placeholders {
    /// `${base_url}`
    pub base_url: String,
    /// `${credentials.email}`
    pub email: String,
    /// `${credentials.password}`
    pub password: String,
    /// `${admin.email}`
    pub admin_email: String,
    /// `${admin.password}`
    pub admin_password: String,
    /// `${unique}`, fixed for one compiled scenario
    pub unique: String,
}

impl std::fmt::Debug for Placeholders {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Placeholders")
            .field("base_url", &self.base_url)
            .field("email", &self.email)
            .field("password", &"********")
            .field("admin_email", &self.admin_email)
            .field("admin_password", &"********")
            .field("unique", &self.unique)
            .finish()
    }
}

impl Placeholders {
    /// Placeholder values with a fresh `${unique}` token
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            email: email.into(),
            password: password.into(),
            admin_email: String::new(),
            admin_password: String::new(),
            unique: unique_token(),
        }
    }

    /// Set the `${admin.*}` values
    #[must_use]
    pub fn with_admin(mut self, email: impl Into<String>, password: impl Into<String>) -> Self {
        self.admin_email = email.into();
        self.admin_password = password.into();
        self
    }

    /// Same values with a new `${unique}` token
    #[must_use]
    pub fn refreshed(&self) -> Self {
        Self {
            unique: unique_token(),
            ..self.clone()
        }
    }

    fn lookup(&self, key: &str) -> Option<&str> {
        match key {
            "base_url" => Some(&self.base_url),
            "credentials.email" => Some(&self.email),
            "credentials.password" => Some(&self.password),
            "admin.email" => Some(&self.admin_email),
            "admin.password" => Some(&self.admin_password),
            "unique" => Some(&self.unique),
            _ => None,
        }
    }

    /// Substitute every `${...}` in `text`
    pub fn interpolate(&self, text: &str) -> Result<String, String> {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after
                .find('}')
                .ok_or_else(|| format!("unterminated placeholder in {text:?}"))?;
            let key = after[..end].trim();
            let value = self
                .lookup(key)
                .ok_or_else(|| format!("unknown placeholder ${{{key}}}"))?;
            out.push_str(value);
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

fn unique_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..12].to_string()
}

// =============================================================================
// LOADING
// =============================================================================

impl ScenarioFile {
    /// Parse a scenario from YAML text
    pub fn from_yaml(text: &str) -> WaypostResult<Self> {
        let file: Self = serde_yaml_ng::from_str(text)?;
        file.check_shape()?;
        Ok(file)
    }

    /// Load a scenario file from disk, expanding its includes into `setup`
    pub fn load(path: &Path) -> WaypostResult<Self> {
        Self::load_nested(path, &mut Vec::new())
    }

    fn load_nested(path: &Path, open: &mut Vec<PathBuf>) -> WaypostResult<Self> {
        let label = path.display().to_string();
        let text = std::fs::read_to_string(path)
            .map_err(|e| WaypostError::scenario(label.clone(), e.to_string()))?;
        let mut file: Self = serde_yaml_ng::from_str(&text)
            .map_err(|e| WaypostError::scenario(label.clone(), e.to_string()))?;
        file.source = Some(path.to_path_buf());
        file.check_shape()?;

        if !file.include.is_empty() {
            let key = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
            if open.contains(&key) {
                return Err(WaypostError::scenario(label, "include cycle"));
            }
            open.push(key);
            let base = path.parent().unwrap_or_else(|| Path::new(""));
            let mut preamble = Vec::new();
            for include in std::mem::take(&mut file.include) {
                let included = Self::load_nested(&base.join(&include), open)?;
                preamble.extend(included.setup);
                preamble.extend(included.steps);
            }
            open.pop();
            preamble.append(&mut file.setup);
            file.setup = preamble;
        }
        debug!(
            path = %path.display(),
            setup = file.setup.len(),
            steps = file.steps.len(),
            "scenario file loaded"
        );
        Ok(file)
    }

    fn label(&self) -> String {
        self.source
            .as_ref()
            .map_or_else(|| self.name.clone(), |p| p.display().to_string())
    }

    fn check_shape(&self) -> WaypostResult<()> {
        if self.name.trim().is_empty() {
            return Err(WaypostError::scenario(self.label(), "scenario name is empty"));
        }
        if self.steps.is_empty() {
            return Err(WaypostError::scenario(self.label(), "scenario has no steps"));
        }
        if let Some(i) = self.steps.iter().position(|s| s.name.trim().is_empty()) {
            return Err(WaypostError::scenario(
                self.label(),
                format!("step {} has an empty name", i + 1),
            ));
        }
        if let Some(i) = self.setup.iter().position(|s| s.name.trim().is_empty()) {
            return Err(WaypostError::scenario(
                self.label(),
                format!("setup step {} has an empty name", i + 1),
            ));
        }
        let all_steps = || self.setup.iter().chain(&self.steps);
        if self.deadline_ms == Some(0) || all_steps().any(|s| s.timeout_ms == Some(0)) {
            return Err(WaypostError::scenario(self.label(), "timeouts must be positive"));
        }
        Ok(())
    }

    /// Check placeholders without producing a runnable scenario
    pub fn validate(&self, vars: &Placeholders) -> WaypostResult<()> {
        self.compile(vars).map(|_| ())
    }

    /// Build a runnable [`Scenario`], substituting placeholders
    pub fn compile(&self, vars: &Placeholders) -> WaypostResult<Scenario> {
        if let Some(include) = self.include.first() {
            return Err(WaypostError::scenario(
                self.label(),
                format!(
                    "include {} is only resolved when the file is loaded from disk",
                    include.display()
                ),
            ));
        }
        let mut scenario = Scenario::new(self.name.clone());
        scenario.deadline = self.deadline_ms.map(Duration::from_millis);
        for spec in &self.setup {
            let mut step = self.compile_step(spec, vars)?;
            step.name = format!("setup: {}", spec.name);
            step.critical = true;
            scenario.steps.push(step);
        }
        for spec in &self.steps {
            scenario.steps.push(self.compile_step(spec, vars)?);
        }
        Ok(scenario)
    }

    fn compile_step(&self, spec: &StepSpec, vars: &Placeholders) -> WaypostResult<Step> {
        let fail = |message: String| {
            WaypostError::scenario(self.label(), format!("step {:?}: {message}", spec.name))
        };
        let chain = |c: &LocatorChain| interpolate_chain(c, vars).map_err(fail);
        let body = match &spec.kind {
            StepKind::Navigate(url) => {
                StepBody::Action(Action::Navigate(vars.interpolate(url).map_err(fail)?))
            }
            StepKind::Click(target) => StepBody::Action(Action::Click(chain(target)?)),
            StepKind::TypeText { target, text } => StepBody::Action(Action::TypeText {
                target: chain(target)?,
                text: vars.interpolate(text).map_err(fail)?,
            }),
            StepKind::ScrollIntoView(target) => {
                StepBody::Action(Action::ScrollIntoView(chain(target)?))
            }
            StepKind::UploadFile { target, path } => StepBody::Action(Action::UploadFile {
                target: chain(target)?,
                path: PathBuf::from(vars.interpolate(path).map_err(fail)?),
            }),
            StepKind::WaitFor(c) => StepBody::WaitFor(interpolate_condition(c, vars).map_err(fail)?),
            StepKind::Assert(c) => StepBody::Assert(interpolate_condition(c, vars).map_err(fail)?),
        };
        let mut step = Step::new(spec.name.clone(), body).with_critical(spec.critical);
        step.timeout = spec.timeout_ms.map(Duration::from_millis);
        Ok(step)
    }
}

fn interpolate_chain(chain: &LocatorChain, vars: &Placeholders) -> Result<LocatorChain, String> {
    let locators = chain
        .locators()
        .iter()
        .map(|l| Ok(Locator::new(l.strategy(), vars.interpolate(l.value())?)))
        .collect::<Result<Vec<_>, String>>()?;
    LocatorChain::new(locators).map_err(|e| e.to_string())
}

fn interpolate_scope(scope: &TextScope, vars: &Placeholders) -> Result<TextScope, String> {
    Ok(match scope {
        TextScope::Page => TextScope::Page,
        TextScope::Element(chain) => TextScope::Element(interpolate_chain(chain, vars)?),
    })
}

/// Substitute into the pattern's text form and parse it again
fn interpolate_pattern(pattern: &UrlPattern, vars: &Placeholders) -> Result<UrlPattern, String> {
    let text = vars.interpolate(&pattern.to_string())?;
    UrlPattern::parse(&text).map_err(|e| e.to_string())
}

fn interpolate_condition(condition: &Condition, vars: &Placeholders) -> Result<Condition, String> {
    Ok(match condition {
        Condition::ElementPresent(c) => Condition::ElementPresent(interpolate_chain(c, vars)?),
        Condition::ElementVisible(c) => Condition::ElementVisible(interpolate_chain(c, vars)?),
        Condition::ElementEnabled(c) => Condition::ElementEnabled(interpolate_chain(c, vars)?),
        Condition::ElementClickable(c) => Condition::ElementClickable(interpolate_chain(c, vars)?),
        Condition::ElementEditable(c) => Condition::ElementEditable(interpolate_chain(c, vars)?),
        Condition::TextContains { scope, substring } => Condition::TextContains {
            scope: interpolate_scope(scope, vars)?,
            substring: vars.interpolate(substring)?,
        },
        Condition::TextContainsAny { scope, substrings } => Condition::TextContainsAny {
            scope: interpolate_scope(scope, vars)?,
            substrings: substrings
                .iter()
                .map(|s| vars.interpolate(s))
                .collect::<Result<_, _>>()?,
        },
        Condition::UrlMatches(pattern) => Condition::UrlMatches(interpolate_pattern(pattern, vars)?),
        Condition::PageReady => Condition::PageReady,
        Condition::Not(inner) => Condition::Not(Box::new(interpolate_condition(inner, vars)?)),
    })
}
