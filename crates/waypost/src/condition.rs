//! Conditions: pure predicates over a [`Snapshot`].
//!
//! Evaluating a condition never touches the session and never mutates the
//! snapshot, so the same snapshot always yields the same answer.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::locator::{resolve, LocatorChain};
use crate::result::{WaypostError, WaypostResult};
use crate::snapshot::{ElementHandle, Snapshot};

// =============================================================================
// URL PATTERN
// =============================================================================

/// URL matcher.
///
/// Text form: `=exact`, `^prefix`, `re:<regex>`, `glob:<pattern>`, `!<pattern>`
/// for negation; anything else is a substring match.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum UrlPattern {
    /// Exact URL match
    Exact(String),
    /// Prefix match
    Prefix(String),
    /// Contains substring
    Contains(String),
    /// Regex match
    Regex(Regex),
    /// Glob pattern (e.g., "**/api/users/*")
    Glob(String),
    /// Negation of another pattern
    Not(Box<UrlPattern>),
}

impl UrlPattern {
    /// Parse the text form
    pub fn parse(text: &str) -> WaypostResult<Self> {
        if let Some(rest) = text.strip_prefix('!') {
            return Ok(Self::Not(Box::new(Self::parse(rest)?)));
        }
        if let Some(rest) = text.strip_prefix("re:") {
            let re = Regex::new(rest).map_err(|e| WaypostError::InvalidPattern {
                pattern: text.to_string(),
                message: e.to_string(),
            })?;
            return Ok(Self::Regex(re));
        }
        if let Some(rest) = text.strip_prefix("glob:") {
            return Ok(Self::Glob(rest.to_string()));
        }
        if let Some(rest) = text.strip_prefix('=') {
            return Ok(Self::Exact(rest.to_string()));
        }
        if let Some(rest) = text.strip_prefix('^') {
            return Ok(Self::Prefix(rest.to_string()));
        }
        if text.is_empty() {
            return Err(WaypostError::InvalidPattern {
                pattern: String::new(),
                message: "empty pattern".to_string(),
            });
        }
        Ok(Self::Contains(text.to_string()))
    }

    /// Check if a URL matches this pattern
    #[must_use]
    pub fn matches(&self, url: &str) -> bool {
        match self {
            Self::Exact(pattern) => url == pattern,
            Self::Prefix(pattern) => url.starts_with(pattern.as_str()),
            Self::Contains(pattern) => url.contains(pattern.as_str()),
            Self::Regex(re) => re.is_match(url),
            Self::Glob(pattern) => glob_matches(pattern, url),
            Self::Not(inner) => !inner.matches(url),
        }
    }
}

/// Glob matching for URLs; `*` matches any run of characters.
///
/// The first segment is anchored at the start and the last at the end, the
/// middle ones are matched leftmost in between.
fn glob_matches(pattern: &str, url: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    let [first, middle @ .., last] = parts.as_slice() else {
        return url == pattern;
    };
    if !url.starts_with(first) {
        return false;
    }
    let mut pos = first.len();
    for part in middle.iter().filter(|p| !p.is_empty()) {
        match url[pos..].find(part) {
            Some(found) => pos += found + part.len(),
            None => return false,
        }
    }
    url.len() >= pos + last.len() && url.ends_with(last)
}

impl fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(p) => write!(f, "={p}"),
            Self::Prefix(p) => write!(f, "^{p}"),
            Self::Contains(p) => f.write_str(p),
            Self::Regex(re) => write!(f, "re:{}", re.as_str()),
            Self::Glob(p) => write!(f, "glob:{p}"),
            Self::Not(inner) => write!(f, "!{inner}"),
        }
    }
}

impl PartialEq for UrlPattern {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}

impl Eq for UrlPattern {}

impl TryFrom<String> for UrlPattern {
    type Error = WaypostError;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        Self::parse(&text)
    }
}

impl From<UrlPattern> for String {
    fn from(pattern: UrlPattern) -> Self {
        pattern.to_string()
    }
}

// =============================================================================
// CONDITION
// =============================================================================

/// Where a text condition looks
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextScope {
    /// Title and body text of the whole page
    #[default]
    Page,
    /// Text (or form value) of the resolved element
    Element(LocatorChain),
}

/// A predicate over a page snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// Chain resolves to an element
    ElementPresent(LocatorChain),
    /// Resolved element is visible
    ElementVisible(LocatorChain),
    /// Resolved element is visible and enabled, even if something covers it
    ElementEnabled(LocatorChain),
    /// Resolved element is visible, enabled and not covered
    ElementClickable(LocatorChain),
    /// Resolved element is visible, enabled and writable
    ElementEditable(LocatorChain),
    /// Scope contains the substring
    TextContains {
        /// Where to look
        #[serde(default)]
        scope: TextScope,
        /// Substring to find
        substring: String,
    },
    /// Scope contains at least one of the substrings (case-insensitive)
    TextContainsAny {
        /// Where to look
        #[serde(default)]
        scope: TextScope,
        /// Candidates
        substrings: Vec<String>,
    },
    /// Current URL matches
    UrlMatches(UrlPattern),
    /// Document finished loading
    PageReady,
    /// Inverse of another condition
    Not(Box<Condition>),
}

impl Condition {
    /// Element present
    pub fn present(chain: impl Into<LocatorChain>) -> Self {
        Self::ElementPresent(chain.into())
    }

    /// Element visible
    pub fn visible(chain: impl Into<LocatorChain>) -> Self {
        Self::ElementVisible(chain.into())
    }

    /// Element visible and enabled
    pub fn enabled(chain: impl Into<LocatorChain>) -> Self {
        Self::ElementEnabled(chain.into())
    }

    /// Element clickable
    pub fn clickable(chain: impl Into<LocatorChain>) -> Self {
        Self::ElementClickable(chain.into())
    }

    /// Element editable
    pub fn editable(chain: impl Into<LocatorChain>) -> Self {
        Self::ElementEditable(chain.into())
    }

    /// Page text contains
    pub fn page_contains(substring: impl Into<String>) -> Self {
        Self::TextContains {
            scope: TextScope::Page,
            substring: substring.into(),
        }
    }

    /// URL matches a pattern in text form
    pub fn url_matches(pattern: &str) -> WaypostResult<Self> {
        Ok(Self::UrlMatches(UrlPattern::parse(pattern)?))
    }

    /// Negate
    #[must_use]
    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// The locator chain this condition is about, if any
    #[must_use]
    pub fn chain(&self) -> Option<&LocatorChain> {
        match self {
            Self::ElementPresent(c)
            | Self::ElementVisible(c)
            | Self::ElementEnabled(c)
            | Self::ElementClickable(c)
            | Self::ElementEditable(c) => Some(c),
            Self::TextContains {
                scope: TextScope::Element(c),
                ..
            }
            | Self::TextContainsAny {
                scope: TextScope::Element(c),
                ..
            } => Some(c),
            _ => None,
        }
    }

    /// Short description for logs and records
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::ElementPresent(c) => format!("present({c})"),
            Self::ElementVisible(c) => format!("visible({c})"),
            Self::ElementEnabled(c) => format!("enabled({c})"),
            Self::ElementClickable(c) => format!("clickable({c})"),
            Self::ElementEditable(c) => format!("editable({c})"),
            Self::TextContains { substring, .. } => format!("text contains {substring:?}"),
            Self::TextContainsAny { substrings, .. } => {
                format!("text contains any of {substrings:?}")
            }
            Self::UrlMatches(p) => format!("url matches {p}"),
            Self::PageReady => "page ready".to_string(),
            Self::Not(inner) => format!("not {}", inner.describe()),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Text an element contributes to a text condition
fn element_text(element: &ElementHandle) -> String {
    match &element.value {
        Some(value) if !value.is_empty() => format!("{} {value}", element.text),
        _ => element.text.clone(),
    }
}

fn scope_text(scope: &TextScope, snapshot: &Snapshot) -> Option<String> {
    match scope {
        TextScope::Page => Some(snapshot.page_text()),
        TextScope::Element(chain) => resolve(chain, snapshot).map(|r| element_text(r.element)),
    }
}

/// Evaluate a condition against a snapshot
#[must_use]
pub fn evaluate(condition: &Condition, snapshot: &Snapshot) -> bool {
    match condition {
        Condition::ElementPresent(chain) => resolve(chain, snapshot).is_some(),
        Condition::ElementVisible(chain) => {
            resolve(chain, snapshot).is_some_and(|r| r.element.visible)
        }
        Condition::ElementEnabled(chain) => {
            resolve(chain, snapshot).is_some_and(|r| r.element.is_actionable())
        }
        Condition::ElementClickable(chain) => {
            resolve(chain, snapshot).is_some_and(|r| r.element.is_clickable())
        }
        Condition::ElementEditable(chain) => {
            resolve(chain, snapshot).is_some_and(|r| r.element.is_editable())
        }
        Condition::TextContains { scope, substring } => {
            scope_text(scope, snapshot).is_some_and(|text| text.contains(substring.as_str()))
        }
        Condition::TextContainsAny { scope, substrings } => {
            scope_text(scope, snapshot).is_some_and(|text| {
                let text = text.to_lowercase();
                substrings.iter().any(|s| text.contains(&s.to_lowercase()))
            })
        }
        Condition::UrlMatches(pattern) => pattern.matches(&snapshot.url),
        Condition::PageReady => snapshot.ready_state.is_ready(),
        Condition::Not(inner) => !evaluate(inner, snapshot),
    }
}

/// Element a satisfied element condition refers to.
///
/// Returns `None` for page-level conditions and for unsatisfied ones.
#[must_use]
pub fn target(condition: &Condition, snapshot: &Snapshot) -> Option<ElementHandle> {
    if matches!(condition, Condition::Not(_)) || !evaluate(condition, snapshot) {
        return None;
    }
    condition
        .chain()
        .and_then(|chain| resolve(chain, snapshot))
        .map(|r| r.element.clone())
}
