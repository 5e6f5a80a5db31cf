//! Locators and ordered locator chains.
//!
//! Markup is unstable across builds, so targets are described as a chain of
//! alternative locators. [`resolve`] tries them in declaration order and the
//! first one that matches anything wins; position decides ties, never
//! selector specificity.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::result::{WaypostError, WaypostResult};
use crate::snapshot::{ElementHandle, Snapshot};

/// How a locator finds elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// `id` attribute
    Id,
    /// `name` attribute
    Name,
    /// CSS selector, evaluated by the session
    CssSelector,
    /// XPath expression, evaluated by the session
    XPath,
    /// Exact visible text of a link
    LinkText,
    /// Element tag name
    TagName,
}

impl Strategy {
    /// Short name used in YAML and log output
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Name => "name",
            Self::CssSelector => "css",
            Self::XPath => "xpath",
            Self::LinkText => "link_text",
            Self::TagName => "tag",
        }
    }
}

/// A single way of finding elements
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "LocatorRepr", into = "LocatorRepr")]
pub struct Locator {
    strategy: Strategy,
    value: String,
}

impl Locator {
    /// Create a locator
    #[must_use]
    pub fn new(strategy: Strategy, value: impl Into<String>) -> Self {
        Self {
            strategy,
            value: value.into(),
        }
    }

    /// Locate by `id`
    #[must_use]
    pub fn id(value: impl Into<String>) -> Self {
        Self::new(Strategy::Id, value)
    }

    /// Locate by `name`
    #[must_use]
    pub fn name(value: impl Into<String>) -> Self {
        Self::new(Strategy::Name, value)
    }

    /// Locate by CSS selector
    #[must_use]
    pub fn css(value: impl Into<String>) -> Self {
        Self::new(Strategy::CssSelector, value)
    }

    /// Locate by XPath
    #[must_use]
    pub fn xpath(value: impl Into<String>) -> Self {
        Self::new(Strategy::XPath, value)
    }

    /// Locate a link by its text
    #[must_use]
    pub fn link_text(value: impl Into<String>) -> Self {
        Self::new(Strategy::LinkText, value)
    }

    /// Locate by tag name
    #[must_use]
    pub fn tag(value: impl Into<String>) -> Self {
        Self::new(Strategy::TagName, value)
    }

    /// Strategy
    #[must_use]
    pub const fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Strategy argument
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Whether a single element satisfies this locator
    #[must_use]
    pub fn matches(&self, element: &ElementHandle) -> bool {
        match self.strategy {
            Strategy::Id => element.attr("id") == Some(self.value.as_str()),
            Strategy::Name => element.attr("name") == Some(self.value.as_str()),
            Strategy::TagName => element.tag.eq_ignore_ascii_case(&self.value),
            Strategy::LinkText => element.tag == "a" && element.text.trim() == self.value,
            Strategy::CssSelector | Strategy::XPath => {
                element.matches.iter().any(|m| m == &self.value)
            }
        }
    }

    /// All matching elements in document order
    pub fn find_all<'s>(&'s self, snapshot: &'s Snapshot) -> impl Iterator<Item = &'s ElementHandle> {
        snapshot.elements.iter().filter(move |e| self.matches(e))
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.strategy.as_str(), self.value)
    }
}

/// Single-key map form used in scenario files: `{ css: "button.primary" }`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum LocatorRepr {
    Id(String),
    Name(String),
    Css(String),
    Xpath(String),
    LinkText(String),
    Tag(String),
}

impl From<LocatorRepr> for Locator {
    fn from(repr: LocatorRepr) -> Self {
        match repr {
            LocatorRepr::Id(v) => Self::id(v),
            LocatorRepr::Name(v) => Self::name(v),
            LocatorRepr::Css(v) => Self::css(v),
            LocatorRepr::Xpath(v) => Self::xpath(v),
            LocatorRepr::LinkText(v) => Self::link_text(v),
            LocatorRepr::Tag(v) => Self::tag(v),
        }
    }
}

impl From<Locator> for LocatorRepr {
    fn from(locator: Locator) -> Self {
        let Locator { strategy, value } = locator;
        match strategy {
            Strategy::Id => Self::Id(value),
            Strategy::Name => Self::Name(value),
            Strategy::CssSelector => Self::Css(value),
            Strategy::XPath => Self::Xpath(value),
            Strategy::LinkText => Self::LinkText(value),
            Strategy::TagName => Self::Tag(value),
        }
    }
}

// =============================================================================
// LOCATOR CHAIN
// =============================================================================

/// Ordered, non-empty list of alternative locators
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<Locator>", into = "Vec<Locator>")]
pub struct LocatorChain {
    locators: Vec<Locator>,
}

impl LocatorChain {
    /// Build a chain; rejects an empty list
    pub fn new(locators: Vec<Locator>) -> WaypostResult<Self> {
        if locators.is_empty() {
            return Err(WaypostError::EmptyChain);
        }
        Ok(Self { locators })
    }

    /// Chain with a single locator
    #[must_use]
    pub fn single(locator: Locator) -> Self {
        Self {
            locators: vec![locator],
        }
    }

    /// Append a fallback locator
    #[must_use]
    pub fn or(mut self, locator: Locator) -> Self {
        self.locators.push(locator);
        self
    }

    /// Locators in declaration order
    #[must_use]
    pub fn locators(&self) -> &[Locator] {
        &self.locators
    }

    /// Number of alternatives (always at least one)
    #[must_use]
    pub fn len(&self) -> usize {
        self.locators.len()
    }

    /// Always false; kept for API symmetry with slices
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// First locator, used as the chain's display name
    #[must_use]
    pub fn primary(&self) -> &Locator {
        &self.locators[0]
    }
}

impl From<Locator> for LocatorChain {
    fn from(locator: Locator) -> Self {
        Self::single(locator)
    }
}

impl TryFrom<Vec<Locator>> for LocatorChain {
    type Error = WaypostError;

    fn try_from(locators: Vec<Locator>) -> Result<Self, Self::Error> {
        Self::new(locators)
    }
}

impl From<LocatorChain> for Vec<Locator> {
    fn from(chain: LocatorChain) -> Self {
        chain.locators
    }
}

impl fmt::Display for LocatorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, locator) in self.locators.iter().enumerate() {
            if i > 0 {
                f.write_str(" | ")?;
            }
            write!(f, "{locator}")?;
        }
        Ok(())
    }
}

/// A chain resolution: the element and which alternative found it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution<'s> {
    /// Matched element (first in document order for that locator)
    pub element: &'s ElementHandle,
    /// Index of the winning locator within the chain
    pub index: usize,
}

/// Resolve a chain against a snapshot, first success wins
#[must_use]
pub fn resolve<'s>(chain: &LocatorChain, snapshot: &'s Snapshot) -> Option<Resolution<'s>> {
    chain
        .locators
        .iter()
        .enumerate()
        .find_map(|(index, locator)| {
            snapshot
                .elements
                .iter()
                .find(|e| locator.matches(e))
                .map(|element| Resolution { element, index })
        })
}
