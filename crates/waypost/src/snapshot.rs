//! Point-in-time, read-only views of page state.
//!
//! A [`Snapshot`] is what conditions are evaluated against. Sessions produce a
//! fresh one on every poll; nothing in the engine mutates it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Document readiness as reported by the page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadyState {
    /// Document is still loading
    #[default]
    Loading,
    /// DOM parsed, subresources pending
    Interactive,
    /// Document and subresources loaded
    Complete,
}

impl ReadyState {
    /// Whether the page counts as ready
    #[must_use]
    pub const fn is_ready(self) -> bool {
        matches!(self, Self::Complete)
    }
}

/// Element handle for DOM interactions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementHandle {
    /// Session-assigned handle id; changes when the element is re-rendered
    pub id: String,
    /// Lowercase tag name
    pub tag: String,
    /// DOM attributes
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Rendered text content
    #[serde(default)]
    pub text: String,
    /// Current value for form controls
    #[serde(default)]
    pub value: Option<String>,
    /// Rendered and inside the layout
    #[serde(default = "default_true")]
    pub visible: bool,
    /// Not disabled
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Read-only form control
    #[serde(default)]
    pub read_only: bool,
    /// Element currently covering this one, if any
    #[serde(default)]
    pub obscured_by: Option<String>,
    /// CSS and XPath expressions the session evaluated as matching this element
    #[serde(default)]
    pub matches: Vec<String>,
}

const fn default_true() -> bool {
    true
}

impl ElementHandle {
    /// Create a visible, enabled element
    #[must_use]
    pub fn new(id: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tag: tag.into().to_ascii_lowercase(),
            attributes: BTreeMap::new(),
            text: String::new(),
            value: None,
            visible: true,
            enabled: true,
            read_only: false,
            obscured_by: None,
            matches: Vec::new(),
        }
    }

    /// Set an attribute
    #[must_use]
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Set text content
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Set form value
    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Record a CSS/XPath expression this element matches
    #[must_use]
    pub fn matching(mut self, expression: impl Into<String>) -> Self {
        self.matches.push(expression.into());
        self
    }

    /// Set visibility
    #[must_use]
    pub const fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// Set enabled state
    #[must_use]
    pub const fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set read-only state
    #[must_use]
    pub const fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Mark as covered by another element
    #[must_use]
    pub fn obscured(mut self, by: impl Into<String>) -> Self {
        self.obscured_by = Some(by.into());
        self
    }

    /// Attribute lookup
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Visible and enabled, covered or not
    #[must_use]
    pub const fn is_actionable(&self) -> bool {
        self.visible && self.enabled
    }

    /// Visible, enabled and not covered
    #[must_use]
    pub const fn is_clickable(&self) -> bool {
        self.visible && self.enabled && self.obscured_by.is_none()
    }

    /// Visible, enabled and writable
    #[must_use]
    pub const fn is_editable(&self) -> bool {
        self.visible && self.enabled && !self.read_only
    }
}

/// A read-only view of the page at one instant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Current URL
    pub url: String,
    /// Document readiness
    #[serde(default)]
    pub ready_state: ReadyState,
    /// Document title
    #[serde(default)]
    pub title: String,
    /// Visible body text
    #[serde(default)]
    pub body_text: String,
    /// Elements in document order
    #[serde(default)]
    pub elements: Vec<ElementHandle>,
}

impl Snapshot {
    /// Create a loaded, empty page
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ready_state: ReadyState::Complete,
            ..Self::default()
        }
    }

    /// Set ready state
    #[must_use]
    pub const fn with_ready_state(mut self, state: ReadyState) -> Self {
        self.ready_state = state;
        self
    }

    /// Set title
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set body text
    #[must_use]
    pub fn with_body_text(mut self, text: impl Into<String>) -> Self {
        self.body_text = text.into();
        self
    }

    /// Append an element
    #[must_use]
    pub fn with_element(mut self, element: ElementHandle) -> Self {
        self.elements.push(element);
        self
    }

    /// Find an element by handle id
    #[must_use]
    pub fn element(&self, id: &str) -> Option<&ElementHandle> {
        self.elements.iter().find(|e| e.id == id)
    }

    /// Page-wide searchable text: title followed by body text
    #[must_use]
    pub fn page_text(&self) -> String {
        if self.title.is_empty() {
            self.body_text.clone()
        } else {
            format!("{}\n{}", self.title, self.body_text)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_element_defaults() {
        let el = ElementHandle::new("e1", "BUTTON");
        assert_eq!(el.tag, "button");
        assert!(el.visible);
        assert!(el.enabled);
        assert!(el.is_clickable());
        assert!(el.is_editable());
    }

    #[test]
    fn test_obscured_element_not_clickable() {
        let el = ElementHandle::new("e1", "button").obscured("div.modal");
        assert!(!el.is_clickable());
        assert!(el.is_actionable());
        assert!(el.is_editable());
        assert!(!el.with_enabled(false).is_actionable());
    }

    #[test]
    fn test_read_only_not_editable() {
        let el = ElementHandle::new("e1", "input").with_read_only(true);
        assert!(!el.is_editable());
        assert!(el.is_clickable());
    }

    #[test]
    fn test_ready_state() {
        assert!(!ReadyState::Loading.is_ready());
        assert!(!ReadyState::Interactive.is_ready());
        assert!(ReadyState::Complete.is_ready());
        assert_eq!(ReadyState::default(), ReadyState::Loading);
    }

    #[test]
    fn test_page_text_includes_title() {
        let snap = Snapshot::new("http://app/")
            .with_title("StudyHub")
            .with_body_text("Welcome");
        assert_eq!(snap.page_text(), "StudyHub\nWelcome");
        assert_eq!(Snapshot::new("x").with_body_text("b").page_text(), "b");
    }

    #[test]
    fn test_element_yaml_defaults() {
        let yaml = "id: e1\ntag: input\nattributes: { name: email }\n";
        let el: ElementHandle = serde_yaml_ng::from_str(yaml).unwrap();
        assert!(el.visible);
        assert!(el.enabled);
        assert_eq!(el.attr("name"), Some("email"));
        assert!(el.value.is_none());
    }
}
