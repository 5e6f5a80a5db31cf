//! In-memory browser session driven by a page model.
//!
//! [`ScriptedSession`] serves snapshots from a [`SiteModel`] and reacts to
//! interactions: clicks can navigate, typing updates form values, and
//! per-element [`ElementBehavior`] injects the timing problems real pages
//! have (late rendering, overlays that swallow clicks, dropped keystrokes,
//! documents that are still loading).
//!
//! Element handles carry a render generation (`email@3`). Navigating bumps
//! the generation, so handles taken before a navigation go stale.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use crate::result::{SessionError, WaypostResult};
use crate::session::{BrowserSession, Capture, Interaction};
use crate::snapshot::{ElementHandle, ReadyState, Snapshot};

const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];
const DEFAULT_OVERLAY: &str = "div.overlay";

// =============================================================================
// MODEL
// =============================================================================

/// Scripted behaviour attached to one element
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElementBehavior {
    /// Activating the element loads this path
    pub navigates_to: Option<String>,
    /// Number of direct clicks swallowed by an overlay
    pub intercept_clicks: u32,
    /// Element renders hidden for this many snapshots after page load
    pub reveal_after_polls: u32,
    /// Number of `send_keys` calls silently ignored
    pub drop_keys: u32,
    /// Hidden until scrolled into view
    pub offscreen: bool,
}

impl ElementBehavior {
    /// No special behaviour
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Activating loads `path`
    #[must_use]
    pub fn navigates_to(mut self, path: impl Into<String>) -> Self {
        self.navigates_to = Some(path.into());
        self
    }

    /// Swallow the first `n` direct clicks
    #[must_use]
    pub const fn intercept_clicks(mut self, n: u32) -> Self {
        self.intercept_clicks = n;
        self
    }

    /// Stay hidden for the first `n` snapshots
    #[must_use]
    pub const fn reveal_after_polls(mut self, n: u32) -> Self {
        self.reveal_after_polls = n;
        self
    }

    /// Ignore the first `n` keystroke batches
    #[must_use]
    pub const fn drop_keys(mut self, n: u32) -> Self {
        self.drop_keys = n;
        self
    }

    /// Start below the fold
    #[must_use]
    pub const fn offscreen(mut self) -> Self {
        self.offscreen = true;
        self
    }
}

/// One element of a page model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementModel {
    /// Initial element state
    #[serde(flatten)]
    pub element: ElementHandle,
    /// Scripted behaviour
    #[serde(default)]
    pub behavior: ElementBehavior,
}

/// One page of a site model
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageModel {
    /// Document title
    pub title: String,
    /// Visible body text
    pub body_text: String,
    /// Snapshots after load that report the document as still loading
    pub not_ready_polls: u32,
    /// Snapshot queries after load that fail mechanically
    pub stale_queries: u32,
    /// Elements in document order
    pub elements: Vec<ElementModel>,
}

impl PageModel {
    /// Empty page with a title
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Set body text
    #[must_use]
    pub fn with_body_text(mut self, text: impl Into<String>) -> Self {
        self.body_text = text.into();
        self
    }

    /// Report loading for the first `n` snapshots
    #[must_use]
    pub const fn with_not_ready_polls(mut self, n: u32) -> Self {
        self.not_ready_polls = n;
        self
    }

    /// Fail the first `n` snapshot queries
    #[must_use]
    pub const fn with_stale_queries(mut self, n: u32) -> Self {
        self.stale_queries = n;
        self
    }

    /// Add a plain element
    #[must_use]
    pub fn element(self, element: ElementHandle) -> Self {
        self.element_with(element, ElementBehavior::default())
    }

    /// Add an element with behaviour
    #[must_use]
    pub fn element_with(mut self, element: ElementHandle, behavior: ElementBehavior) -> Self {
        self.elements.push(ElementModel { element, behavior });
        self
    }
}

/// A whole site: base URL plus pages keyed by path
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteModel {
    /// Origin the pages are served from
    pub base_url: String,
    /// Page loaded when the session starts
    #[serde(default)]
    pub start: Option<String>,
    /// Pages keyed by path (`/login`)
    #[serde(default)]
    pub pages: BTreeMap<String, PageModel>,
}

impl SiteModel {
    /// Empty site
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            start: None,
            pages: BTreeMap::new(),
        }
    }

    /// Add a page
    #[must_use]
    pub fn page(mut self, path: impl Into<String>, page: PageModel) -> Self {
        self.pages.insert(path.into(), page);
        self
    }

    /// Parse a YAML site model
    pub fn from_yaml(text: &str) -> WaypostResult<Self> {
        let mut site: Self = serde_yaml_ng::from_str(text)?;
        site.base_url = site.base_url.trim_end_matches('/').to_string();
        Ok(site)
    }

    /// Load a YAML site model from disk
    pub fn load(path: &Path) -> WaypostResult<Self> {
        Self::from_yaml(&std::fs::read_to_string(path)?)
    }

    /// Path component of `url` relative to this site
    #[must_use]
    pub fn path_of(&self, url: &str) -> String {
        let own = url
            .strip_prefix(&self.base_url)
            .filter(|_| !self.base_url.is_empty());
        let rest = if let Some(rest) = own {
            rest
        } else if let Some((_, after_scheme)) = url.split_once("://") {
            after_scheme.find('/').map_or("/", |i| &after_scheme[i..])
        } else {
            url
        };
        let path = rest.split(&['?', '#'][..]).next().unwrap_or_default();
        if path.is_empty() {
            "/".to_string()
        } else {
            path.to_string()
        }
    }
}

// =============================================================================
// SESSION
// =============================================================================

#[derive(Debug, Clone)]
struct LiveElement {
    element: ElementHandle,
    behavior: ElementBehavior,
}

#[derive(Debug, Clone)]
struct LivePage {
    path: String,
    title: String,
    body_text: String,
    not_ready_polls: u32,
    stale_remaining: u32,
    renders: u32,
    elements: Vec<LiveElement>,
}

impl LivePage {
    fn load(path: &str, model: &PageModel) -> Self {
        Self {
            path: path.to_string(),
            title: model.title.clone(),
            body_text: model.body_text.clone(),
            not_ready_polls: model.not_ready_polls,
            stale_remaining: model.stale_queries,
            renders: 0,
            elements: model
                .elements
                .iter()
                .map(|m| LiveElement {
                    element: m.element.clone(),
                    behavior: m.behavior.clone(),
                })
                .collect(),
        }
    }

    fn rendered_visible(&self, live: &LiveElement) -> bool {
        live.element.visible
            && !live.behavior.offscreen
            && self.renders > live.behavior.reveal_after_polls
    }
}

/// In-memory [`BrowserSession`]
#[derive(Debug, Clone)]
pub struct ScriptedSession {
    site: SiteModel,
    page: Option<LivePage>,
    generation: u32,
    interactions: Vec<Interaction>,
    navigations: Vec<String>,
    queries: u32,
    capture_fails: bool,
    disconnected: bool,
}

impl ScriptedSession {
    /// Session over a site; loads `site.start` if set
    #[must_use]
    pub fn new(site: SiteModel) -> Self {
        let mut session = Self {
            site,
            page: None,
            generation: 0,
            interactions: Vec::new(),
            navigations: Vec::new(),
            queries: 0,
            capture_fails: false,
            disconnected: false,
        };
        if let Some(start) = session.site.start.clone() {
            if let Some(model) = session.site.pages.get(&start) {
                session.page = Some(LivePage::load(&start, model));
                session.generation = 1;
            }
        }
        session
    }

    /// Make every capture fail
    #[must_use]
    pub const fn with_failing_capture(mut self) -> Self {
        self.capture_fails = true;
        self
    }

    /// Simulate the browser going away
    pub fn disconnect(&mut self) {
        self.disconnected = true;
    }

    /// Interactions dispatched so far
    #[must_use]
    pub fn interactions(&self) -> &[Interaction] {
        &self.interactions
    }

    /// URLs navigated to so far
    #[must_use]
    pub fn navigations(&self) -> &[String] {
        &self.navigations
    }

    /// Snapshot queries issued so far
    #[must_use]
    pub const fn queries(&self) -> u32 {
        self.queries
    }

    /// Path of the current page
    #[must_use]
    pub fn current_path(&self) -> Option<&str> {
        self.page.as_ref().map(|p| p.path.as_str())
    }

    /// Current value of a form control, by model element id
    #[must_use]
    pub fn field_value(&self, element_id: &str) -> Option<&str> {
        self.page
            .as_ref()?
            .elements
            .iter()
            .find(|e| e.element.id == element_id)?
            .element
            .value
            .as_deref()
    }

    fn load_path(&mut self, path: &str) -> Result<(), SessionError> {
        let model = self
            .site
            .pages
            .get(path)
            .ok_or_else(|| SessionError::NavigationFailed {
                url: format!("{}{path}", self.site.base_url),
                message: "no such page".to_string(),
            })?;
        self.page = Some(LivePage::load(path, model));
        self.generation += 1;
        debug!(path, generation = self.generation, "scripted page loaded");
        Ok(())
    }

    fn check_connected(&self) -> Result<(), SessionError> {
        if self.disconnected {
            return Err(SessionError::Disconnected {
                message: "scripted session closed".to_string(),
            });
        }
        Ok(())
    }

    fn handle_for(&self, id: &str) -> String {
        format!("{id}@{}", self.generation)
    }

    /// Index of the live element a handle refers to
    fn locate(&self, handle: &str) -> Result<usize, SessionError> {
        let stale = || SessionError::StaleElement {
            handle: handle.to_string(),
        };
        let (id, generation) = handle.rsplit_once('@').ok_or_else(stale)?;
        if generation.parse::<u32>().ok() != Some(self.generation) {
            return Err(stale());
        }
        self.page
            .as_ref()
            .and_then(|p| p.elements.iter().position(|e| e.element.id == id))
            .ok_or_else(stale)
    }

    fn require_editable(&self, index: usize, handle: &str) -> Result<(), SessionError> {
        let Some(page) = self.page.as_ref() else {
            return Err(SessionError::StaleElement {
                handle: handle.to_string(),
            });
        };
        let live = &page.elements[index];
        if !page.rendered_visible(live) || !live.element.enabled || live.element.read_only {
            return Err(SessionError::NotInteractable {
                handle: handle.to_string(),
                message: "element is not editable".to_string(),
            });
        }
        Ok(())
    }

    fn activate(&mut self, index: usize) -> Result<(), SessionError> {
        let target = self
            .page
            .as_ref()
            .and_then(|p| p.elements[index].behavior.navigates_to.clone());
        match target {
            Some(path) => self.load_path(&path),
            None => Ok(()),
        }
    }

    fn page_mut(&mut self) -> Result<&mut LivePage, SessionError> {
        self.page.as_mut().ok_or_else(|| SessionError::QueryFailed {
            message: "no page loaded".to_string(),
        })
    }
}

impl BrowserSession for ScriptedSession {
    fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        self.check_connected()?;
        self.navigations.push(url.to_string());
        let path = self.site.path_of(url);
        self.load_path(&path)
    }

    fn query_snapshot(&mut self) -> Result<Snapshot, SessionError> {
        self.check_connected()?;
        self.queries += 1;
        let generation = self.generation;
        let base_url = self.site.base_url.clone();
        let Some(page) = self.page.as_mut() else {
            return Ok(Snapshot::new("about:blank"));
        };
        if page.stale_remaining > 0 {
            page.stale_remaining -= 1;
            return Err(SessionError::QueryFailed {
                message: "document is being replaced".to_string(),
            });
        }
        page.renders += 1;
        let ready_state = if page.renders <= page.not_ready_polls {
            ReadyState::Loading
        } else {
            ReadyState::Complete
        };
        let page = &*page;
        let mut snapshot = Snapshot::new(format!("{base_url}{}", page.path))
            .with_ready_state(ready_state)
            .with_title(page.title.clone())
            .with_body_text(page.body_text.clone());
        for live in &page.elements {
            let mut element = live.element.clone();
            element.id = format!("{}@{generation}", live.element.id);
            element.visible = page.rendered_visible(live);
            snapshot.elements.push(element);
        }
        Ok(snapshot)
    }

    fn dispatch(&mut self, interaction: Interaction) -> Result<(), SessionError> {
        self.check_connected()?;
        self.interactions.push(interaction.clone());
        let index = self.locate(interaction.handle())?;

        match interaction {
            Interaction::Click { handle } => {
                let page = self.page_mut()?;
                let visible = page.rendered_visible(&page.elements[index]);
                let live = &mut page.elements[index];
                if !visible || !live.element.enabled {
                    return Err(SessionError::NotInteractable {
                        handle,
                        message: "element is not clickable".to_string(),
                    });
                }
                if let Some(by) = live.element.obscured_by.clone() {
                    return Err(SessionError::ClickIntercepted { handle, by });
                }
                if live.behavior.intercept_clicks > 0 {
                    live.behavior.intercept_clicks -= 1;
                    return Err(SessionError::ClickIntercepted {
                        handle,
                        by: DEFAULT_OVERLAY.to_string(),
                    });
                }
                self.activate(index)
            }
            Interaction::ScriptClick { .. } => self.activate(index),
            Interaction::Clear { handle } => {
                self.require_editable(index, &handle)?;
                self.page_mut()?.elements[index].element.value = Some(String::new());
                Ok(())
            }
            Interaction::SendKeys { handle, text } => {
                self.require_editable(index, &handle)?;
                let live = &mut self.page_mut()?.elements[index];
                if live.behavior.drop_keys > 0 {
                    live.behavior.drop_keys -= 1;
                    debug!(%handle, "scripted keystrokes dropped");
                    return Ok(());
                }
                live.element.value.get_or_insert_with(String::new).push_str(&text);
                Ok(())
            }
            Interaction::ScrollIntoView { .. } => {
                self.page_mut()?.elements[index].behavior.offscreen = false;
                Ok(())
            }
            Interaction::UploadFile { handle, path } => {
                let live = &mut self.page_mut()?.elements[index];
                if live.element.tag != "input" || live.element.attr("type") != Some("file") {
                    return Err(SessionError::NotInteractable {
                        handle,
                        message: "element is not a file input".to_string(),
                    });
                }
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                live.element.value = Some(name);
                Ok(())
            }
        }
    }

    fn capture_artifact(&mut self) -> Result<Capture, SessionError> {
        self.check_connected()?;
        if self.capture_fails {
            return Err(SessionError::CaptureFailed {
                message: "capture disabled".to_string(),
            });
        }
        let mut data = PNG_MAGIC.to_vec();
        let url = self
            .page
            .as_ref()
            .map_or_else(|| "about:blank".to_string(), |p| p.path.clone());
        data.extend_from_slice(url.as_bytes());
        data.extend_from_slice(self.handle_for("capture").as_bytes());
        Ok(Capture::new(data, 1280, 720))
    }
}
