//! Browser session abstraction.
//!
//! The engine never talks to a browser directly. Everything goes through
//! [`BrowserSession`], so a WebDriver client, a CDP client or the in-memory
//! [`ScriptedSession`](crate::scripted::ScriptedSession) can sit behind it.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::result::SessionError;
use crate::snapshot::Snapshot;

/// A single low-level interaction sent to the page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Interaction {
    /// Native pointer click
    Click {
        /// Element handle id
        handle: String,
    },
    /// Programmatic `element.click()` issued from script
    ScriptClick {
        /// Element handle id
        handle: String,
    },
    /// Clear a form control
    Clear {
        /// Element handle id
        handle: String,
    },
    /// Send keystrokes
    SendKeys {
        /// Element handle id
        handle: String,
        /// Text to type
        text: String,
    },
    /// Scroll the element into the viewport
    ScrollIntoView {
        /// Element handle id
        handle: String,
    },
    /// Attach a local file to a file input
    UploadFile {
        /// Element handle id
        handle: String,
        /// Local file path
        path: PathBuf,
    },
}

impl Interaction {
    /// Handle id the interaction targets
    #[must_use]
    pub fn handle(&self) -> &str {
        match self {
            Self::Click { handle }
            | Self::ScriptClick { handle }
            | Self::Clear { handle }
            | Self::SendKeys { handle, .. }
            | Self::ScrollIntoView { handle }
            | Self::UploadFile { handle, .. } => handle,
        }
    }

    /// Short name for logs
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Click { .. } => "click",
            Self::ScriptClick { .. } => "script_click",
            Self::Clear { .. } => "clear",
            Self::SendKeys { .. } => "send_keys",
            Self::ScrollIntoView { .. } => "scroll_into_view",
            Self::UploadFile { .. } => "upload_file",
        }
    }
}

/// Image captured from the session for failure diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    /// Encoded image bytes (PNG)
    pub data: Vec<u8>,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Capture {
    /// Create a new capture
    #[must_use]
    pub const fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
        }
    }

    /// Size in bytes
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }

    /// Has data and non-zero dimensions
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.data.is_empty() && self.width > 0 && self.height > 0
    }
}

/// Abstract browser session.
///
/// One session is owned by exactly one scenario at a time, hence `&mut self`
/// everywhere and `Send` but not `Sync`.
pub trait BrowserSession: Send {
    /// Navigate to an absolute URL
    fn navigate(&mut self, url: &str) -> Result<(), SessionError>;

    /// Take a fresh snapshot of the current page
    fn query_snapshot(&mut self) -> Result<Snapshot, SessionError>;

    /// Dispatch one interaction
    fn dispatch(&mut self, interaction: Interaction) -> Result<(), SessionError>;

    /// Capture the page for diagnostics
    fn capture_artifact(&mut self) -> Result<Capture, SessionError>;
}

impl<S: BrowserSession + ?Sized> BrowserSession for Box<S> {
    fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        (**self).navigate(url)
    }

    fn query_snapshot(&mut self) -> Result<Snapshot, SessionError> {
        (**self).query_snapshot()
    }

    fn dispatch(&mut self, interaction: Interaction) -> Result<(), SessionError> {
        (**self).dispatch(interaction)
    }

    fn capture_artifact(&mut self) -> Result<Capture, SessionError> {
        (**self).capture_artifact()
    }
}
