//! Failure artifacts.
//!
//! When a step fails the runner captures the page and hands the bytes to an
//! [`ArtifactSink`]. The returned [`ArtifactRef`] (location plus SHA-256) is
//! attached to the step's record.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

use crate::result::{WaypostError, WaypostResult};

/// Reference to a stored artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    /// Logical name
    pub name: String,
    /// Where the bytes were written
    pub path: PathBuf,
    /// Hex SHA-256 of the bytes
    pub sha256: String,
    /// Size in bytes
    pub size: usize,
}

impl ArtifactRef {
    fn describe(name: &str, path: PathBuf, data: &[u8]) -> Self {
        Self {
            name: name.to_string(),
            path,
            sha256: sha256_hex(data),
            size: data.len(),
        }
    }
}

/// Hex SHA-256 digest
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Replace anything outside `[A-Za-z0-9_-]` with `_`
#[must_use]
pub fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "artifact".to_string()
    } else {
        cleaned
    }
}

/// Destination for failure artifacts
pub trait ArtifactSink: Send + Sync {
    /// Store `data` under `name` and return where it went
    fn save(&self, name: &str, data: &[u8]) -> WaypostResult<ArtifactRef>;
}

// =============================================================================
// FILESYSTEM
// =============================================================================

/// Writes `<dir>/<name>_<YYYYmmdd_HHMMSS>.png`
#[derive(Debug, Clone)]
pub struct FsArtifactSink {
    dir: PathBuf,
}

impl FsArtifactSink {
    /// Sink writing into `dir` (created on first save)
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Target directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn free_path(&self, stem: &str) -> PathBuf {
        let first = self.dir.join(format!("{stem}.png"));
        if !first.exists() {
            return first;
        }
        (1u32..)
            .map(|n| self.dir.join(format!("{stem}-{n}.png")))
            .find(|p| !p.exists())
            .unwrap_or(first)
    }
}

impl ArtifactSink for FsArtifactSink {
    fn save(&self, name: &str, data: &[u8]) -> WaypostResult<ArtifactRef> {
        std::fs::create_dir_all(&self.dir).map_err(|e| WaypostError::Artifact {
            message: format!("cannot create {}: {e}", self.dir.display()),
        })?;
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let path = self.free_path(&format!("{}_{stamp}", sanitize_name(name)));
        std::fs::write(&path, data)?;
        debug!(path = %path.display(), bytes = data.len(), "artifact written");
        Ok(ArtifactRef::describe(name, path, data))
    }
}

// =============================================================================
// MEMORY
// =============================================================================

/// Keeps artifacts in memory
#[derive(Debug, Default)]
pub struct MemoryArtifactSink {
    saved: Mutex<Vec<(ArtifactRef, Vec<u8>)>>,
}

impl MemoryArtifactSink {
    /// Empty sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// References of everything saved so far
    #[must_use]
    pub fn saved(&self) -> Vec<ArtifactRef> {
        self.saved
            .lock()
            .map(|v| v.iter().map(|(r, _)| r.clone()).collect())
            .unwrap_or_default()
    }

    /// Number of artifacts saved
    #[must_use]
    pub fn len(&self) -> usize {
        self.saved.lock().map(|v| v.len()).unwrap_or_default()
    }

    /// Nothing saved yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ArtifactSink for MemoryArtifactSink {
    fn save(&self, name: &str, data: &[u8]) -> WaypostResult<ArtifactRef> {
        let mut saved = self.saved.lock().map_err(|_| WaypostError::Artifact {
            message: "artifact store poisoned".to_string(),
        })?;
        let path = PathBuf::from(format!("memory/{}-{}", sanitize_name(name), saved.len()));
        let reference = ArtifactRef::describe(name, path, data);
        saved.push((reference.clone(), data.to_vec()));
        Ok(reference)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex_known_value() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("login / submit form"), "login___submit_form");
        assert_eq!(sanitize_name("  "), "artifact");
        assert_eq!(sanitize_name("step-2_ok"), "step-2_ok");
    }

    #[test]
    fn test_fs_sink_writes_timestamped_png() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FsArtifactSink::new(dir.path().join("shots"));
        let r = sink.save("login_submit", b"\x89PNG").unwrap();
        assert!(r.path.exists());
        let file = r.path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(file.starts_with("login_submit_"));
        assert!(file.ends_with(".png"));
        // login_submit_ + YYYYmmdd_HHMMSS + .png
        assert_eq!(file.len(), "login_submit_".len() + 15 + 4);
        assert_eq!(r.size, 4);
        assert_eq!(std::fs::read(&r.path).unwrap(), b"\x89PNG");
    }

    #[test]
    fn test_fs_sink_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FsArtifactSink::new(dir.path());
        let a = sink.save("same", b"one").unwrap();
        let b = sink.save("same", b"two").unwrap();
        assert_ne!(a.path, b.path);
        assert_ne!(a.sha256, b.sha256);
    }

    #[test]
    fn test_memory_sink() {
        let sink = MemoryArtifactSink::new();
        assert!(sink.is_empty());
        let r = sink.save("x", b"data").unwrap();
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.saved()[0], r);
        assert_eq!(r.sha256, sha256_hex(b"data"));
    }
}
