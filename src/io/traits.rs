//! Trait seams for the external collaborators the engine consumes.
//!
//! Implementations must be thread-safe (`Send + Sync`): files are
//! processed by a rayon worker pool and the services are shared across
//! workers.

use crate::errors::EngineResult;
use std::path::{Path, PathBuf};

/// OCR / text extraction collaborator.
///
/// The engine assumes UTF-8 text and byte-accurate page rendering; the
/// actual PDF machinery lives behind this seam.
pub trait TextService: Send + Sync {
    /// Number of pages in the document.
    fn page_count(&self, source: &Path) -> EngineResult<usize>;

    /// Extract the raw text of one page.
    fn extract_text(&self, source: &Path, page_index: usize) -> EngineResult<String>;

    /// Render one page to bytes (used for page fingerprints and for
    /// publishing split pages).
    fn render_page(&self, source: &Path, page_index: usize) -> EngineResult<Vec<u8>>;
}

/// Filesystem collaborator.
pub trait FileSystemService: Send + Sync {
    /// Read a file fully into memory.
    fn read_bytes(&self, path: &Path) -> EngineResult<Vec<u8>>;

    /// Write bytes to `target` atomically (temp file + rename); no
    /// partial file is ever observable at `target`.
    fn write_bytes_atomic(&self, target: &Path, bytes: &[u8]) -> EngineResult<()>;

    /// Whether a path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Snapshot JSON files in a directory, sorted by filename.
    fn list_snapshots(&self, dir: &Path) -> EngineResult<Vec<PathBuf>>;

    /// Remove a file. Used by snapshot cleanup only.
    fn remove_file(&self, path: &Path) -> EngineResult<()>;
}

/// Clock collaborator for audit timestamps.
pub trait TimeService: Send + Sync {
    /// Current time as an ISO-8601 string.
    fn now_iso8601(&self) -> String;
}
