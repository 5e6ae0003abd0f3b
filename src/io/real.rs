//! Production implementations of the collaborator traits.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::errors::{EngineError, EngineResult};
use crate::io::traits::{FileSystemService, TextService, TimeService};

/// Counter for unique temp file names within one process.
static TEMP_FILE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Standard-library filesystem with atomic writes.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdFileSystem;

impl StdFileSystem {
    /// Temp path next to the target so the rename stays on one filesystem.
    fn temp_path_for(target: &Path) -> PathBuf {
        let counter = TEMP_FILE_COUNTER.fetch_add(1, Ordering::SeqCst);
        let pid = std::process::id();
        let name = target
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("out");
        let temp_name = format!(".{name}.tmp.{pid}.{counter}");
        match target.parent() {
            Some(parent) => parent.join(temp_name),
            None => PathBuf::from(temp_name),
        }
    }
}

impl FileSystemService for StdFileSystem {
    fn read_bytes(&self, path: &Path) -> EngineResult<Vec<u8>> {
        fs::read(path).map_err(|e| EngineError::io(path, e.to_string()))
    }

    fn write_bytes_atomic(&self, target: &Path, bytes: &[u8]) -> EngineResult<()> {
        if let Some(parent) = target.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| EngineError::io(parent, e.to_string()))?;
            }
        }
        let temp = Self::temp_path_for(target);
        fs::write(&temp, bytes).map_err(|e| EngineError::io(&temp, e.to_string()))?;
        fs::rename(&temp, target).map_err(|e| {
            // Leave no temp litter on failure.
            let _ = fs::remove_file(&temp);
            EngineError::io(target, e.to_string())
        })
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn list_snapshots(&self, dir: &Path) -> EngineResult<Vec<PathBuf>> {
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut paths: Vec<PathBuf> = fs::read_dir(dir)
            .map_err(|e| EngineError::io(dir, e.to_string()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();
        Ok(paths)
    }

    fn remove_file(&self, path: &Path) -> EngineResult<()> {
        fs::remove_file(path).map_err(|e| EngineError::io(path, e.to_string()))
    }
}

/// System clock with local offset, RFC 3339 formatted.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeService;

impl TimeService for SystemTimeService {
    fn now_iso8601(&self) -> String {
        chrono::Local::now().to_rfc3339()
    }
}

/// Text service backed by sidecar files.
///
/// The PDF/OCR engine is an external collaborator; this adapter is the
/// seam it plugs into. For a source `doc.pdf` it reads, in order:
///
/// - `doc.pages.json`: a JSON array of page text strings, or
/// - `doc.txt`: whole-document text treated as a single page, or
/// - the source itself when it is valid UTF-8, as a single page.
#[derive(Debug, Default, Clone, Copy)]
pub struct SidecarTextService;

impl SidecarTextService {
    fn load_pages(&self, source: &Path) -> EngineResult<Vec<String>> {
        let pages_json = source.with_extension("pages.json");
        if pages_json.exists() {
            let raw = fs::read_to_string(&pages_json)
                .map_err(|e| EngineError::io(&pages_json, e.to_string()))?;
            return serde_json::from_str(&raw).map_err(|e| EngineError::SourceUnreadable {
                path: source.to_path_buf(),
                reason: format!("invalid sidecar page array: {e}"),
            });
        }

        let txt = source.with_extension("txt");
        if txt.exists() {
            let raw =
                fs::read_to_string(&txt).map_err(|e| EngineError::io(&txt, e.to_string()))?;
            return Ok(vec![raw]);
        }

        let bytes = fs::read(source).map_err(|e| EngineError::SourceUnreadable {
            path: source.to_path_buf(),
            reason: e.to_string(),
        })?;
        match String::from_utf8(bytes) {
            Ok(text) => Ok(vec![text]),
            Err(_) => Err(EngineError::SourceUnreadable {
                path: source.to_path_buf(),
                reason: "no sidecar text and source is not UTF-8".to_string(),
            }),
        }
    }
}

impl TextService for SidecarTextService {
    fn page_count(&self, source: &Path) -> EngineResult<usize> {
        Ok(self.load_pages(source)?.len())
    }

    fn extract_text(&self, source: &Path, page_index: usize) -> EngineResult<String> {
        let pages = self.load_pages(source)?;
        pages
            .get(page_index)
            .cloned()
            .ok_or_else(|| EngineError::SourceUnreadable {
                path: source.to_path_buf(),
                reason: format!("page {page_index} out of range ({} pages)", pages.len()),
            })
    }

    fn render_page(&self, source: &Path, page_index: usize) -> EngineResult<Vec<u8>> {
        // Sidecar rendering is the page text itself; byte-accurate per the
        // service contract, and stable for fingerprinting.
        Ok(self.extract_text(source, page_index)?.into_bytes())
    }
}
