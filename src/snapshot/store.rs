//! Content-addressed snapshot store.
//!
//! Snapshots are keyed by the MD5 of the source PDF and written once;
//! a matching key on disk short-circuits the whole extraction pass.
//! Corrupt snapshot JSON is treated as absent and rebuilt, which keeps
//! concurrent writers safe too: both produce identical content for the
//! same key, so last-writer-wins is indistinguishable from first.

use serde_json::json;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::patterns::{
    detect_code_hint, detect_doc_hints, detect_municipality, detect_tax_kind, DATE_PATTERN,
};
use crate::classify::normalize::normalize_snapshot_text;
use crate::core::hashing::{bucket_key, md5_hex, text_sha1};
use crate::core::types::{
    PageFingerprint, PreExtractSnapshot, RenameFields, SnapshotMeta, SNAPSHOT_VERSION,
};
use crate::errors::{EngineError, EngineResult};
use crate::io::traits::{FileSystemService, TextService, TimeService};
use crate::period::validate_ui_yymm;

/// Snapshot builder and cache.
pub struct SnapshotStore {
    snapshot_dir: PathBuf,
    max_scan_pages: Option<usize>,
}

impl SnapshotStore {
    pub fn new(snapshot_dir: impl Into<PathBuf>, max_scan_pages: Option<usize>) -> Self {
        Self {
            snapshot_dir: snapshot_dir.into(),
            max_scan_pages,
        }
    }

    pub fn snapshot_dir(&self) -> &Path {
        &self.snapshot_dir
    }

    /// On-disk location for a source key.
    pub fn snapshot_path(&self, source_doc_md5: &str) -> PathBuf {
        self.snapshot_dir.join(format!("{source_doc_md5}.json"))
    }

    /// Load a snapshot by key; absent or unparsable files yield `None`.
    pub fn load(
        &self,
        fs: &dyn FileSystemService,
        source_doc_md5: &str,
    ) -> Option<PreExtractSnapshot> {
        let path = self.snapshot_path(source_doc_md5);
        if !fs.exists(&path) {
            return None;
        }
        let bytes = fs.read_bytes(&path).ok()?;
        match serde_json::from_slice::<PreExtractSnapshot>(&bytes) {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                warn!(source_doc_md5, %err, "snapshot unparsable, will rebuild");
                None
            }
        }
    }

    /// Build a snapshot for a source PDF, or return the cached one.
    ///
    /// The UI period, when given, is validated and becomes the only
    /// source for the per-page period field; page content never does.
    pub fn build_or_load(
        &self,
        source: &Path,
        ui_yymm: Option<&str>,
        ui_context: BTreeMap<String, serde_json::Value>,
        text_svc: &dyn TextService,
        fs: &dyn FileSystemService,
        time: &dyn TimeService,
    ) -> EngineResult<PreExtractSnapshot> {
        let yymm = match ui_yymm {
            Some(raw) => {
                let validated = validate_ui_yymm(raw)?;
                info!("[AUDIT][YYMM] source=GUI value={validated} validation=PASSED");
                Some(validated)
            }
            None => None,
        };

        let source_bytes = fs.read_bytes(source).map_err(|e| EngineError::SourceUnreadable {
            path: source.to_path_buf(),
            reason: e.to_string(),
        })?;
        let source_doc_md5 = md5_hex(&source_bytes);

        if let Some(existing) = self.load(fs, &source_doc_md5) {
            info!(source_doc_md5 = %source_doc_md5, "using existing snapshot");
            return Ok(existing);
        }

        let page_count = text_svc.page_count(source)?;
        let scan_pages = self
            .max_scan_pages
            .map_or(page_count, |cap| page_count.min(cap));
        debug!(
            source = %source.display(),
            scan_pages, page_count, "building snapshot"
        );

        let mut pages = Vec::with_capacity(scan_pages);
        let mut fingerprints = Vec::with_capacity(scan_pages);
        for page_index in 0..scan_pages {
            let raw_text = text_svc.extract_text(source, page_index)?;
            let normalized = normalize_snapshot_text(&raw_text);

            let page_bytes = text_svc.render_page(source, page_index)?;
            fingerprints.push(PageFingerprint {
                page_md5: md5_hex(&page_bytes),
                text_sha1: text_sha1(&normalized),
            });

            let fields =
                Self::infer_rename_fields(&normalized, page_index, yymm.as_deref(), &source_doc_md5);
            debug!(
                page_index,
                code_hint = fields.code_hint.as_deref().unwrap_or("-"),
                muni = fields.muni_name.as_deref().unwrap_or("-"),
                "page scanned"
            );
            pages.push(fields);
        }

        let snapshot = PreExtractSnapshot {
            source_path: source.to_path_buf(),
            source_doc_md5: source_doc_md5.clone(),
            pages,
            fingerprints,
            created_at: time.now_iso8601(),
            version: SNAPSHOT_VERSION.to_string(),
            meta: SnapshotMeta {
                yymm_source: yymm.as_ref().map(|_| "GUI".to_string()),
                yymm,
                ui_context,
            },
        };

        self.persist(&snapshot, fs)?;
        Ok(snapshot)
    }

    /// Infer rename fields from normalized page text. The period comes
    /// from the UI value only.
    fn infer_rename_fields(
        normalized: &str,
        page_index: usize,
        ui_yymm: Option<&str>,
        source_doc_md5: &str,
    ) -> RenameFields {
        let code_hint = detect_code_hint(normalized);
        let muni_name = detect_municipality(normalized);

        let serial_bucket = code_hint
            .as_deref()
            .filter(|c| c.starts_with('1') || c.starts_with('2'))
            .map(|_| bucket_key(source_doc_md5, muni_name.as_deref(), ui_yymm));

        let mut extra = BTreeMap::new();
        extra.insert("page_index".to_string(), json!(page_index));
        extra.insert("text_length".to_string(), json!(normalized.chars().count()));
        extra.insert(
            "has_date".to_string(),
            json!(DATE_PATTERN.is_match(normalized)),
        );

        RenameFields {
            code_hint,
            doc_hints: detect_doc_hints(normalized),
            muni_name,
            tax_kind: detect_tax_kind(normalized),
            period_yymm: ui_yymm.map(String::from),
            serial_bucket,
            extra,
        }
    }

    fn persist(
        &self,
        snapshot: &PreExtractSnapshot,
        fs: &dyn FileSystemService,
    ) -> EngineResult<()> {
        let path = self.snapshot_path(&snapshot.source_doc_md5);
        let json = serde_json::to_vec_pretty(snapshot).map_err(|e| {
            EngineError::SnapshotCorrupt {
                source_doc_md5: snapshot.source_doc_md5.clone(),
                reason: format!("serialization failed: {e}"),
            }
        })?;
        fs.write_bytes_atomic(&path, &json)
            .map_err(|e| EngineError::StorageUnusable {
                path: self.snapshot_dir.clone(),
                reason: e.to_string(),
            })?;
        info!(path = %path.display(), "snapshot saved");
        Ok(())
    }

    /// Delete snapshot files whose `created_at` is older than
    /// `max_age_days`, judged against the time service. Unparsable
    /// snapshot files count as stale; they would be rebuilt on the next
    /// run anyway. Returns the number removed; per-file errors are
    /// skipped.
    pub fn cleanup_old_snapshots(
        &self,
        max_age_days: u64,
        fs: &dyn FileSystemService,
        time: &dyn TimeService,
    ) -> usize {
        let Ok(listed) = fs.list_snapshots(&self.snapshot_dir) else {
            return 0;
        };
        let Ok(now) = chrono::DateTime::parse_from_rfc3339(&time.now_iso8601()) else {
            return 0;
        };
        let cutoff = now - chrono::Duration::days(max_age_days as i64);

        let mut removed = 0;
        for path in listed {
            let created_at = fs
                .read_bytes(&path)
                .ok()
                .and_then(|bytes| serde_json::from_slice::<PreExtractSnapshot>(&bytes).ok())
                .and_then(|snapshot| {
                    chrono::DateTime::parse_from_rfc3339(&snapshot.created_at).ok()
                });
            let stale = created_at.is_none_or(|created| created < cutoff);
            if stale && fs.remove_file(&path).is_ok() {
                debug!(path = %path.display(), "stale snapshot removed");
                removed += 1;
            }
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::real::{SidecarTextService, StdFileSystem, SystemTimeService};
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn write_source(dir: &Path, stem: &str, pages: &[&str]) -> PathBuf {
        let pdf = dir.join(format!("{stem}.pdf"));
        fs::write(&pdf, format!("%PDF-{stem}")).unwrap();
        fs::write(
            dir.join(format!("{stem}.pages.json")),
            serde_json::to_string(pages).unwrap(),
        )
        .unwrap();
        pdf
    }

    fn store(dir: &Path) -> SnapshotStore {
        SnapshotStore::new(dir.join("snapshots"), None)
    }

    #[test]
    fn build_extracts_fields_and_persists() {
        let dir = TempDir::new().unwrap();
        let pdf = write_source(
            dir.path(),
            "doc",
            &["法人税及び地方法人税申告書 税務署 2025/07/31"],
        );
        let store = store(dir.path());
        let snapshot = store
            .build_or_load(
                &pdf,
                Some("2507"),
                BTreeMap::new(),
                &SidecarTextService,
                &StdFileSystem,
                &SystemTimeService,
            )
            .unwrap();

        assert_eq!(snapshot.pages.len(), 1);
        let page = &snapshot.pages[0];
        assert_eq!(page.code_hint.as_deref(), Some("0001"));
        assert_eq!(page.tax_kind.as_deref(), Some("国税"));
        assert_eq!(page.period_yymm.as_deref(), Some("2507"));
        assert_eq!(page.extra["has_date"], json!(true));
        assert!(store
            .snapshot_path(&snapshot.source_doc_md5)
            .exists());
    }

    #[test]
    fn second_build_reuses_cached_snapshot() {
        let dir = TempDir::new().unwrap();
        let pdf = write_source(dir.path(), "doc", &["少額減価償却資産明細表"]);
        let store = store(dir.path());
        let services = (SidecarTextService, StdFileSystem, SystemTimeService);

        let first = store
            .build_or_load(&pdf, Some("2401"), BTreeMap::new(), &services.0, &services.1, &services.2)
            .unwrap();
        // Changing the sidecar must not matter: the cache is keyed by the
        // PDF bytes.
        fs::write(dir.path().join("doc.pages.json"), r#"["別の内容"]"#).unwrap();
        let second = store
            .build_or_load(&pdf, Some("2401"), BTreeMap::new(), &services.0, &services.1, &services.2)
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn corrupt_snapshot_is_rebuilt() {
        let dir = TempDir::new().unwrap();
        let pdf = write_source(dir.path(), "doc", &["受信通知 愛知県蒲郡市 1003"]);
        let store = store(dir.path());

        let snapshot = store
            .build_or_load(
                &pdf,
                Some("2508"),
                BTreeMap::new(),
                &SidecarTextService,
                &StdFileSystem,
                &SystemTimeService,
            )
            .unwrap();
        fs::write(store.snapshot_path(&snapshot.source_doc_md5), "not json").unwrap();

        let rebuilt = store
            .build_or_load(
                &pdf,
                Some("2508"),
                BTreeMap::new(),
                &SidecarTextService,
                &StdFileSystem,
                &SystemTimeService,
            )
            .unwrap();
        assert_eq!(rebuilt.pages[0].code_hint.as_deref(), Some("1003"));
    }

    #[test]
    fn invalid_ui_period_is_rejected() {
        let dir = TempDir::new().unwrap();
        let pdf = write_source(dir.path(), "doc", &["x"]);
        let err = store(dir.path())
            .build_or_load(
                &pdf,
                Some("13"),
                BTreeMap::new(),
                &SidecarTextService,
                &StdFileSystem,
                &SystemTimeService,
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidPeriod { .. }));
    }

    #[test]
    fn local_tax_pages_get_serial_buckets() {
        let dir = TempDir::new().unwrap();
        let pdf = write_source(dir.path(), "doc", &["申告受付完了通知 2003 愛知県蒲郡市"]);
        let snapshot = store(dir.path())
            .build_or_load(
                &pdf,
                Some("2508"),
                BTreeMap::new(),
                &SidecarTextService,
                &StdFileSystem,
                &SystemTimeService,
            )
            .unwrap();
        let page = &snapshot.pages[0];
        assert_eq!(page.code_hint.as_deref(), Some("2003"));
        assert!(page.serial_bucket.is_some());
    }

    #[test]
    fn page_cap_limits_scanning() {
        let dir = TempDir::new().unwrap();
        let pdf = write_source(dir.path(), "doc", &["一枚目", "二枚目", "三枚目"]);
        let store = SnapshotStore::new(dir.path().join("snapshots"), Some(2));
        let snapshot = store
            .build_or_load(
                &pdf,
                Some("2507"),
                BTreeMap::new(),
                &SidecarTextService,
                &StdFileSystem,
                &SystemTimeService,
            )
            .unwrap();
        assert_eq!(snapshot.pages.len(), 2);
    }

    #[test]
    fn cleanup_removes_stale_snapshots_by_created_at() {
        let dir = TempDir::new().unwrap();
        let store = store(dir.path());
        let pdf = write_source(dir.path(), "doc", &["受信通知 東京都"]);
        let snapshot = store
            .build_or_load(
                &pdf,
                Some("2508"),
                BTreeMap::new(),
                &SidecarTextService,
                &StdFileSystem,
                &SystemTimeService,
            )
            .unwrap();

        // Fresh snapshots survive.
        assert_eq!(
            store.cleanup_old_snapshots(30, &StdFileSystem, &SystemTimeService),
            0
        );

        // Backdate the stored copy.
        let path = store.snapshot_path(&snapshot.source_doc_md5);
        let mut stored: PreExtractSnapshot =
            serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        stored.created_at = "2020-01-01T00:00:00+09:00".into();
        fs::write(&path, serde_json::to_vec_pretty(&stored).unwrap()).unwrap();

        assert_eq!(
            store.cleanup_old_snapshots(30, &StdFileSystem, &SystemTimeService),
            1
        );
        assert!(!path.exists());
    }
}
