//! Data model for the classification-and-naming pipeline.
//!
//! Snapshots and their page fields are immutable once built; the
//! classification record carries everything needed to reproduce the same
//! filename on a re-run against the same snapshot and job context.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Synthetic code for pages no rule claims with enough confidence.
pub const UNCLASSIFIED_CODE: &str = "9999";

/// Current on-disk snapshot format version.
pub const SNAPSHOT_VERSION: &str = "5.4";

/// Per-page metadata inferred at snapshot time.
///
/// `period_yymm` is populated exclusively from the UI-provided value;
/// nothing on the page itself may set it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenameFields {
    /// Document code hint detected on the page (e.g. `1003`, `2001`).
    #[serde(default)]
    pub code_hint: Option<String>,
    /// Ordered document-type hints (受信通知 / 納付情報 / 申告書 ...).
    #[serde(default)]
    pub doc_hints: Vec<String>,
    /// Jurisdiction name as printed on the page (東京都, 愛知県蒲郡市, ...).
    #[serde(default)]
    pub muni_name: Option<String>,
    /// Tax-kind hint (国税 / 地方税 / 消費税).
    #[serde(default)]
    pub tax_kind: Option<String>,
    /// Reporting period, UI-provided only.
    #[serde(default)]
    pub period_yymm: Option<String>,
    /// Serial-bucket key for local-tax receipt sequencing.
    #[serde(default)]
    pub serial_bucket: Option<String>,
    /// Extensible attribute map (page index, text length, ...).
    #[serde(default)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Uniqueness fingerprint of a single page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageFingerprint {
    /// MD5 over the rendered page bytes.
    pub page_md5: String,
    /// SHA-1 over the normalized page text.
    pub text_sha1: String,
}

/// Stable identity of one logical page, invariant under bundle splitting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocItemId {
    /// MD5 of the whole source PDF.
    pub source_doc_md5: String,
    /// Zero-based page index in the source.
    pub page_index: usize,
    /// Page fingerprint.
    pub fp: PageFingerprint,
}

/// Snapshot metadata: the UI context captured at build time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    /// UI-confirmed period.
    #[serde(default)]
    pub yymm: Option<String>,
    /// Where the period came from.
    #[serde(default)]
    pub yymm_source: Option<String>,
    /// Opaque UI settings captured for audit.
    #[serde(default)]
    pub ui_context: BTreeMap<String, serde_json::Value>,
}

/// Immutable per-source snapshot of extracted page metadata.
///
/// Persisted as JSON keyed by `source_doc_md5`; write-once, read-only
/// thereafter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreExtractSnapshot {
    /// Path of the source PDF at build time.
    pub source_path: PathBuf,
    /// MD5 of the whole source PDF (also the storage key).
    pub source_doc_md5: String,
    /// Page-ordered rename fields.
    pub pages: Vec<RenameFields>,
    /// Page fingerprints, parallel to `pages`.
    #[serde(default)]
    pub fingerprints: Vec<PageFingerprint>,
    /// ISO-8601 build timestamp.
    pub created_at: String,
    /// Snapshot format version.
    pub version: String,
    /// UI context captured at build time.
    #[serde(default)]
    pub meta: SnapshotMeta,
}

/// Where a resolved period value came from, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeriodSource {
    /// Forced from UI because the code mandates it.
    #[serde(rename = "UI_FORCED")]
    UiForced,
    /// Taken from the job context's confirmed value.
    #[serde(rename = "UI")]
    Ui,
    /// UI value used as fallback for a non-forced code.
    #[serde(rename = "UI_FALLBACK")]
    UiFallback,
    /// Supplied directly by the GUI at snapshot build.
    #[serde(rename = "GUI")]
    Gui,
    /// Parsed from the document text.
    #[serde(rename = "DOC/HEURISTIC")]
    DocHeuristic,
    /// Deferred: UI input still required.
    #[serde(rename = "NEEDS_UI")]
    NeedsUi,
    /// No period available.
    #[serde(rename = "NONE")]
    None,
}

impl std::fmt::Display for PeriodSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            PeriodSource::UiForced => "UI_FORCED",
            PeriodSource::Ui => "UI",
            PeriodSource::UiFallback => "UI_FALLBACK",
            PeriodSource::Gui => "GUI",
            PeriodSource::DocHeuristic => "DOC/HEURISTIC",
            PeriodSource::NeedsUi => "NEEDS_UI",
            PeriodSource::None => "NONE",
        };
        f.write_str(tag)
    }
}

/// Final classification of one page, post overlay and period resolution.
///
/// `display_code` drives logs and UI, `final_code` drives the filename;
/// the distinction is explicit so the two can be reconciled in audit
/// output (triple consistency).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationRecord {
    /// Code chosen by the classifier.
    pub base_code: String,
    /// Jurisdictional upgrade, local-tax domain only.
    #[serde(default)]
    pub overlay_code: Option<String>,
    /// Resolved reporting period.
    #[serde(default)]
    pub yymm: Option<String>,
    /// Source of the period value.
    pub yymm_source: PeriodSource,
    /// Human title for the base code.
    pub title: String,
    /// Classifier confidence in `[0, 1]`.
    pub confidence: f64,
    /// Classification method tag.
    pub method: String,
    /// Keywords that matched, in rule declaration order.
    pub matched_keywords: Vec<String>,
    /// Auxiliary data (domain, overlay reason, no-split flag, ...).
    #[serde(default)]
    pub meta: BTreeMap<String, serde_json::Value>,
}

impl ClassificationRecord {
    /// Code shown in UI and logs: always the base code.
    pub fn display_code(&self) -> &str {
        &self.base_code
    }

    /// Code used in the filename: overlay if present, else base.
    pub fn final_code(&self) -> &str {
        self.overlay_code.as_deref().unwrap_or(&self.base_code)
    }

    /// Whether an overlay actually changed the code.
    pub fn has_overlay(&self) -> bool {
        self.overlay_code
            .as_deref()
            .is_some_and(|c| c != self.base_code)
    }
}

/// Per-page result reported to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClassificationOutcome {
    /// A file was produced.
    File {
        output_path: PathBuf,
        display_code: String,
        final_code: String,
        yymm: String,
        yymm_source: PeriodSource,
        confidence: f64,
        method: String,
        matched_keywords: Vec<String>,
        #[serde(default)]
        overlay_reason: Option<String>,
    },
    /// Deferred: the code mandates a UI period that is missing.
    NeedsUi { code: String, field: String },
    /// Processing failed at a named stage.
    Error { stage: String, message: String },
}

impl ClassificationOutcome {
    /// Whether this outcome still requires user input.
    pub fn needs_ui(&self) -> bool {
        matches!(self, ClassificationOutcome::NeedsUi { .. })
    }
}
