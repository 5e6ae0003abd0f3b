//! Typed error values for the classification engine.
//!
//! Pure components return these by value; only the pipeline orchestrator
//! converts recoverable variants into per-page outcomes. Fatal variants
//! (`TokyoConstraintViolation`, `InvalidPeriod`, unreadable snapshot
//! storage) abort the whole job and map to dedicated process exit codes.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the engine.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Error taxonomy for the classification-and-naming pipeline.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// A jurisdiction set places Tokyo at an index other than 1. Fatal.
    #[error("Tokyo must occupy jurisdiction set #1 (found at set #{found_index})")]
    TokyoConstraintViolation {
        /// Index at which Tokyo was actually found (1-based).
        found_index: usize,
    },

    /// UI-provided period is not a valid YYMM. Fatal when set explicitly.
    #[error("invalid period '{value}': expected YYMM with year 01-99 and month 01-12")]
    InvalidPeriod {
        /// The rejected input, post-normalization.
        value: String,
    },

    /// The source PDF could not be read or rendered. Per-file fatal.
    #[error("source unreadable: {}: {reason}", path.display())]
    SourceUnreadable { path: PathBuf, reason: String },

    /// A persisted snapshot exists but cannot be used. Per-file fatal.
    #[error("snapshot corrupt for {source_doc_md5}: {reason}")]
    SnapshotCorrupt {
        source_doc_md5: String,
        reason: String,
    },

    /// The observed prefecture/city does not appear in the job's sets.
    #[error("jurisdiction not present in UI sets: {prefecture} {city:?}")]
    UnknownJurisdictionInSets {
        prefecture: String,
        city: Option<String>,
    },

    /// A UI-mandated input is missing in interactive mode.
    #[error("user input required for code {code}: {field}")]
    NeedsUserInput {
        /// Document code that forced the requirement.
        code: String,
        /// Which field is missing (currently always `YYMM`).
        field: InputField,
    },

    /// A composed filename failed final validation.
    #[error("invalid filename '{filename}': {reason}")]
    InvalidName { filename: String, reason: String },

    /// Snapshot storage directory cannot be created or written. Fatal.
    #[error("snapshot storage unusable at {}: {reason}", path.display())]
    StorageUnusable { path: PathBuf, reason: String },

    /// Internal invariant violation with diagnostic context. Fatal.
    #[error("internal invariant violated: {0}")]
    Invariant(String),

    /// I/O failure outside the categories above.
    #[error("io error: {}: {reason}", path.display())]
    Io { path: PathBuf, reason: String },
}

/// UI-mandated input kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputField {
    /// Reporting period, two-digit year + two-digit month.
    Yymm,
}

impl std::fmt::Display for InputField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputField::Yymm => write!(f, "YYMM"),
        }
    }
}

impl EngineError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Io {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error aborts the entire job rather than one file.
    pub fn is_job_fatal(&self) -> bool {
        matches!(
            self,
            Self::TokyoConstraintViolation { .. }
                | Self::InvalidPeriod { .. }
                | Self::StorageUnusable { .. }
                | Self::Invariant(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokyo_violation_is_job_fatal() {
        let err = EngineError::TokyoConstraintViolation { found_index: 3 };
        assert!(err.is_job_fatal());
        assert!(err.to_string().contains("set #3"));
    }

    #[test]
    fn source_unreadable_is_per_file() {
        let err = EngineError::SourceUnreadable {
            path: PathBuf::from("a.pdf"),
            reason: "render failed".into(),
        };
        assert!(!err.is_job_fatal());
    }

    #[test]
    fn invalid_name_mentions_filename() {
        let err = EngineError::InvalidName {
            filename: "bad.pdf".into(),
            reason: "missing code prefix".into(),
        };
        assert!(err.to_string().contains("bad.pdf"));
    }
}
