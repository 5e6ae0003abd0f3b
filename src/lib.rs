// Export modules for library usage
pub mod classify;
pub mod cli;
pub mod config;
pub mod core;
pub mod errors;
pub mod io;
pub mod job;
pub mod naming;
pub mod observability;
pub mod overlay;
pub mod period;
pub mod pipeline;
pub mod sequence;
pub mod snapshot;
pub mod split;

// Re-export commonly used types
pub use crate::core::{
    resolve_domain, ClassificationOutcome, ClassificationRecord, DocItemId, Domain,
    PageFingerprint, PeriodSource, PreExtractSnapshot, RenameFields,
};

pub use crate::classify::{DocumentClassifier, MatchCondition};
pub use crate::config::JobConfig;
pub use crate::errors::{EngineError, EngineResult};
pub use crate::job::{JobContext, JobStatus, JurisdictionSet};
pub use crate::naming::{title_of, FilenameBuilder, NamingContext};
pub use crate::overlay::{apply_local_overlay, OverlayOutcome, SetContext};
pub use crate::period::{is_ui_forced_code, resolve_period, PeriodInputs, PeriodResolution};
pub use crate::pipeline::{FileResult, JobReport, PipelineOrchestrator, Services};
pub use crate::sequence::ReceiptSequencer;
pub use crate::snapshot::SnapshotStore;
pub use crate::split::{evaluate_bundle, BundleDecision, DocItem};
