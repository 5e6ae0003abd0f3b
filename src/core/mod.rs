pub mod domain;
pub mod hashing;
pub mod types;

pub use domain::{
    domain_description, is_municipal_tax, is_prefecture_tax, resolve_domain,
    should_suppress_overlay, Domain,
};
pub use types::{
    ClassificationOutcome, ClassificationRecord, DocItemId, PageFingerprint, PeriodSource,
    PreExtractSnapshot, RenameFields, SnapshotMeta, UNCLASSIFIED_CODE,
};
