pub mod engine;
pub mod normalize;
pub mod rules;

pub use engine::{ClassifierOutput, DocumentClassifier};
pub use normalize::{is_blank_page, normalize_for_match, normalize_snapshot_text};
pub use rules::{builtin_rules, ClassificationRule, MatchCondition};
