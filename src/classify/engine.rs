//! Two-pass document classifier.
//!
//! Pass 1 walks rules in descending priority and accepts the first rule
//! with a matching AND condition at full confidence. Pass 2 scores the
//! surviving rules by weighted keyword hits over text and filename.
//! Identical inputs always produce identical output, including the order
//! of `matched_keywords`.

use tracing::debug;

use super::normalize::normalize_for_match;
use super::rules::{builtin_rules, ClassificationRule};
use crate::core::types::UNCLASSIFIED_CODE;

/// Confidence floor below which a page is reported as unclassified.
const CONFIDENCE_FLOOR: f64 = 0.3;

/// Score divisor mapping raw keyword scores into `[0, 1]`.
const CONFIDENCE_SCALE: f64 = 15.0;

/// Filename hits weigh more than body hits.
const FILENAME_WEIGHT: f64 = 1.5;

/// Pre-overlay classification result.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierOutput {
    /// Winning four-digit base code (or `9999`).
    pub code: String,
    /// Rule label, empty for the fallback.
    pub label: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// `highest_priority_and_condition`, `standard_keyword_matching`
    /// or `default_fallback`.
    pub method: String,
    /// Matched keywords in rule declaration order.
    pub matched_keywords: Vec<String>,
    /// Raw score from the standard pass (0 for the AND pass).
    pub score: f64,
}

/// Rule-driven classifier. Owns its rule set by value.
pub struct DocumentClassifier {
    rules: Vec<ClassificationRule>,
}

impl Default for DocumentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentClassifier {
    /// Classifier over the built-in rule table.
    pub fn new() -> Self {
        Self {
            rules: builtin_rules().to_vec(),
        }
    }

    /// Classify a page given its raw text and source filename.
    pub fn classify(&self, text: &str, filename: &str) -> ClassifierOutput {
        let text = normalize_for_match(text);
        let filename = normalize_for_match(filename);
        let combined = format!("{text} {filename}");

        if let Some(hit) = self.top_priority_pass(&combined) {
            return hit;
        }
        self.standard_pass(&text, &filename, &combined)
    }

    /// Pass 1: first matching AND condition wins, descending priority,
    /// declaration order on ties.
    fn top_priority_pass(&self, combined: &str) -> Option<ClassifierOutput> {
        let mut ordered: Vec<&ClassificationRule> = self.rules.iter().collect();
        // Stable sort keeps declaration order within equal priorities.
        ordered.sort_by(|a, b| b.priority.cmp(&a.priority));

        for rule in ordered {
            for condition in rule.and_conditions {
                if let Some(matched) = condition.matches(combined) {
                    debug!(code = rule.code, label = rule.label, "AND condition hit");
                    return Some(ClassifierOutput {
                        code: rule.code.to_string(),
                        label: rule.label.to_string(),
                        confidence: 1.0,
                        method: "highest_priority_and_condition".to_string(),
                        matched_keywords: matched,
                        score: 0.0,
                    });
                }
            }
        }
        None
    }

    /// Pass 2: weighted keyword scoring with exclusions.
    fn standard_pass(&self, text: &str, filename: &str, combined: &str) -> ClassifierOutput {
        let mut best: Option<(&ClassificationRule, f64, Vec<String>)> = None;

        for rule in &self.rules {
            // An already-matched AND condition shields the rule from its
            // own exclusions.
            let shielded = rule
                .and_conditions
                .iter()
                .any(|c| c.matches(combined).is_some());
            if !shielded {
                if let Some(hit) = rule.exclude.iter().find(|k| combined.contains(**k)) {
                    debug!(code = rule.code, keyword = *hit, "rule excluded");
                    continue;
                }
            }

            let priority = f64::from(rule.priority);
            let mut score = 0.0;
            let mut matched = Vec::new();

            for keyword in rule.exact {
                if text.contains(keyword) {
                    score += priority * 2.0;
                    matched.push((*keyword).to_string());
                }
            }
            for keyword in rule.partial {
                if text.contains(keyword) {
                    score += priority;
                    matched.push((*keyword).to_string());
                }
            }

            let mut filename_score = 0.0;
            for keyword in rule.filename_only {
                if filename.contains(keyword) {
                    filename_score += priority * 3.0;
                    matched.push(format!("[ファイル名]{keyword}"));
                }
            }
            for keyword in rule.exact {
                if filename.contains(keyword) {
                    filename_score += priority * 2.0;
                    matched.push(format!("[ファイル名]{keyword}"));
                }
            }
            score += filename_score * FILENAME_WEIGHT;

            if score > best.as_ref().map_or(0.0, |(_, s, _)| *s) {
                best = Some((rule, score, matched));
            }
        }

        match best {
            Some((rule, score, matched)) if score / CONFIDENCE_SCALE >= CONFIDENCE_FLOOR => {
                ClassifierOutput {
                    code: rule.code.to_string(),
                    label: rule.label.to_string(),
                    confidence: (score / CONFIDENCE_SCALE).min(1.0),
                    method: "standard_keyword_matching".to_string(),
                    matched_keywords: matched,
                    score,
                }
            }
            _ => ClassifierOutput {
                code: UNCLASSIFIED_CODE.to_string(),
                label: String::new(),
                confidence: 0.0,
                method: "default_fallback".to_string(),
                matched_keywords: Vec::new(),
                score: 0.0,
            },
        }
    }
}
