//! Bundle detection and doc-item enumeration.
//!
//! A bundle is a PDF carrying several independent sub-documents (receipt
//! notices, payment-info notices, declarations for different
//! jurisdictions). Detection is conservative: ledger-style documents are
//! never split, neither is anything classified into a no-split code, and
//! otherwise at least two distinct indicator categories must appear.
//!
//! Item identity is the `(source_doc_md5, page_index, fingerprint)` tuple
//! either way, so a page is named identically whether its PDF was split
//! or processed whole.

use tracing::{debug, info};

use crate::classify::engine::DocumentClassifier;
use crate::classify::normalize::normalize_snapshot_text;
use crate::core::hashing::text_sha1;
use crate::core::types::{DocItemId, PageFingerprint, PreExtractSnapshot};

/// Page titles that mark the whole PDF as non-splittable.
pub const NO_SPLIT_TITLES: &[&str] = &[
    "固定資産台帳",
    "一括償却資産明細表",
    "少額減価償却資産明細表",
    "総勘定元帳",
    "補助元帳",
    "決算書",
    "貸借対照表",
    "損益計算書",
    "残高試算表",
    "仕訳帳",
];

/// Classified codes that inhibit splitting.
pub const NO_SPLIT_CODES: &[&str] = &["6001", "6002", "6003", "5001", "5002", "5004"];

/// Split-indicating keyword categories. A bundle needs at least two
/// distinct categories across its pages.
pub const SPLIT_CATEGORIES: &[(&str, &[&str])] = &[
    (
        "receipt_notice",
        &["申告受付完了通知", "メール詳細", "受信通知"],
    ),
    (
        "payment_info",
        &["納付情報発行結果", "納付区分番号通知", "納付情報"],
    ),
    ("declaration", &["申告書"]),
];

/// Outcome of bundle evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct BundleDecision {
    pub is_bundle: bool,
    /// Distinct indicator categories found (declaration order).
    pub categories: Vec<&'static str>,
    pub reason: String,
}

/// One logical sub-document handed to the per-page pipeline stages.
#[derive(Debug, Clone, PartialEq)]
pub struct DocItem {
    pub id: DocItemId,
    /// Raw text driving classification for this item.
    pub text: String,
    /// False for the single pseudo item of a non-bundle source.
    pub from_split: bool,
}

/// Decide whether a source PDF is a bundle.
pub fn evaluate_bundle(
    page_texts: &[String],
    filename: &str,
    classifier: &DocumentClassifier,
) -> BundleDecision {
    for text in page_texts {
        if let Some(title) = NO_SPLIT_TITLES.iter().find(|t| text.contains(**t)) {
            debug!(filename, title, "global no-split title present");
            return BundleDecision {
                is_bundle: false,
                categories: Vec::new(),
                reason: format!("no_split_title:{title}"),
            };
        }
    }

    for text in page_texts {
        let classified = classifier.classify(text, filename);
        if NO_SPLIT_CODES.contains(&classified.code.as_str()) {
            debug!(filename, code = %classified.code, "no-split code present");
            return BundleDecision {
                is_bundle: false,
                categories: Vec::new(),
                reason: format!("no_split_code:{}", classified.code),
            };
        }
    }

    let mut categories = Vec::new();
    for (category, keywords) in SPLIT_CATEGORIES {
        let hit = page_texts
            .iter()
            .any(|text| keywords.iter().any(|k| text.contains(k)));
        if hit {
            categories.push(*category);
        }
    }

    let is_bundle = categories.len() >= 2;
    if is_bundle {
        info!(filename, ?categories, "bundle detected");
    }
    let reason = format!("categories:{}", categories.len());
    BundleDecision {
        is_bundle,
        categories,
        reason,
    }
}

/// Enumerate doc items for a source according to the bundle decision.
///
/// Bundles yield one item per scanned page with the snapshot fingerprint;
/// non-bundles yield a single pseudo item for page 0 whose fingerprint is
/// the file MD5 plus a SHA-1 over the combined normalized text, so both
/// paths share the naming code downstream.
pub fn enumerate_items(
    snapshot: &PreExtractSnapshot,
    decision: &BundleDecision,
    page_texts: &[String],
) -> Vec<DocItem> {
    if decision.is_bundle {
        page_texts
            .iter()
            .enumerate()
            .map(|(page_index, text)| DocItem {
                id: DocItemId {
                    source_doc_md5: snapshot.source_doc_md5.clone(),
                    page_index,
                    fp: snapshot
                        .fingerprints
                        .get(page_index)
                        .cloned()
                        .unwrap_or_else(|| PageFingerprint {
                            page_md5: snapshot.source_doc_md5.clone(),
                            text_sha1: text_sha1(&normalize_snapshot_text(text)),
                        }),
                },
                text: text.clone(),
                from_split: true,
            })
            .collect()
    } else {
        let combined = page_texts.join("\n");
        vec![DocItem {
            id: DocItemId {
                source_doc_md5: snapshot.source_doc_md5.clone(),
                page_index: 0,
                fp: PageFingerprint {
                    page_md5: snapshot.source_doc_md5.clone(),
                    text_sha1: text_sha1(&normalize_snapshot_text(&combined)),
                },
            },
            text: combined,
            from_split: false,
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{RenameFields, SnapshotMeta, SNAPSHOT_VERSION};
    use pretty_assertions::assert_eq;

    fn classifier() -> DocumentClassifier {
        DocumentClassifier::new()
    }

    fn strings(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| (*t).to_string()).collect()
    }

    fn snapshot_for(texts: &[&str]) -> PreExtractSnapshot {
        PreExtractSnapshot {
            source_path: "bundle.pdf".into(),
            source_doc_md5: "cafe".into(),
            pages: texts.iter().map(|_| RenameFields::default()).collect(),
            fingerprints: texts
                .iter()
                .enumerate()
                .map(|(i, t)| PageFingerprint {
                    page_md5: format!("page{i}"),
                    text_sha1: text_sha1(&normalize_snapshot_text(t)),
                })
                .collect(),
            created_at: "2025-08-01T00:00:00+09:00".into(),
            version: SNAPSHOT_VERSION.into(),
            meta: SnapshotMeta::default(),
        }
    }

    #[test]
    fn ledger_title_blocks_splitting_entirely() {
        let texts = strings(&[
            "総勘定元帳 令和7年度",
            "申告受付完了通知 納付情報発行結果",
        ]);
        let decision = evaluate_bundle(&texts, "ledger.pdf", &classifier());
        assert!(!decision.is_bundle);
        assert!(decision.reason.starts_with("no_split_title:"));
    }

    #[test]
    fn asset_code_blocks_splitting() {
        let texts = strings(&["少額減価償却資産明細表 固定資産"]);
        let decision = evaluate_bundle(&texts, "assets.pdf", &classifier());
        assert!(!decision.is_bundle);
    }

    #[test]
    fn two_categories_make_a_bundle() {
        let texts = strings(&[
            "申告受付完了通知 法人市民税 蒲郡市役所",
            "納付情報発行結果 法人二税・特別税",
        ]);
        let decision = evaluate_bundle(&texts, "bundle.pdf", &classifier());
        assert!(decision.is_bundle);
        assert_eq!(decision.categories, vec!["receipt_notice", "payment_info"]);
    }

    #[test]
    fn single_category_is_not_a_bundle() {
        let texts = strings(&["申告受付完了通知 法人市民税", "受信通知 その2"]);
        let decision = evaluate_bundle(&texts, "single.pdf", &classifier());
        assert!(!decision.is_bundle);
        assert_eq!(decision.categories, vec!["receipt_notice"]);
    }

    #[test]
    fn bundle_items_carry_page_identity() {
        let texts = strings(&["一枚目 申告受付完了通知 事業税 都道府県民税", "二枚目 納付情報発行結果"]);
        let snapshot = snapshot_for(&["一枚目 申告受付完了通知 事業税 都道府県民税", "二枚目 納付情報発行結果"]);
        let decision = evaluate_bundle(&texts, "b.pdf", &classifier());
        assert!(decision.is_bundle);

        let items = enumerate_items(&snapshot, &decision, &texts);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id.page_index, 0);
        assert_eq!(items[1].id.page_index, 1);
        assert_eq!(items[0].id.fp.page_md5, "page0");
        assert!(items.iter().all(|i| i.from_split));
        assert!(items.iter().all(|i| i.id.source_doc_md5 == "cafe"));
    }

    #[test]
    fn non_bundle_synthesizes_single_pseudo_item() {
        let texts = strings(&["法人税及び地方法人税申告書", "別表"]);
        let snapshot = snapshot_for(&["法人税及び地方法人税申告書", "別表"]);
        let decision = BundleDecision {
            is_bundle: false,
            categories: vec![],
            reason: "categories:1".into(),
        };
        let items = enumerate_items(&snapshot, &decision, &texts);
        assert_eq!(items.len(), 1);
        let item = &items[0];
        assert_eq!(item.id.page_index, 0);
        assert!(item.page_md5_is_file_md5());
        assert!(!item.from_split);
        assert!(item.text.contains("別表"));
    }
}

#[cfg(test)]
impl DocItem {
    fn page_md5_is_file_md5(&self) -> bool {
        self.id.fp.page_md5 == self.id.source_doc_md5
    }
}
