//! Pure text normalization shared by the classifier and snapshot builder.
//!
//! Two variants exist on purpose. Keyword matching keeps the interpunct
//! (`・`) because several rule keywords contain it; snapshot text drops it
//! so page fingerprints stay stable across OCR glyph noise.

/// Fold a fullwidth ASCII digit or letter to its halfwidth form.
fn fold_char(c: char) -> char {
    match c {
        '０'..='９' => char::from_u32(c as u32 - '０' as u32 + '0' as u32).unwrap_or(c),
        'ａ'..='ｚ' => char::from_u32(c as u32 - 'ａ' as u32 + 'a' as u32).unwrap_or(c),
        'Ａ'..='Ｚ' => char::from_u32(c as u32 - 'Ａ' as u32 + 'A' as u32).unwrap_or(c),
        _ => c,
    }
}

/// Normalization used for keyword matching: fullwidth→halfwidth folding
/// and whitespace collapse. Matching is case-sensitive substring search
/// over this form.
pub fn normalize_for_match(text: &str) -> String {
    let folded: String = text.chars().map(fold_char).collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalization used for snapshot text and fingerprints: the matching
/// normalization plus removal of noise glyphs.
pub fn normalize_snapshot_text(text: &str) -> String {
    let folded: String = text
        .chars()
        .map(fold_char)
        .filter(|c| !matches!(c, '・' | '\r' | '\t'))
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Terms that mark a short page as still meaningful.
const MEANINGFUL_TERMS: &[&str] = &[
    "申告",
    "受信通知",
    "納付",
    "税",
    "明細",
    "元帳",
    "決算",
    "資産",
    "試算表",
    "仕訳",
];

/// Filename markers left behind by split and temp artifacts.
const SPLIT_MARKERS: &[&str] = &["__split_", "_ページ", "_page_", "temp_"];

/// Blank-page guard: short, meaningless text on a split/temp artifact.
///
/// Such pages are excluded before classification rather than being
/// reported as unclassified.
pub fn is_blank_page(normalized_text: &str, filename: &str) -> bool {
    if normalized_text.chars().count() >= 30 {
        return false;
    }
    if MEANINGFUL_TERMS.iter().any(|t| normalized_text.contains(t)) {
        return false;
    }
    SPLIT_MARKERS.iter().any(|m| filename.contains(m))
}
