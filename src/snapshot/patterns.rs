//! Compiled extraction pattern tables for snapshot building.
//!
//! All patterns are compiled once at first use and applied to the
//! snapshot-normalized text. Matching order inside each table is part of
//! the contract: the first hit wins.

use once_cell::sync::Lazy;
use regex::Regex;

/// Strong code hints: a known four-digit code printed on the page.
pub static STRONG_CODE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(0003|0004|3003|3004|1003|1013|1023|1004|2003|2013|2023|2004|6002|6003)\b")
        .expect("strong code pattern")
});

/// Title-derived code hints, tried after the strong pattern.
pub static TITLE_CODE_RULES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"納付税額一覧表", "0000"),
        (r"法人税.*申告書", "0001"),
        (r"添付資料.*法人税", "0002"),
        (r"消費税.*申告書", "3001"),
        (r"添付資料.*消費税", "3002"),
    ]
    .into_iter()
    .map(|(pattern, code)| (Regex::new(pattern).expect("title code pattern"), code))
    .collect()
});

/// Jurisdiction name patterns, most specific first.
pub static MUNICIPALITY_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // 愛知県蒲郡市 (prefecture + city combined)
        r"([一-龠]{1,3}[都道府県][一-龠]{1,4}[市区町村])",
        // Government-ordinance cities that appear without a prefecture
        r"(札幌市|仙台市|千葉市|横浜市|川崎市|相模原市|新潟市|静岡市|浜松市|名古屋市|京都市|大阪市|堺市|神戸市|岡山市|広島市|北九州市|福岡市|熊本市)",
        // Prefecture alone
        r"([一-龠]{1,3}[都道府県])",
    ]
    .into_iter()
    .map(|pattern| Regex::new(pattern).expect("municipality pattern"))
    .collect()
});

/// Date presence probe used for the `has_date` extra attribute.
pub static DATE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{4}[/-]\d{1,2}[/-]\d{1,2}").expect("date pattern"));

/// Tax-kind keyword groups, first matching kind wins.
pub const TAX_KIND_RULES: &[(&str, &[&str])] = &[
    ("国税", &["法人税", "消費税", "所得税", "国税電子申告", "税務署"]),
    (
        "地方税",
        &[
            "都道府県民税",
            "市町村民税",
            "事業税",
            "地方税電子申告",
            "県税事務所",
            "市役所",
        ],
    ),
    ("消費税", &["消費税及び地方消費税"]),
];

/// Document-type hint groups; every matching group contributes one hint.
pub const DOC_HINT_RULES: &[(&str, &[&str])] = &[
    ("受信通知", &["受信通知", "申告受付完了", "受信結果"]),
    ("納付情報", &["納付情報", "納付書", "納付区分番号"]),
    ("申告書", &["申告書", "確認表"]),
    ("添付資料", &["添付資料", "明細表"]),
    ("帳票", &["一括償却資産", "少額減価償却", "明細表"]),
];

/// Detect a code hint in normalized text.
pub fn detect_code_hint(text: &str) -> Option<String> {
    if let Some(caps) = STRONG_CODE_PATTERN.captures(text) {
        return Some(caps[1].to_string());
    }
    TITLE_CODE_RULES
        .iter()
        .find(|(pattern, _)| pattern.is_match(text))
        .map(|(_, code)| (*code).to_string())
}

/// Detect the jurisdiction name printed on a page.
pub fn detect_municipality(text: &str) -> Option<String> {
    MUNICIPALITY_PATTERNS
        .iter()
        .find_map(|pattern| pattern.captures(text).map(|caps| caps[1].to_string()))
}

/// Detect the tax kind.
pub fn detect_tax_kind(text: &str) -> Option<String> {
    TAX_KIND_RULES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| text.contains(k)))
        .map(|(kind, _)| (*kind).to_string())
}

/// Detect document-type hints, table order.
pub fn detect_doc_hints(text: &str) -> Vec<String> {
    DOC_HINT_RULES
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|k| text.contains(k)))
        .map(|(hint, _)| (*hint).to_string())
        .collect()
}
