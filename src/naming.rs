//! Filename composition, validation, and collision handling.
//!
//! The final name has the shape `CODE_<core>_YYMM.pdf`. The code is the
//! overlay code when present, with a last-chance prefecture upgrade for a
//! bare `1001` when the context knows the prefecture. Municipal and
//! prefectural declarations embed jurisdiction names; everything else uses
//! the fixed code→title table. Composition is deterministic: identical
//! inputs yield byte-identical names.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::core::domain::{is_municipal_tax, is_prefecture_tax};
use crate::core::types::ClassificationRecord;
use crate::errors::{EngineError, EngineResult, InputField};
use crate::io::traits::FileSystemService;
use crate::overlay::prefecture_code;
use crate::period::is_valid_yymm;

/// Fallback labels when a jurisdiction cannot be named.
const UNKNOWN_MUNICIPALITY: &str = "市町村不詳";
const UNKNOWN_PREFECTURE: &str = "都道府県不詳";

/// Municipal code → full jurisdiction label.
const MUNICIPALITY_LABELS: &[(&str, &str)] = &[
    ("2001", "愛知県蒲郡市"),
    ("2011", "福岡県福岡市"),
    ("2021", "大阪市"),
    ("2031", "横浜市"),
    ("2041", "名古屋市"),
];

/// Document code → title.
const TITLES: &[(&str, &str)] = &[
    // 国税系
    ("0000", "納付税額一覧表"),
    ("0001", "法人税及び地方法人税申告書"),
    ("0002", "添付資料_法人税"),
    ("0003", "受信通知"),
    ("0004", "納付情報"),
    // 地方税系（都道府県）
    ("1001", "法人都道府県民税・事業税・特別法人事業税申告書"),
    ("1011", "法人都道府県民税・事業税・特別法人事業税申告書"),
    ("1021", "法人都道府県民税・事業税・特別法人事業税申告書"),
    ("1031", "法人都道府県民税・事業税・特別法人事業税申告書"),
    ("1041", "法人都道府県民税・事業税・特別法人事業税申告書"),
    ("1003", "受信通知"),
    ("1013", "受信通知"),
    ("1023", "受信通知"),
    ("1033", "受信通知"),
    ("1043", "受信通知"),
    ("1004", "納付情報"),
    // 地方税系（市町村）
    ("2001", "法人市民税申告書"),
    ("2011", "法人市民税申告書"),
    ("2021", "法人市民税申告書"),
    ("2031", "法人市民税申告書"),
    ("2041", "法人市民税申告書"),
    ("2003", "受信通知"),
    ("2013", "受信通知"),
    ("2023", "受信通知"),
    ("2033", "受信通知"),
    ("2043", "受信通知"),
    ("2004", "納付情報"),
    // 消費税系
    ("3001", "消費税及び地方消費税申告書"),
    ("3002", "添付資料_消費税"),
    ("3003", "受信通知"),
    ("3004", "納付情報"),
    // 帳票系
    ("5001", "決算書"),
    ("5002", "総勘定元帳"),
    ("5003", "補助簿等"),
    ("5004", "残高試算表"),
    ("5005", "仕訳帳"),
    // 資産系
    ("6001", "固定資産台帳"),
    ("6002", "一括償却資産明細表"),
    ("6003", "少額減価償却資産明細表"),
    // その他
    ("7001", "勘定科目別税区分集計表"),
    ("7002", "法人事業概況説明書"),
    // 未分類
    ("9999", "その他書類"),
];

/// Title for a document code.
pub fn title_of(code: &str) -> String {
    TITLES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, title)| (*title).to_string())
        .unwrap_or_else(|| format!("不明書類_{code}"))
}

/// Municipality label for a municipal code.
pub fn municipality_label(code: &str) -> String {
    MUNICIPALITY_LABELS
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, label)| (*label).to_string())
        .unwrap_or_else(|| UNKNOWN_MUNICIPALITY.to_string())
}

/// Jurisdiction names available when composing one filename.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamingContext {
    pub prefecture: Option<String>,
    pub city: Option<String>,
    pub source_filename: Option<String>,
}

static FORBIDDEN_SUFFIX_WITH_YYMM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"_(?:市町村|都道府県)_(\d{4})$").expect("suffix pattern"));
static FORBIDDEN_SUFFIX_BARE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"_(?:市町村|都道府県)$").expect("suffix pattern"));
static FILENAME_SHAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\d{4}_[^<>:"|?*\\/]+_\d{4}\.pdf$"#).expect("filename shape pattern")
});
static FORBIDDEN_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[<>:"|?*\\/]"#).expect("forbidden chars pattern"));

/// Strip forbidden trailing fragments, preserving a trailing YYMM.
/// Idempotent: a second application changes nothing.
pub fn strip_forbidden_suffixes(core: &str) -> String {
    let mut current = core.to_string();
    loop {
        let next = if let Some(caps) = FORBIDDEN_SUFFIX_WITH_YYMM.captures(&current) {
            let yymm = caps[1].to_string();
            format!(
                "{}_{yymm}",
                &current[..caps.get(0).map_or(0, |m| m.start())]
            )
        } else if let Some(found) = FORBIDDEN_SUFFIX_BARE.find(&current) {
            current[..found.start()].to_string()
        } else {
            break;
        };
        if next == current {
            break;
        }
        current = next;
    }
    current
}

/// Validate a composed filename against the bit-exact contract.
pub fn validate_filename(filename: &str) -> EngineResult<()> {
    let fail = |reason: &str| {
        Err(EngineError::InvalidName {
            filename: filename.to_string(),
            reason: reason.to_string(),
        })
    };

    if filename.is_empty() {
        return fail("empty filename");
    }
    if FORBIDDEN_CHARS.is_match(filename) {
        return fail("contains forbidden characters");
    }
    if !FILENAME_SHAPE.is_match(filename) {
        return fail("does not match CODE_core_YYMM.pdf");
    }
    // Shape guarantees four trailing digits before the extension.
    let yymm = &filename[filename.len() - 8..filename.len() - 4];
    if !is_valid_yymm(yymm) {
        return fail("trailing YYMM out of range");
    }
    Ok(())
}

/// Filename builder.
#[derive(Debug, Default)]
pub struct FilenameBuilder;

impl FilenameBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Compose the final filename for a classification record.
    pub fn build(
        &self,
        record: &ClassificationRecord,
        ctx: &NamingContext,
    ) -> EngineResult<String> {
        let Some(yymm) = record.yymm.as_deref() else {
            return Err(EngineError::NeedsUserInput {
                code: record.display_code().to_string(),
                field: InputField::Yymm,
            });
        };

        let final_code = self.determine_final_code(record, ctx);
        let core = self.build_core(&final_code, ctx);
        let core = strip_forbidden_suffixes(&core);
        let filename = format!("{core}_{yymm}.pdf");

        validate_filename(&filename)?;
        info!(
            display_code = record.display_code(),
            final_code = %final_code,
            filename = %filename,
            "filename composed"
        );
        Ok(filename)
    }

    /// Overlay wins over display; a bare 1001 with a known prefecture gets
    /// one last upgrade through the prefecture map.
    fn determine_final_code(&self, record: &ClassificationRecord, ctx: &NamingContext) -> String {
        let mut final_code = record.final_code().to_string();
        if final_code == "1001" {
            if let Some(prefecture) = ctx.prefecture.as_deref() {
                if let Some(upgraded) = prefecture_code(prefecture) {
                    if upgraded != final_code {
                        info!("final insurance upgrade: {final_code} -> {upgraded} ({prefecture})");
                        final_code = upgraded.to_string();
                    }
                }
            }
        }
        final_code
    }

    fn build_core(&self, final_code: &str, ctx: &NamingContext) -> String {
        if is_municipal_tax(final_code) {
            return self.build_municipal_core(final_code, ctx);
        }
        if is_prefecture_tax(final_code) {
            let prefecture = ctx.prefecture.as_deref().unwrap_or(UNKNOWN_PREFECTURE);
            return format!("{final_code}_{prefecture}_都道府県申告書");
        }
        format!("{final_code}_{}", title_of(final_code))
    }

    fn build_municipal_core(&self, final_code: &str, ctx: &NamingContext) -> String {
        let label = match (ctx.prefecture.as_deref(), ctx.city.as_deref()) {
            (Some(prefecture), Some(city)) => format!("{prefecture}{city}"),
            _ => {
                let fallback = municipality_label(final_code);
                debug!(final_code, fallback = %fallback, "municipal label from code table");
                fallback
            }
        };
        format!("{final_code}_{label}_市町村申告書")
    }
}

/// Resolve a collision-free target path: append `_NNN` before the
/// extension until the name is unused.
pub fn ensure_unique_target(
    dir: &Path,
    filename: &str,
    fs: &dyn FileSystemService,
) -> PathBuf {
    let candidate = dir.join(filename);
    if !fs.exists(&candidate) {
        return candidate;
    }
    let stem = filename.strip_suffix(".pdf").unwrap_or(filename);
    let mut n = 1usize;
    loop {
        let candidate = dir.join(format!("{stem}_{n:03}.pdf"));
        if !fs.exists(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::PeriodSource;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn record(base: &str, overlay: Option<&str>, yymm: Option<&str>) -> ClassificationRecord {
        ClassificationRecord {
            base_code: base.to_string(),
            overlay_code: overlay.map(String::from),
            yymm: yymm.map(String::from),
            yymm_source: PeriodSource::Ui,
            title: title_of(base),
            confidence: 1.0,
            method: "highest_priority_and_condition".to_string(),
            matched_keywords: vec![],
            meta: BTreeMap::new(),
        }
    }

    #[test]
    fn national_tax_uses_title_table() {
        let name = FilenameBuilder::new()
            .build(&record("0001", None, Some("2507")), &NamingContext::default())
            .unwrap();
        assert_eq!(name, "0001_法人税及び地方法人税申告書_2507.pdf");
    }

    #[test]
    fn prefectural_name_embeds_prefecture() {
        let ctx = NamingContext {
            prefecture: Some("愛知県".into()),
            ..Default::default()
        };
        let name = FilenameBuilder::new()
            .build(&record("1001", Some("1011"), Some("2507")), &ctx)
            .unwrap();
        assert_eq!(name, "1011_愛知県_都道府県申告書_2507.pdf");
    }

    #[test]
    fn bare_1001_gets_insurance_upgrade() {
        let ctx = NamingContext {
            prefecture: Some("愛知県".into()),
            ..Default::default()
        };
        let name = FilenameBuilder::new()
            .build(&record("1001", None, Some("2507")), &ctx)
            .unwrap();
        assert!(name.starts_with("1011_"));
    }

    #[test]
    fn unknown_prefecture_keeps_1001() {
        let name = FilenameBuilder::new()
            .build(
                &record("1001", None, Some("2507")),
                &NamingContext::default(),
            )
            .unwrap();
        assert_eq!(name, "1001_都道府県不詳_都道府県申告書_2507.pdf");
    }

    #[test]
    fn municipal_name_from_context() {
        let ctx = NamingContext {
            prefecture: Some("愛知県".into()),
            city: Some("蒲郡市".into()),
            source_filename: None,
        };
        let name = FilenameBuilder::new()
            .build(&record("2001", None, Some("2507")), &ctx)
            .unwrap();
        assert_eq!(name, "2001_愛知県蒲郡市_市町村申告書_2507.pdf");
    }

    #[test]
    fn municipal_fallback_label_from_table() {
        let name = FilenameBuilder::new()
            .build(
                &record("2011", None, Some("2507")),
                &NamingContext::default(),
            )
            .unwrap();
        assert_eq!(name, "2011_福岡県福岡市_市町村申告書_2507.pdf");
    }

    #[test]
    fn asset_schedule_name() {
        let name = FilenameBuilder::new()
            .build(&record("6003", None, Some("2401")), &NamingContext::default())
            .unwrap();
        assert_eq!(name, "6003_少額減価償却資産明細表_2401.pdf");
    }

    #[test]
    fn missing_yymm_requires_user_input() {
        let err = FilenameBuilder::new()
            .build(&record("6003", None, None), &NamingContext::default())
            .unwrap_err();
        assert!(matches!(err, EngineError::NeedsUserInput { .. }));
    }

    #[test]
    fn suffix_scrub_preserves_yymm() {
        assert_eq!(strip_forbidden_suffixes("2001_蒲郡市_市町村_2507"), "2001_蒲郡市_2507");
        assert_eq!(strip_forbidden_suffixes("1011_愛知県_都道府県"), "1011_愛知県");
        assert_eq!(strip_forbidden_suffixes("0001_申告書"), "0001_申告書");
    }

    #[test]
    fn suffix_scrub_is_idempotent() {
        for core in [
            "2001_蒲郡市_市町村_2507",
            "1011_愛知県_都道府県",
            "2001_蒲郡市_市町村_都道府県",
            "0001_法人税及び地方法人税申告書",
        ] {
            let once = strip_forbidden_suffixes(core);
            let twice = strip_forbidden_suffixes(&once);
            assert_eq!(once, twice, "not idempotent for {core}");
        }
    }

    #[test]
    fn validation_accepts_canonical_names() {
        for name in [
            "0001_法人税及び地方法人税申告書_2507.pdf",
            "1011_愛知県_都道府県申告書_2507.pdf",
            "2001_愛知県蒲郡市_市町村申告書_2507.pdf",
            "6003_少額減価償却資産明細表_2401.pdf",
        ] {
            assert!(validate_filename(name).is_ok(), "{name} should validate");
        }
    }

    #[test]
    fn validation_rejects_malformed_names() {
        for name in [
            "",
            "001_短すぎ_2507.pdf",
            "0001_タイトルのみ.pdf",
            "0001_不正な月_2513.pdf",
            "0001_禁止<文字>_2507.pdf",
            "0001_拡張子違い_2507.txt",
        ] {
            assert!(validate_filename(name).is_err(), "{name} should fail");
        }
    }

    #[test]
    fn unique_target_appends_counter() {
        struct FakeFs(Vec<PathBuf>);
        impl FileSystemService for FakeFs {
            fn read_bytes(&self, _: &Path) -> crate::errors::EngineResult<Vec<u8>> {
                unreachable!()
            }
            fn write_bytes_atomic(&self, _: &Path, _: &[u8]) -> crate::errors::EngineResult<()> {
                unreachable!()
            }
            fn exists(&self, path: &Path) -> bool {
                self.0.iter().any(|p| p == path)
            }
            fn list_snapshots(&self, _: &Path) -> crate::errors::EngineResult<Vec<PathBuf>> {
                unreachable!()
            }
            fn remove_file(&self, _: &Path) -> crate::errors::EngineResult<()> {
                unreachable!()
            }
        }

        let dir = Path::new("/out");
        let fs = FakeFs(vec![
            dir.join("0003_受信通知_2507.pdf"),
            dir.join("0003_受信通知_2507_001.pdf"),
        ]);
        let target = ensure_unique_target(dir, "0003_受信通知_2507.pdf", &fs);
        assert_eq!(target, dir.join("0003_受信通知_2507_002.pdf"));

        let free = ensure_unique_target(dir, "0004_納付情報_2507.pdf", &fs);
        assert_eq!(free, dir.join("0004_納付情報_2507.pdf"));
    }
}
