//! Property checks for the naming contract.

use proptest::prelude::*;
use std::collections::BTreeMap;

use taxdoc::naming::{
    ensure_unique_target, strip_forbidden_suffixes, title_of, validate_filename,
};
use taxdoc::{ClassificationRecord, FilenameBuilder, NamingContext, PeriodSource};

fn record(base: &str, yymm: &str) -> ClassificationRecord {
    ClassificationRecord {
        base_code: base.to_string(),
        overlay_code: None,
        yymm: Some(yymm.to_string()),
        yymm_source: PeriodSource::Ui,
        title: title_of(base),
        confidence: 1.0,
        method: "standard_keyword_matching".to_string(),
        matched_keywords: vec![],
        meta: BTreeMap::new(),
    }
}

/// Every code the title table knows composes into a valid filename.
#[test]
fn every_known_code_round_trips_validation() {
    let codes = [
        "0000", "0001", "0002", "0003", "0004", "1001", "1003", "1004", "2001", "2003", "2004",
        "3001", "3002", "3003", "3004", "5001", "5002", "5003", "5004", "5005", "6001", "6002",
        "6003", "7001", "7002", "9999",
    ];
    let ctx = NamingContext {
        prefecture: Some("愛知県".to_string()),
        city: Some("蒲郡市".to_string()),
        source_filename: None,
    };
    let builder = FilenameBuilder::new();
    for code in codes {
        let filename = builder.build(&record(code, "2507"), &ctx).unwrap();
        validate_filename(&filename)
            .unwrap_or_else(|e| panic!("{code} produced invalid name: {e}"));
    }
}

proptest! {
    // Suffix scrubbing is idempotent for arbitrary cores.
    #[test]
    fn strip_is_idempotent(core in "[0-9]{4}_[ぁ-ゖ一-龠a-z]{1,12}(_市町村|_都道府県)?(_[0-9]{4})?") {
        let once = strip_forbidden_suffixes(&core);
        let twice = strip_forbidden_suffixes(&once);
        prop_assert_eq!(once, twice);
    }

    // Valid YYMM values always validate inside a well-formed name.
    #[test]
    fn well_formed_names_validate(year in 1u32..=99, month in 1u32..=12) {
        let name = format!("0001_法人税及び地方法人税申告書_{year:02}{month:02}.pdf");
        prop_assert!(validate_filename(&name).is_ok());
    }

    // Out-of-range months never validate.
    #[test]
    fn bad_months_never_validate(year in 0u32..=99, month in 13u32..=99) {
        let name = format!("0001_書類_{year:02}{month:02}.pdf");
        prop_assert!(validate_filename(&name).is_err());
    }
}

/// Collision suffixes keep counting until a free slot appears.
#[test]
fn unique_target_walks_the_counter() {
    use std::path::{Path, PathBuf};
    use taxdoc::errors::EngineResult;
    use taxdoc::io::traits::FileSystemService;

    struct Existing(usize);
    impl FileSystemService for Existing {
        fn read_bytes(&self, _: &Path) -> EngineResult<Vec<u8>> {
            unreachable!()
        }
        fn write_bytes_atomic(&self, _: &Path, _: &[u8]) -> EngineResult<()> {
            unreachable!()
        }
        fn exists(&self, path: &Path) -> bool {
            let name = path.file_name().unwrap().to_string_lossy();
            if name == "0003_受信通知_2507.pdf" {
                return true;
            }
            (1..=self.0).any(|n| name == format!("0003_受信通知_2507_{n:03}.pdf"))
        }
        fn list_snapshots(&self, _: &Path) -> EngineResult<Vec<PathBuf>> {
            unreachable!()
        }
        fn remove_file(&self, _: &Path) -> EngineResult<()> {
            unreachable!()
        }
    }

    let target = ensure_unique_target(Path::new("/out"), "0003_受信通知_2507.pdf", &Existing(7));
    assert_eq!(
        target.file_name().unwrap().to_string_lossy(),
        "0003_受信通知_2507_008.pdf"
    );
}
