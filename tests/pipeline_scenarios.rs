//! End-to-end pipeline scenarios over sidecar-backed sources.
//!
//! Each test materializes a placeholder PDF plus a `.pages.json` sidecar
//! in a temp directory, runs the orchestrator, and checks the produced
//! filenames byte-for-byte.

use indoc::indoc;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use taxdoc::io::real::{SidecarTextService, StdFileSystem, SystemTimeService};
use taxdoc::pipeline::{JobReport, PipelineOrchestrator, Services};
use taxdoc::{
    ClassificationOutcome, EngineError, JobConfig, JobContext, JurisdictionSet, PeriodSource,
};

struct Harness {
    _dir: TempDir,
    root: PathBuf,
    out_dir: PathBuf,
    snapshot_dir: PathBuf,
}

impl Harness {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_path_buf();
        Self {
            out_dir: root.join("renamed"),
            snapshot_dir: root.join("snapshots"),
            root,
            _dir: dir,
        }
    }

    fn add_source(&self, stem: &str, pages: &[&str]) -> PathBuf {
        let pdf = self.root.join(format!("{stem}.pdf"));
        fs::write(&pdf, format!("%PDF-{stem}")).unwrap();
        fs::write(
            self.root.join(format!("{stem}.pages.json")),
            serde_json::to_string(&pages.to_vec()).unwrap(),
        )
        .unwrap();
        pdf
    }

    fn orchestrator(
        &self,
        yymm: Option<&str>,
        sets: Vec<JurisdictionSet>,
    ) -> PipelineOrchestrator {
        self.orchestrator_in(yymm, sets, &self.out_dir)
    }

    fn orchestrator_in(
        &self,
        yymm: Option<&str>,
        sets: Vec<JurisdictionSet>,
        out_dir: &Path,
    ) -> PipelineOrchestrator {
        let config = JobConfig {
            snapshot_dir: self.snapshot_dir.clone(),
            output_dir: out_dir.to_path_buf(),
            jobs: 1,
            batch_mode: true,
            ..JobConfig::default()
        };
        let time = Arc::new(SystemTimeService);
        let job = JobContext::new(
            "job_test",
            yymm,
            sets,
            true,
            false,
            false,
            time.clone(),
        )
        .unwrap();
        let services = Services {
            text: Arc::new(SidecarTextService),
            fs: Arc::new(StdFileSystem),
            time,
        };
        PipelineOrchestrator::new(config, Arc::new(job), services)
    }
}

fn standard_sets() -> Vec<JurisdictionSet> {
    vec![
        JurisdictionSet::prefecture_only("東京都"),
        JurisdictionSet::with_city("愛知県", "蒲郡市"),
    ]
}

fn s6_sets() -> Vec<JurisdictionSet> {
    vec![
        JurisdictionSet::prefecture_only("東京都"),
        JurisdictionSet::with_city("愛知県", "蒲郡市"),
        JurisdictionSet::with_city("福岡県", "福岡市"),
    ]
}

fn output_names(report: &JobReport) -> Vec<String> {
    report
        .files
        .iter()
        .flat_map(|f| f.outcomes.iter())
        .filter_map(|o| match o {
            ClassificationOutcome::File { output_path, .. } => Some(
                output_path
                    .file_name()
                    .unwrap()
                    .to_string_lossy()
                    .to_string(),
            ),
            _ => None,
        })
        .collect()
}

#[test]
fn s1_corporate_tax_return() {
    let harness = Harness::new();
    let pdf = harness.add_source(
        "s1",
        &[indoc! {"
            法人税及び地方法人税申告書
            差引確定法人税額
        "}],
    );
    let report = harness
        .orchestrator(Some("2507"), vec![])
        .run(&[pdf])
        .unwrap();

    assert_eq!(
        output_names(&report),
        vec!["0001_法人税及び地方法人税申告書_2507.pdf"]
    );
    assert_eq!(report.exit_code(), 0);
}

#[test]
fn s2_prefectural_declaration_upgrades_to_aichi() {
    let harness = Harness::new();
    let pdf = harness.add_source(
        "s2",
        &["法人都道府県民税・事業税・特別法人事業税申告書 愛知県東三河県税事務所"],
    );
    let report = harness
        .orchestrator(Some("2507"), standard_sets())
        .run(&[pdf])
        .unwrap();

    assert_eq!(
        output_names(&report),
        vec!["1011_愛知県_都道府県申告書_2507.pdf"]
    );
}

#[test]
fn s3_municipal_declaration_embeds_city() {
    let harness = Harness::new();
    let pdf = harness.add_source("s3", &["法人市民税申告書 蒲郡市役所"]);
    let report = harness
        .orchestrator(Some("2507"), standard_sets())
        .run(&[pdf])
        .unwrap();

    assert_eq!(
        output_names(&report),
        vec!["2001_愛知県蒲郡市_市町村申告書_2507.pdf"]
    );
}

#[test]
fn s4_asset_schedule_with_ui_period() {
    let harness = Harness::new();
    let pdf = harness.add_source("s4", &["少額減価償却資産明細表 固定資産 減価償却"]);
    let report = harness
        .orchestrator(Some("2401"), vec![])
        .run(&[pdf])
        .unwrap();

    assert_eq!(
        output_names(&report),
        vec!["6003_少額減価償却資産明細表_2401.pdf"]
    );
    // UI-forced precedence is visible in the outcome.
    let outcome = &report.files[0].outcomes[0];
    match outcome {
        ClassificationOutcome::File { yymm_source, .. } => {
            assert_eq!(*yymm_source, PeriodSource::UiForced);
        }
        other => panic!("expected File outcome, got {other:?}"),
    }
}

#[test]
fn s5_asset_schedule_without_ui_defers() {
    let harness = Harness::new();
    let pdf = harness.add_source("s5", &["少額減価償却資産明細表 固定資産 減価償却"]);
    let report = harness.orchestrator(None, vec![]).run(&[pdf]).unwrap();

    let outcomes = &report.files[0].outcomes;
    assert_eq!(outcomes.len(), 1);
    assert_eq!(
        outcomes[0],
        ClassificationOutcome::NeedsUi {
            code: "6003".to_string(),
            field: "YYMM".to_string(),
        }
    );
    assert_eq!(report.exit_code(), 2);
    assert_eq!(report.summary.counters.needs_ui_items, 1);
}

#[test]
fn s6_bundle_splits_into_sequenced_receipts() {
    let harness = Harness::new();
    let pdf = harness.add_source(
        "s6",
        &[
            "申告受付完了通知 発行元 愛知県 手続名 法人都道府県民税・事業税・特別法人事業税 確定申告書 受付日時 2025/08/01",
            "申告受付完了通知 発行元 福岡県 手続名 法人都道府県民税・事業税・特別法人事業税 確定申告書 受付日時 2025/08/01",
            "申告受付完了通知 法人市民税 蒲郡市役所 受付番号 20250801",
            "申告受付完了通知 法人市民税 福岡市 受付番号 20250801",
        ],
    );
    let report = harness
        .orchestrator(Some("2508"), s6_sets())
        .run(&[pdf])
        .unwrap();

    assert_eq!(
        output_names(&report),
        vec![
            "1013_愛知県_都道府県申告書_2508.pdf",
            "1023_福岡県_都道府県申告書_2508.pdf",
            "2003_愛知県蒲郡市_市町村申告書_2508.pdf",
            "2013_福岡県福岡市_市町村申告書_2508.pdf",
        ]
    );
    assert_eq!(report.summary.counters.bundle_splits, 1);
}

#[test]
fn split_independence_for_a_bundle_page() {
    let page = "申告受付完了通知 法人市民税 蒲郡市役所 受付番号 20250801";

    // Page inside a bundle.
    let bundled = Harness::new();
    let bundle_pdf = bundled.add_source(
        "bundle",
        &[
            indoc! {"
                申告受付完了通知
                発行元 愛知県
                手続名 法人都道府県民税・事業税・特別法人事業税 確定申告書
            "},
            page,
        ],
    );
    let bundle_report = bundled
        .orchestrator(Some("2508"), s6_sets())
        .run(&[bundle_pdf])
        .unwrap();

    // Same page as its own document.
    let single = Harness::new();
    let single_pdf = single.add_source("single", &[page]);
    let single_report = single
        .orchestrator(Some("2508"), s6_sets())
        .run(&[single_pdf])
        .unwrap();

    let bundled_name = output_names(&bundle_report)
        .into_iter()
        .find(|n| n.starts_with("2003"))
        .unwrap();
    assert_eq!(output_names(&single_report), vec![bundled_name]);
}

#[test]
fn blank_split_pages_are_skipped_with_a_counter() {
    let harness = Harness::new();
    let pdf = harness.add_source(
        "blank",
        &[
            "申告受付完了通知 法人市民税 蒲郡市役所 受付番号 20250801",
            "納付情報発行結果 法人二税・特別税 愛知県",
            "ごみ",
        ],
    );
    let report = harness
        .orchestrator(Some("2508"), standard_sets())
        .run(&[pdf])
        .unwrap();

    assert_eq!(
        output_names(&report),
        vec![
            "2003_愛知県蒲郡市_市町村申告書_2508.pdf",
            "1011_愛知県_都道府県申告書_2508.pdf",
        ]
    );
    assert_eq!(report.summary.counters.blank_pages_skipped, 1);
}

#[test]
fn tokyo_misplacement_fails_the_job_with_no_output() {
    let harness = Harness::new();
    let pdf = harness.add_source("t", &["法人税及び地方法人税申告書 差引確定法人税額"]);
    let sets = vec![
        JurisdictionSet::with_city("愛知県", "蒲郡市"),
        JurisdictionSet::prefecture_only("東京都"),
    ];
    let err = harness
        .orchestrator(Some("2507"), sets)
        .run(&[pdf])
        .unwrap_err();

    assert!(matches!(
        err,
        EngineError::TokyoConstraintViolation { found_index: 2 }
    ));
    assert!(!harness.out_dir.exists() || fs::read_dir(&harness.out_dir).unwrap().next().is_none());
}

#[test]
fn rerun_with_cached_snapshot_is_byte_identical() {
    let harness = Harness::new();
    let pdf = harness.add_source(
        "det",
        &["法人都道府県民税・事業税・特別法人事業税申告書 愛知県東三河県税事務所"],
    );

    let out_a = harness.root.join("out_a");
    let out_b = harness.root.join("out_b");
    let first = harness
        .orchestrator_in(Some("2507"), standard_sets(), &out_a)
        .run(std::slice::from_ref(&pdf))
        .unwrap();
    let second = harness
        .orchestrator_in(Some("2507"), standard_sets(), &out_b)
        .run(std::slice::from_ref(&pdf))
        .unwrap();

    assert_eq!(output_names(&first), output_names(&second));
}

#[test]
fn unclassifiable_page_gets_synthetic_code() {
    let harness = Harness::new();
    let pdf = harness.add_source("u", &["全く関係のない本文がここに並びます"]);
    let report = harness
        .orchestrator(Some("2507"), vec![])
        .run(&[pdf])
        .unwrap();

    assert_eq!(output_names(&report), vec!["9999_その他書類_2507.pdf"]);
    let outcome = &report.files[0].outcomes[0];
    match outcome {
        ClassificationOutcome::File {
            confidence, method, ..
        } => {
            assert_eq!(*confidence, 0.0);
            assert_eq!(method, "default_fallback");
        }
        other => panic!("expected File outcome, got {other:?}"),
    }
}

#[test]
fn unreadable_source_is_quarantined_per_file() {
    let harness = Harness::new();
    // Binary source with no sidecar text.
    let bad = harness.root.join("bad.pdf");
    fs::write(&bad, [0u8, 159, 146, 150]).unwrap();
    let good = harness.add_source("good", &["法人税及び地方法人税申告書 差引確定法人税額"]);

    let report = harness
        .orchestrator(Some("2507"), vec![])
        .run(&[bad, good])
        .unwrap();

    let errors: Vec<_> = report
        .files
        .iter()
        .flat_map(|f| f.outcomes.iter())
        .filter(|o| matches!(o, ClassificationOutcome::Error { .. }))
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(
        output_names(&report),
        vec!["0001_法人税及び地方法人税申告書_2507.pdf"]
    );
}

#[test]
fn name_collisions_get_numeric_suffixes() {
    let harness = Harness::new();
    let a = harness.add_source("dup_a", &["少額減価償却資産明細表"]);
    let b = harness.add_source("dup_b", &["少額減価償却資産明細表 別冊"]);

    // Two sequential runs into the same output directory; collisions are
    // resolved per write.
    let first = harness
        .orchestrator(Some("2401"), vec![])
        .run(&[a])
        .unwrap();
    let second = harness
        .orchestrator(Some("2401"), vec![])
        .run(&[b])
        .unwrap();

    assert_eq!(
        output_names(&first),
        vec!["6003_少額減価償却資産明細表_2401.pdf"]
    );
    assert_eq!(
        output_names(&second),
        vec!["6003_少額減価償却資産明細表_2401_001.pdf"]
    );
}
