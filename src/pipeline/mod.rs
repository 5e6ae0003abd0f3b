//! Pipeline orchestrator.
//!
//! Wires snapshot building, bundle splitting, classification, overlay,
//! sequencing, period resolution and naming into one per-file pipeline.
//! Files run in parallel on the rayon pool; within a file, pages are
//! processed sequentially and outcomes are emitted in ascending page
//! order. This is the only layer that converts recoverable errors into
//! outcomes and the only writer of job counters.

use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::classify::engine::{ClassifierOutput, DocumentClassifier};
use crate::classify::normalize::{is_blank_page, normalize_for_match};
use crate::config::JobConfig;
use crate::core::domain::{domain_description, resolve_domain, Domain};
use crate::core::types::{
    ClassificationOutcome, ClassificationRecord, PeriodSource, PreExtractSnapshot,
};
use crate::errors::{EngineError, EngineResult};
use crate::io::traits::{FileSystemService, TextService, TimeService};
use crate::job::{JobContext, JobSummary};
use crate::naming::{ensure_unique_target, title_of, FilenameBuilder, NamingContext};
use crate::overlay::{apply_local_overlay, SetContext};
use crate::period::{resolve_period, PeriodInputs, PeriodResolution};
use crate::sequence::{is_city_receipt_code, is_pref_receipt_code, ReceiptSequencer};
use crate::snapshot::SnapshotStore;
use crate::split::{enumerate_items, evaluate_bundle, DocItem, NO_SPLIT_CODES};

/// Bundled collaborator services.
#[derive(Clone)]
pub struct Services {
    pub text: Arc<dyn TextService>,
    pub fs: Arc<dyn FileSystemService>,
    pub time: Arc<dyn TimeService>,
}

/// Ordered outcomes for one input file.
#[derive(Debug, Clone, Serialize)]
pub struct FileResult {
    pub source: PathBuf,
    pub outcomes: Vec<ClassificationOutcome>,
}

impl FileResult {
    fn error(source: &Path, stage: &str, message: String) -> Self {
        Self {
            source: source.to_path_buf(),
            outcomes: vec![ClassificationOutcome::Error {
                stage: stage.to_string(),
                message,
            }],
        }
    }
}

/// Full job report.
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub files: Vec<FileResult>,
    pub summary: JobSummary,
}

impl JobReport {
    /// Outstanding NEEDS_UI entries as `(code, source)` pairs.
    pub fn needs_ui_entries(&self) -> Vec<(String, PathBuf)> {
        self.files
            .iter()
            .flat_map(|file| {
                file.outcomes.iter().filter_map(|outcome| match outcome {
                    ClassificationOutcome::NeedsUi { code, .. } => {
                        Some((code.clone(), file.source.clone()))
                    }
                    _ => None,
                })
            })
            .collect()
    }

    /// Process exit code for CLI callers: 0 success, 2 when NEEDS_UI
    /// items remain.
    pub fn exit_code(&self) -> i32 {
        if self.needs_ui_entries().is_empty() {
            0
        } else {
            2
        }
    }
}

/// Drives C1–C9 for a set of input files.
pub struct PipelineOrchestrator {
    config: JobConfig,
    job: Arc<JobContext>,
    services: Services,
    classifier: DocumentClassifier,
    store: SnapshotStore,
    cancel: Arc<AtomicBool>,
}

impl PipelineOrchestrator {
    pub fn new(config: JobConfig, job: Arc<JobContext>, services: Services) -> Self {
        let store = SnapshotStore::new(config.snapshot_dir.clone(), config.max_scan_pages);
        Self {
            config,
            job,
            services,
            classifier: DocumentClassifier::new(),
            store,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Cooperative cancel flag, checked at page boundaries and before
    /// external calls.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Process all input files; returns the job report or a job-fatal
    /// error.
    pub fn run(&self, inputs: &[PathBuf]) -> EngineResult<JobReport> {
        // Preflight: the Tokyo invariant fails the job before any work.
        self.job.validate_tokyo_constraint()?;
        self.job.start_processing(inputs.len());

        let results: Vec<EngineResult<FileResult>> = inputs
            .par_iter()
            .map(|path| {
                if self.cancelled() {
                    return Ok(FileResult {
                        source: path.clone(),
                        outcomes: Vec::new(),
                    });
                }
                let result = self.process_file(path);
                if let Err(err) = &result {
                    if err.is_job_fatal() {
                        // Stop the other workers at their next boundary.
                        self.cancel.store(true, Ordering::Relaxed);
                    }
                }
                result
            })
            .collect();

        let mut files = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(file) => files.push(file),
                Err(err) => {
                    self.job.complete_processing(false);
                    return Err(err);
                }
            }
        }

        if self.config.rescue_enabled {
            self.rescue_pass(&mut files);
        }

        self.job.complete_processing(true);
        Ok(JobReport {
            files,
            summary: self.job.summary(),
        })
    }

    /// Run the sequential pipeline for one file. Job-fatal errors
    /// propagate; everything else becomes an outcome.
    fn process_file(&self, source: &Path) -> EngineResult<FileResult> {
        info!(source = %source.display(), "processing file");

        let prepared = match self.prepare_file(source) {
            Ok(prepared) => prepared,
            Err(err) if err.is_job_fatal() => return Err(err),
            Err(err) => {
                self.job.add_error(&err.to_string());
                self.job.update_counters(|c| c.error_files += 1);
                return Ok(FileResult::error(source, "snapshot", err.to_string()));
            }
        };

        if prepared.bundle {
            self.job.update_counters(|c| c.bundle_splits += 1);
            self.job.audit(&format!(
                "bundle split: {} ({} items)",
                source.display(),
                prepared.items.len()
            ));
        }

        let mut sequencer = ReceiptSequencer::new(&self.job);
        let mut outcomes = Vec::new();
        for item in &prepared.items {
            if self.cancelled() {
                debug!("cancelled at page boundary, discarding remaining items");
                break;
            }
            let processed = self.process_item(
                source,
                &prepared.snapshot,
                item,
                &mut sequencer,
                self.config.allow_auto_forced_codes,
            );
            match processed {
                Ok(Some(outcome)) => {
                    self.count_outcome(&outcome);
                    outcomes.push(outcome);
                }
                Ok(None) => {
                    self.job.update_counters(|c| c.blank_pages_skipped += 1);
                }
                Err(err) if err.is_job_fatal() => return Err(err),
                Err(err) => {
                    let outcome = ClassificationOutcome::Error {
                        stage: "page".to_string(),
                        message: err.to_string(),
                    };
                    self.count_outcome(&outcome);
                    outcomes.push(outcome);
                }
            }
        }

        self.job.update_counters(|c| c.processed_files += 1);
        Ok(FileResult {
            source: source.to_path_buf(),
            outcomes,
        })
    }

    /// Snapshot, page texts, bundle decision and item list for one file.
    fn prepare_file(&self, source: &Path) -> EngineResult<PreparedFile> {
        let snapshot = self.build_snapshot(source)?;
        let page_texts = self.extract_page_texts(source, snapshot.pages.len())?;

        let filename = source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let decision = evaluate_bundle(&page_texts, &filename, &self.classifier);
        let items = enumerate_items(&snapshot, &decision, &page_texts);
        Ok(PreparedFile {
            snapshot,
            items,
            bundle: decision.is_bundle,
        })
    }

    fn build_snapshot(&self, source: &Path) -> EngineResult<PreExtractSnapshot> {
        let ui_yymm = self.job.confirmed_yymm();
        let mut ui_context = BTreeMap::new();
        ui_context.insert("job_id".to_string(), serde_json::json!(self.job.job_id()));
        ui_context.insert(
            "batch_mode".to_string(),
            serde_json::json!(self.job.batch_mode()),
        );
        self.store.build_or_load(
            source,
            ui_yymm.as_deref(),
            ui_context,
            self.services.text.as_ref(),
            self.services.fs.as_ref(),
            self.services.time.as_ref(),
        )
    }

    fn extract_page_texts(&self, source: &Path, pages: usize) -> EngineResult<Vec<String>> {
        (0..pages)
            .map(|i| self.services.text.extract_text(source, i))
            .collect()
    }

    /// Stages a–g of the per-item pipeline. `Ok(None)` marks a blank page.
    fn process_item(
        &self,
        source: &Path,
        snapshot: &PreExtractSnapshot,
        item: &DocItem,
        sequencer: &mut ReceiptSequencer<'_>,
        allow_auto_forced: bool,
    ) -> EngineResult<Option<ClassificationOutcome>> {
        let item_filename = self.item_filename(source, item);

        // a. Blank-page guard.
        let normalized = normalize_for_match(&item.text);
        if is_blank_page(&normalized, &item_filename) {
            debug!(file = %item_filename, "blank page skipped");
            return Ok(None);
        }

        // b. Classify.
        let classified = self.classifier.classify(&item.text, &item_filename);
        let mut base_code = classified.code.clone();

        // c. Overlay with set context from the job's UI sets.
        let fields = snapshot.pages.get(item.id.page_index);
        let set_ctx =
            self.resolve_set_context(fields.and_then(|f| f.muni_name.as_deref()), &normalized);
        let overlay = apply_local_overlay(&base_code, &set_ctx);
        let mut overlay_code = overlay.overlay_code.clone();

        // d. Receipt notices get positional sequence codes, keyed by the
        // snapshot's serial bucket when the page carries one.
        let bucket = fields.and_then(|f| f.serial_bucket.as_deref());
        if is_pref_receipt_code(&base_code) {
            if let Some(prefecture) = set_ctx.prefecture.as_deref() {
                base_code = sequencer.assign_pref_seq(prefecture, bucket)?;
                overlay_code = None;
            }
        } else if is_city_receipt_code(&base_code) {
            if let (Some(prefecture), Some(city)) =
                (set_ctx.prefecture.as_deref(), set_ctx.city.as_deref())
            {
                base_code = sequencer.assign_city_seq(prefecture, city, bucket)?;
                overlay_code = None;
            }
        }

        // e. Period resolution.
        let ui_yymm = self.job.confirmed_yymm();
        let inputs = PeriodInputs {
            ui_yymm: ui_yymm.as_deref(),
            fallback_yymm: snapshot.meta.yymm.as_deref(),
            batch_mode: self.job.batch_mode(),
            allow_auto_forced_codes: allow_auto_forced,
        };
        let resolution = resolve_period(&base_code, &normalized, inputs, &item_filename)?;
        let (yymm, yymm_source) = match resolution {
            PeriodResolution::Resolved {
                yymm,
                source,
                confidence,
                reason,
            } => {
                debug!(yymm = %yymm, %source, confidence, reason = %reason, "period resolved");
                (Some(yymm), source)
            }
            PeriodResolution::NeedsUi { code } => {
                warn!(code = %code, file = %item_filename, "NEEDS_UI: processing deferred");
                return Ok(Some(ClassificationOutcome::NeedsUi {
                    code,
                    field: "YYMM".to_string(),
                }));
            }
            PeriodResolution::Unresolved => (None, PeriodSource::None),
        };

        // f. Finalize the record and log the triple-consistency block.
        let record = self.finalize_record(
            base_code,
            overlay_code,
            overlay.reason,
            yymm,
            yymm_source,
            &classified,
        );
        self.log_record(&record, &item_filename, &set_ctx);

        // g. Compose the name and publish the bytes.
        self.publish(source, item, &record, &set_ctx)
    }

    fn finalize_record(
        &self,
        base_code: String,
        overlay_code: Option<String>,
        overlay_reason: String,
        yymm: Option<String>,
        yymm_source: PeriodSource,
        classified: &ClassifierOutput,
    ) -> ClassificationRecord {
        let mut meta = BTreeMap::new();
        let domain = resolve_domain(&base_code);
        meta.insert("domain".to_string(), serde_json::json!(domain.to_string()));
        meta.insert(
            "domain_description".to_string(),
            serde_json::json!(domain_description(domain)),
        );
        meta.insert(
            "overlay_reason".to_string(),
            serde_json::json!(overlay_reason),
        );
        meta.insert(
            "no_split".to_string(),
            serde_json::json!(NO_SPLIT_CODES.contains(&classified.code.as_str())),
        );

        ClassificationRecord {
            title: title_of(&base_code),
            base_code,
            overlay_code,
            yymm,
            yymm_source,
            confidence: classified.confidence,
            method: classified.method.clone(),
            matched_keywords: classified.matched_keywords.clone(),
            meta,
        }
    }

    fn log_record(&self, record: &ClassificationRecord, filename: &str, set_ctx: &SetContext) {
        info!(
            file = filename,
            display_code = record.display_code(),
            final_code = record.final_code(),
            yymm = record.yymm.as_deref().unwrap_or("-"),
            yymm_source = %record.yymm_source,
            method = %record.method,
            confidence = record.confidence,
            prefecture = set_ctx.prefecture.as_deref().unwrap_or("-"),
            city = set_ctx.city.as_deref().unwrap_or("-"),
            consistent = record.display_code() == record.final_code(),
            "classification record"
        );
    }

    fn publish(
        &self,
        source: &Path,
        item: &DocItem,
        record: &ClassificationRecord,
        set_ctx: &SetContext,
    ) -> EngineResult<Option<ClassificationOutcome>> {
        let naming_ctx = NamingContext {
            prefecture: set_ctx.prefecture.clone(),
            city: set_ctx.city.clone(),
            source_filename: source.file_name().map(|n| n.to_string_lossy().to_string()),
        };

        let filename = match FilenameBuilder::new().build(record, &naming_ctx) {
            Ok(filename) => filename,
            Err(EngineError::NeedsUserInput { code, field }) if self.job.batch_mode() => {
                return Ok(Some(ClassificationOutcome::NeedsUi {
                    code,
                    field: field.to_string(),
                }));
            }
            Err(err) => return Err(err),
        };

        if self.cancelled() {
            // No partial publication after cancel.
            return Ok(Some(ClassificationOutcome::Error {
                stage: "publish".to_string(),
                message: "cancelled before output write".to_string(),
            }));
        }

        let bytes = if item.from_split {
            self.services.text.render_page(source, item.id.page_index)?
        } else {
            self.services.fs.read_bytes(source)?
        };
        let target = ensure_unique_target(
            &self.config.output_dir,
            &filename,
            self.services.fs.as_ref(),
        );
        self.services.fs.write_bytes_atomic(&target, &bytes)?;

        let overlay_reason = record
            .meta
            .get("overlay_reason")
            .and_then(|v| v.as_str())
            .map(String::from);
        Ok(Some(ClassificationOutcome::File {
            output_path: target,
            display_code: record.display_code().to_string(),
            final_code: record.final_code().to_string(),
            yymm: record.yymm.clone().unwrap_or_default(),
            yymm_source: record.yymm_source,
            confidence: record.confidence,
            method: record.method.clone(),
            matched_keywords: record.matched_keywords.clone(),
            overlay_reason,
        }))
    }

    /// Virtual filename for one item; split pages carry split markers so
    /// the blank-page guard can see them.
    fn item_filename(&self, source: &Path, item: &DocItem) -> String {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        if item.from_split {
            format!("__split_{stem}_page_{:03}.pdf", item.id.page_index + 1)
        } else {
            source
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default()
        }
    }

    /// Match the detected jurisdiction against the UI-ordered sets,
    /// cities first (most specific).
    fn resolve_set_context(&self, muni_name: Option<&str>, text: &str) -> SetContext {
        let haystack = match muni_name {
            Some(muni) => format!("{muni} {text}"),
            None => text.to_string(),
        };

        let sets = self.job.jurisdiction_sets();
        for (i, set) in sets.iter().enumerate() {
            if let Some(city) = set.city.as_deref() {
                if !city.is_empty() && haystack.contains(city) {
                    return SetContext {
                        prefecture: Some(set.prefecture.clone()),
                        city: Some(city.to_string()),
                        set_index: Some(i + 1),
                    };
                }
            }
        }
        for (i, set) in sets.iter().enumerate() {
            if haystack.contains(&set.prefecture) {
                return SetContext {
                    prefecture: Some(set.prefecture.clone()),
                    city: set.city.clone(),
                    set_index: Some(i + 1),
                };
            }
        }
        SetContext::default()
    }

    fn count_outcome(&self, outcome: &ClassificationOutcome) {
        match outcome {
            ClassificationOutcome::File { yymm_source, .. } => match yymm_source {
                PeriodSource::UiForced => self.job.update_counters(|c| c.ui_forced_files += 1),
                PeriodSource::DocHeuristic => self.job.update_counters(|c| c.detected_files += 1),
                _ => {}
            },
            ClassificationOutcome::NeedsUi { .. } => {
                self.job.update_counters(|c| c.needs_ui_items += 1);
            }
            ClassificationOutcome::Error { .. } => {
                self.job.update_counters(|c| c.error_files += 1);
            }
        }
    }

    /// Post-job reconciliation for asset documents (RESCUE_ENABLED).
    ///
    /// Deferred asset items are re-resolved with document heuristics
    /// allowed; classification is deliberately repeated per item. Main
    /// pass counters stay untouched.
    fn rescue_pass(&self, files: &mut [FileResult]) {
        let mut rescued = 0usize;
        for file in files.iter_mut() {
            let deferred_asset_codes: Vec<String> = file
                .outcomes
                .iter()
                .filter_map(|o| match o {
                    ClassificationOutcome::NeedsUi { code, .. }
                        if resolve_domain(code) == Domain::Assets =>
                    {
                        Some(code.clone())
                    }
                    _ => None,
                })
                .collect();
            if deferred_asset_codes.is_empty() {
                continue;
            }

            let Ok(prepared) = self.prepare_file(&file.source) else {
                continue;
            };
            let mut sequencer = ReceiptSequencer::new(&self.job);
            for item in &prepared.items {
                // Re-classify to target only the deferred items; anything
                // already published in the main pass is not touched again.
                let code = self
                    .classifier
                    .classify(&item.text, &self.item_filename(&file.source, item))
                    .code;
                if !deferred_asset_codes.contains(&code) {
                    continue;
                }
                let retried = self
                    .process_item(&file.source, &prepared.snapshot, item, &mut sequencer, true)
                    .ok()
                    .flatten();
                let Some(outcome @ ClassificationOutcome::File { .. }) = retried else {
                    continue;
                };
                let display_code = match &outcome {
                    ClassificationOutcome::File { display_code, .. } => display_code.clone(),
                    _ => continue,
                };
                if !deferred_asset_codes.contains(&display_code) {
                    continue;
                }
                let slot = file.outcomes.iter_mut().find(|o| {
                    matches!(o, ClassificationOutcome::NeedsUi { code, .. } if *code == display_code)
                });
                if let Some(slot) = slot {
                    *slot = outcome;
                    rescued += 1;
                }
            }
        }
        if rescued > 0 {
            info!(rescued, "rescue pass recovered asset documents");
            self.job
                .audit(&format!("rescue pass recovered {rescued} asset documents"));
        }
    }
}

struct PreparedFile {
    snapshot: PreExtractSnapshot,
    items: Vec<DocItem>,
    bundle: bool,
}
