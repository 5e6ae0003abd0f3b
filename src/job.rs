//! Job context: the single source of truth for UI inputs during one run.
//!
//! One instance spans one job. The confirmed period, counters, status and
//! audit log live behind a single mutex; jurisdiction sets are fixed at
//! construction. All mutation goes through the methods here, and counter
//! updates are only ever driven by the pipeline orchestrator.

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

use crate::core::types::PeriodSource;
use crate::errors::{EngineError, EngineResult, InputField};
use crate::io::traits::TimeService;
use crate::period::{is_ui_forced_code, validate_ui_yymm};

/// Prefecture name that must occupy set #1 when present.
pub const TOKYO: &str = "東京都";

/// Maximum number of UI jurisdiction sets.
pub const MAX_JURISDICTION_SETS: usize = 5;

/// One UI-ordered jurisdiction entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JurisdictionSet {
    pub prefecture: String,
    pub city: Option<String>,
}

impl JurisdictionSet {
    pub fn prefecture_only(prefecture: impl Into<String>) -> Self {
        Self {
            prefecture: prefecture.into(),
            city: None,
        }
    }

    pub fn with_city(prefecture: impl Into<String>, city: impl Into<String>) -> Self {
        Self {
            prefecture: prefecture.into(),
            city: Some(city.into()),
        }
    }
}

/// Job lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Initialized,
    Processing,
    Completed,
    Failed,
}

/// Processing counters, updated via the orchestrator only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobCounters {
    pub total_files: usize,
    pub processed_files: usize,
    pub bundle_splits: usize,
    pub ui_forced_files: usize,
    pub detected_files: usize,
    pub needs_ui_items: usize,
    pub blank_pages_skipped: usize,
    pub error_files: usize,
}

/// Serializable job summary.
#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub job_id: String,
    pub status: JobStatus,
    pub confirmed_yymm: Option<String>,
    pub yymm_source: PeriodSource,
    pub counters: JobCounters,
    pub audit_entries: usize,
    pub error_count: usize,
}

#[derive(Debug)]
struct JobState {
    confirmed_yymm: Option<String>,
    yymm_source: PeriodSource,
    status: JobStatus,
    counters: JobCounters,
    audit_log: Vec<String>,
    error_messages: Vec<String>,
}

/// Shared, mutex-guarded job context.
pub struct JobContext {
    job_id: String,
    sets: Vec<JurisdictionSet>,
    batch_mode: bool,
    debug_mode: bool,
    allow_auto_forced_codes: bool,
    time: Arc<dyn TimeService>,
    state: Mutex<JobState>,
}

impl std::fmt::Debug for JobContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobContext")
            .field("job_id", &self.job_id)
            .field("sets", &self.sets)
            .field("batch_mode", &self.batch_mode)
            .field("debug_mode", &self.debug_mode)
            .field("allow_auto_forced_codes", &self.allow_auto_forced_codes)
            .field("state", &self.state)
            .finish()
    }
}

impl JobContext {
    /// Create a job context.
    ///
    /// The UI period, when given, is normalized and validated here;
    /// invalid input is rejected with `InvalidPeriod`, never corrected.
    pub fn new(
        job_id: impl Into<String>,
        ui_yymm: Option<&str>,
        sets: Vec<JurisdictionSet>,
        batch_mode: bool,
        debug_mode: bool,
        allow_auto_forced_codes: bool,
        time: Arc<dyn TimeService>,
    ) -> EngineResult<Self> {
        let job_id = job_id.into();
        if sets.len() > MAX_JURISDICTION_SETS {
            return Err(EngineError::Invariant(format!(
                "at most {MAX_JURISDICTION_SETS} jurisdiction sets are supported, got {}",
                sets.len()
            )));
        }

        let (confirmed_yymm, yymm_source) = match ui_yymm.filter(|v| !v.trim().is_empty()) {
            Some(raw) => (Some(validate_ui_yymm(raw)?), PeriodSource::Ui),
            None => (None, PeriodSource::None),
        };

        let created_at = time.now_iso8601();
        let ctx = Self {
            job_id: job_id.clone(),
            sets,
            batch_mode,
            debug_mode,
            allow_auto_forced_codes,
            time,
            state: Mutex::new(JobState {
                confirmed_yymm,
                yymm_source,
                status: JobStatus::Initialized,
                counters: JobCounters::default(),
                audit_log: vec![format!("[{created_at}] JobContext initialized: job_id={job_id}")],
                error_messages: Vec::new(),
            }),
        };
        Ok(ctx)
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn batch_mode(&self) -> bool {
        self.batch_mode
    }

    pub fn debug_mode(&self) -> bool {
        self.debug_mode
    }

    pub fn allow_auto_forced_codes(&self) -> bool {
        self.allow_auto_forced_codes
    }

    pub fn jurisdiction_sets(&self) -> &[JurisdictionSet] {
        &self.sets
    }

    pub fn confirmed_yymm(&self) -> Option<String> {
        self.state.lock().confirmed_yymm.clone()
    }

    pub fn yymm_source(&self) -> PeriodSource {
        self.state.lock().yymm_source
    }

    /// Set the confirmed period. The single entry point for period writes.
    pub fn set_confirmed_yymm(
        &self,
        yymm: &str,
        source: PeriodSource,
        reason: Option<&str>,
    ) -> EngineResult<()> {
        let validated = validate_ui_yymm(yymm)?;
        let now = self.time.now_iso8601();
        let mut state = self.state.lock();
        let old = state.confirmed_yymm.take();
        let mut entry = format!(
            "[{now}] YYMM confirmed: {} -> {validated} (source={source})",
            old.as_deref().unwrap_or("-")
        );
        if let Some(reason) = reason {
            entry.push_str(&format!(" reason={reason}"));
        }
        info!("[JOB_CONTEXT] {entry}");
        state.confirmed_yymm = Some(validated);
        state.yymm_source = source;
        state.audit_log.push(entry);
        Ok(())
    }

    /// 1-based set index of a prefecture.
    pub fn get_set_index_for_pref(&self, prefecture: &str) -> Option<usize> {
        self.sets
            .iter()
            .position(|s| s.prefecture == prefecture)
            .map(|i| i + 1)
    }

    /// 1-based set index of a (prefecture, city) pair.
    pub fn get_set_index_for_city(&self, prefecture: &str, city: &str) -> Option<usize> {
        self.sets
            .iter()
            .position(|s| s.prefecture == prefecture && s.city.as_deref() == Some(city))
            .map(|i| i + 1)
    }

    /// City registered at a 1-based set index.
    pub fn get_city_for_set(&self, index: usize) -> Option<String> {
        self.sets
            .get(index.checked_sub(1)?)
            .and_then(|s| s.city.clone())
    }

    /// Tokyo must sit at set #1 when present anywhere in the sets.
    pub fn validate_tokyo_constraint(&self) -> EngineResult<()> {
        match self.get_set_index_for_pref(TOKYO) {
            Some(index) if index != 1 => {
                error!("[FATAL] Tokyo constraint violated: found at set #{index}");
                Err(EngineError::TokyoConstraintViolation { found_index: index })
            }
            _ => Ok(()),
        }
    }

    /// Period for a classification code; UI-forced codes require a UI
    /// period or fail.
    pub fn get_yymm_for_classification(&self, code: &str) -> EngineResult<String> {
        let state = self.state.lock();
        if is_ui_forced_code(code) {
            let ui_backed = matches!(
                state.yymm_source,
                PeriodSource::Ui | PeriodSource::UiForced | PeriodSource::Gui
            );
            if state.confirmed_yymm.is_none() || !ui_backed {
                return Err(EngineError::NeedsUserInput {
                    code: code.chars().take(4).collect(),
                    field: InputField::Yymm,
                });
            }
        }
        Ok(state.confirmed_yymm.clone().unwrap_or_default())
    }

    /// Transition the job status, with an audit entry.
    pub fn update_status(&self, new_status: JobStatus, message: Option<&str>) {
        let now = self.time.now_iso8601();
        let mut state = self.state.lock();
        let old = state.status;
        state.status = new_status;
        let mut entry = format!("[{now}] Status change: {old:?} -> {new_status:?}");
        if let Some(message) = message {
            entry.push_str(&format!(" ({message})"));
        }
        info!("[JOB_CONTEXT] {entry}");
        state.audit_log.push(entry);
    }

    pub fn status(&self) -> JobStatus {
        self.state.lock().status
    }

    /// Mark processing start.
    pub fn start_processing(&self, total_files: usize) {
        {
            let mut state = self.state.lock();
            state.counters.total_files = total_files;
        }
        self.update_status(
            JobStatus::Processing,
            Some(&format!("Started processing {total_files} files")),
        );
    }

    /// Mark processing completion.
    pub fn complete_processing(&self, success: bool) {
        let message = {
            let state = self.state.lock();
            format!(
                "Processed {}/{} files",
                state.counters.processed_files, state.counters.total_files
            )
        };
        let status = if success {
            JobStatus::Completed
        } else {
            JobStatus::Failed
        };
        self.update_status(status, Some(&message));
    }

    /// Record an error message with an audit entry.
    pub fn add_error(&self, message: &str) {
        let now = self.time.now_iso8601();
        let mut state = self.state.lock();
        error!("[JOB_CONTEXT] {message}");
        state.error_messages.push(message.to_string());
        state.audit_log.push(format!("[{now}] ERROR: {message}"));
    }

    /// Append a free-form audit entry.
    pub fn audit(&self, message: &str) {
        let now = self.time.now_iso8601();
        self.state.lock().audit_log.push(format!("[{now}] {message}"));
    }

    /// Apply a counter update under the lock.
    pub fn update_counters(&self, update: impl FnOnce(&mut JobCounters)) {
        update(&mut self.state.lock().counters);
    }

    pub fn counters(&self) -> JobCounters {
        self.state.lock().counters
    }

    pub fn audit_log(&self) -> Vec<String> {
        self.state.lock().audit_log.clone()
    }

    /// Snapshot of the job for reporting.
    pub fn summary(&self) -> JobSummary {
        let state = self.state.lock();
        JobSummary {
            job_id: self.job_id.clone(),
            status: state.status,
            confirmed_yymm: state.confirmed_yymm.clone(),
            yymm_source: state.yymm_source,
            counters: state.counters,
            audit_entries: state.audit_log.len(),
            error_count: state.error_messages.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::real::SystemTimeService;

    fn ctx(ui_yymm: Option<&str>, sets: Vec<JurisdictionSet>) -> JobContext {
        JobContext::new(
            "job_test",
            ui_yymm,
            sets,
            true,
            false,
            false,
            Arc::new(SystemTimeService),
        )
        .unwrap()
    }

    fn standard_sets() -> Vec<JurisdictionSet> {
        vec![
            JurisdictionSet::prefecture_only("東京都"),
            JurisdictionSet::with_city("愛知県", "蒲郡市"),
            JurisdictionSet::with_city("福岡県", "福岡市"),
        ]
    }

    #[test]
    fn construction_validates_period() {
        let err = JobContext::new(
            "j",
            Some("2513"),
            vec![],
            true,
            false,
            false,
            Arc::new(SystemTimeService),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidPeriod { .. }));
    }

    #[test]
    fn construction_normalizes_period() {
        let ctx = ctx(Some("202508"), vec![]);
        assert_eq!(ctx.confirmed_yymm().as_deref(), Some("2508"));
        assert_eq!(ctx.yymm_source(), PeriodSource::Ui);
    }

    #[test]
    fn set_lookups_are_one_based() {
        let ctx = ctx(Some("2508"), standard_sets());
        assert_eq!(ctx.get_set_index_for_pref("東京都"), Some(1));
        assert_eq!(ctx.get_set_index_for_pref("福岡県"), Some(3));
        assert_eq!(ctx.get_set_index_for_pref("大阪府"), None);
        assert_eq!(ctx.get_set_index_for_city("愛知県", "蒲郡市"), Some(2));
        assert_eq!(ctx.get_set_index_for_city("愛知県", "名古屋市"), None);
        assert_eq!(ctx.get_city_for_set(1), None);
        assert_eq!(ctx.get_city_for_set(2).as_deref(), Some("蒲郡市"));
    }

    #[test]
    fn tokyo_constraint_passes_at_index_one() {
        let ctx = ctx(None, standard_sets());
        assert!(ctx.validate_tokyo_constraint().is_ok());
    }

    #[test]
    fn tokyo_constraint_fails_elsewhere() {
        let sets = vec![
            JurisdictionSet::with_city("愛知県", "蒲郡市"),
            JurisdictionSet::prefecture_only("東京都"),
        ];
        let ctx = ctx(None, sets);
        let err = ctx.validate_tokyo_constraint().unwrap_err();
        assert!(matches!(
            err,
            EngineError::TokyoConstraintViolation { found_index: 2 }
        ));
    }

    #[test]
    fn forced_codes_require_ui_period() {
        let ctx_no_period = ctx(None, vec![]);
        let err = ctx_no_period
            .get_yymm_for_classification("6001")
            .unwrap_err();
        assert!(matches!(err, EngineError::NeedsUserInput { .. }));

        let ctx = ctx(Some("2401"), vec![]);
        assert_eq!(ctx.get_yymm_for_classification("6001").unwrap(), "2401");
        assert_eq!(ctx.get_yymm_for_classification("0001").unwrap(), "2401");
    }

    #[test]
    fn status_transitions_are_audited() {
        let ctx = ctx(Some("2508"), vec![]);
        ctx.start_processing(3);
        assert_eq!(ctx.status(), JobStatus::Processing);
        ctx.complete_processing(true);
        assert_eq!(ctx.status(), JobStatus::Completed);
        let log = ctx.audit_log();
        assert!(log.iter().any(|e| e.contains("Initialized -> Processing")));
        assert!(log.iter().any(|e| e.contains("Processing -> Completed")));
    }

    #[test]
    fn counters_update_under_lock() {
        let ctx = ctx(Some("2508"), vec![]);
        ctx.update_counters(|c| c.processed_files += 1);
        ctx.update_counters(|c| c.bundle_splits += 2);
        let counters = ctx.counters();
        assert_eq!(counters.processed_files, 1);
        assert_eq!(counters.bundle_splits, 2);
    }

    #[test]
    fn set_confirmed_yymm_rejects_invalid() {
        let ctx = ctx(None, vec![]);
        assert!(ctx
            .set_confirmed_yymm("9912", PeriodSource::Ui, None)
            .is_ok());
        assert!(ctx
            .set_confirmed_yymm("2513", PeriodSource::Ui, None)
            .is_err());
    }
}
