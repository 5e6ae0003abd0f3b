//! Job configuration.
//!
//! Defaults follow the `default_*()` function idiom so a partially
//! specified config file deserializes to the same values the CLI uses.
//! Environment variables (`TAXDOC_SNAPSHOT_DIR`, `RESCUE_ENABLED`) feed
//! the defaults; CLI flags override fields afterwards.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for one processing job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// Directory for content-addressed snapshot JSON files.
    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: PathBuf,

    /// Directory that receives the renamed output files.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Worker pool size; 0 means one worker per core.
    #[serde(default = "default_jobs")]
    pub jobs: usize,

    /// Cap on pages scanned per source during snapshot building.
    #[serde(default)]
    pub max_scan_pages: Option<usize>,

    /// Batch mode defers missing UI input instead of failing.
    #[serde(default = "default_batch_mode")]
    pub batch_mode: bool,

    /// Verbose per-page logging.
    #[serde(default)]
    pub debug_mode: bool,

    /// Loosens the UI-forced period rule for specific audits.
    #[serde(default)]
    pub allow_auto_forced_codes: bool,

    /// Post-job reconciliation pass for asset documents.
    #[serde(default = "default_rescue_enabled")]
    pub rescue_enabled: bool,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            snapshot_dir: default_snapshot_dir(),
            output_dir: default_output_dir(),
            jobs: default_jobs(),
            max_scan_pages: None,
            batch_mode: default_batch_mode(),
            debug_mode: false,
            allow_auto_forced_codes: false,
            rescue_enabled: default_rescue_enabled(),
        }
    }
}

impl JobConfig {
    /// Effective worker count: explicit value or one per core.
    pub fn effective_jobs(&self) -> usize {
        if self.jobs == 0 {
            num_cpus::get()
        } else {
            self.jobs
        }
    }
}

fn default_snapshot_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("TAXDOC_SNAPSHOT_DIR") {
        return PathBuf::from(dir);
    }
    dirs::cache_dir()
        .map(|d| d.join("taxdoc").join("snapshots"))
        .unwrap_or_else(|| PathBuf::from("./snapshots"))
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./renamed")
}

fn default_jobs() -> usize {
    0
}

fn default_batch_mode() -> bool {
    true
}

fn default_rescue_enabled() -> bool {
    matches!(
        std::env::var("RESCUE_ENABLED").as_deref(),
        Ok("1") | Ok("true")
    )
}
