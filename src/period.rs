//! Reporting-period (YYMM) resolution under strict source precedence.
//!
//! Precedence: UI-forced codes must take the UI value (or defer / fail);
//! then any UI-supplied value; then limited document heuristics; then
//! nothing. UI input is normalized before validation but never silently
//! corrected: an invalid value is rejected where it enters the system.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::core::types::PeriodSource;
use crate::errors::{EngineError, EngineResult, InputField};

/// Codes whose period MUST come from the UI: asset schedules and the
/// payment-tax summary.
pub const UI_FORCED_CODES: &[&str] = &["6001", "6002", "6003", "0000"];

/// Reiwa era offset: Reiwa N = Gregorian (2018 + N), so the two-digit
/// year is N + 18.
const REIWA_YEAR_OFFSET: u32 = 18;

static REIWA_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"令和\s*(\d{1,2})\s*年\s*(\d{1,2})\s*月").expect("reiwa pattern")
});
static GREGORIAN_KANJI_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4})年\s*(\d{1,2})月").expect("gregorian kanji pattern"));
static GREGORIAN_DASH_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4})-(\d{1,2})").expect("gregorian dash pattern"));

/// Whether the code mandates a UI-provided period.
pub fn is_ui_forced_code(code: &str) -> bool {
    UI_FORCED_CODES.iter().any(|forced| code.starts_with(forced))
}

/// Fold fullwidth digits and strip separators; reduce a six-digit
/// `YYYYMM` to `YYMM`. Validation happens separately.
pub fn normalize_ui_yymm(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter_map(|c| match c {
            '０'..='９' => char::from_u32(c as u32 - '０' as u32 + '0' as u32),
            '/' | '-' | ' ' | '　' => None,
            other => Some(other),
        })
        .collect();
    if cleaned.len() == 6 && cleaned.bytes().all(|b| b.is_ascii_digit()) {
        cleaned[2..].to_string()
    } else {
        cleaned
    }
}

/// YYMM validity: four digits, year 01–99, month 01–12.
pub fn is_valid_yymm(yymm: &str) -> bool {
    if yymm.len() != 4 || !yymm.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let year: u32 = yymm[..2].parse().unwrap_or(0);
    let month: u32 = yymm[2..].parse().unwrap_or(0);
    (1..=99).contains(&year) && (1..=12).contains(&month)
}

/// Normalize and validate a UI period, rejecting invalid input.
pub fn validate_ui_yymm(raw: &str) -> EngineResult<String> {
    let normalized = normalize_ui_yymm(raw);
    if is_valid_yymm(&normalized) {
        Ok(normalized)
    } else {
        Err(EngineError::InvalidPeriod { value: normalized })
    }
}

/// Inputs available to period resolution.
#[derive(Debug, Clone, Copy, Default)]
pub struct PeriodInputs<'a> {
    /// Confirmed period from the job context.
    pub ui_yymm: Option<&'a str>,
    /// Period captured in the snapshot meta (GUI at build time).
    pub fallback_yymm: Option<&'a str>,
    /// Batch mode defers missing UI input instead of failing.
    pub batch_mode: bool,
    /// Loosens the UI-forced rule for specific audits.
    pub allow_auto_forced_codes: bool,
}

/// Resolution result.
#[derive(Debug, Clone, PartialEq)]
pub enum PeriodResolution {
    /// A period was determined.
    Resolved {
        yymm: String,
        source: PeriodSource,
        confidence: f64,
        reason: String,
    },
    /// Deferred: the code mandates UI input that is missing (batch mode).
    NeedsUi { code: String },
    /// No source produced a period.
    Unresolved,
}

/// Resolve the period for one classified page.
///
/// `file_id` only labels log lines. Fails with `NeedsUserInput` when a
/// UI-forced code has no UI period in interactive mode.
pub fn resolve_period(
    code: &str,
    document_text: &str,
    inputs: PeriodInputs<'_>,
    file_id: &str,
) -> EngineResult<PeriodResolution> {
    let ui_value = inputs.ui_yymm.or(inputs.fallback_yymm);

    if is_ui_forced_code(code) && !inputs.allow_auto_forced_codes {
        return match ui_value {
            Some(yymm) => Ok(PeriodResolution::Resolved {
                yymm: yymm.to_string(),
                source: PeriodSource::UiForced,
                confidence: 1.0,
                reason: "ui_forced_code".to_string(),
            }),
            None if inputs.batch_mode => {
                warn!(code, file_id, "UI period required but missing; deferring");
                Ok(PeriodResolution::NeedsUi {
                    code: code.to_string(),
                })
            }
            None => Err(EngineError::NeedsUserInput {
                code: code.to_string(),
                field: InputField::Yymm,
            }),
        };
    }

    if let Some(yymm) = inputs.ui_yymm {
        return Ok(PeriodResolution::Resolved {
            yymm: yymm.to_string(),
            source: PeriodSource::Ui,
            confidence: 1.0,
            reason: "job_context".to_string(),
        });
    }
    if let Some(yymm) = inputs.fallback_yymm {
        return Ok(PeriodResolution::Resolved {
            yymm: yymm.to_string(),
            source: PeriodSource::UiFallback,
            confidence: 0.9,
            reason: "snapshot_meta".to_string(),
        });
    }

    if let Some((yymm, reason)) = document_heuristic(document_text) {
        debug!(code, file_id, yymm = %yymm, "period from document heuristic");
        return Ok(PeriodResolution::Resolved {
            yymm,
            source: PeriodSource::DocHeuristic,
            confidence: 0.6,
            reason,
        });
    }

    Ok(PeriodResolution::Unresolved)
}

/// Limited document heuristics, tried in order.
fn document_heuristic(text: &str) -> Option<(String, String)> {
    if let Some(caps) = REIWA_PATTERN.captures(text) {
        let era_year: u32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let yymm = format!("{:02}{:02}", (era_year + REIWA_YEAR_OFFSET) % 100, month);
        if is_valid_yymm(&yymm) {
            return Some((yymm, "reiwa_era".to_string()));
        }
    }
    for (pattern, reason) in [
        (&*GREGORIAN_KANJI_PATTERN, "gregorian_kanji"),
        (&*GREGORIAN_DASH_PATTERN, "gregorian_dash"),
    ] {
        if let Some(caps) = pattern.captures(text) {
            let year: u32 = caps[1].parse().ok()?;
            let month: u32 = caps[2].parse().ok()?;
            let yymm = format!("{:02}{:02}", year % 100, month);
            if is_valid_yymm(&yymm) {
                return Some((yymm, reason.to_string()));
            }
        }
    }
    None
}
