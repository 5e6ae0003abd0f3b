//! Deterministic sequencing for receipt-notice documents.
//!
//! Receipt notices (prefectural `1003`, municipal `2003`) are numbered by
//! the position of their jurisdiction in the UI-ordered sets, not by the
//! detected name alone: `assigned = BASE + (index − 1) × 10`. Tokyo must
//! occupy set #1 when present; when it does so without a city, municipal
//! indices above 1 shift down by one (Tokyo has no municipal receipt
//! slot).

use std::collections::HashMap;
use tracing::{debug, info};

use crate::errors::{EngineError, EngineResult};
use crate::job::{JobContext, TOKYO};

/// Base code for prefectural receipt notices.
pub const BASE_PREF: u32 = 1003;
/// Base code for municipal receipt notices.
pub const BASE_CITY: u32 = 2003;

/// Whether a code is a receipt notice (1xx3 or 2xx3).
pub fn is_receipt_notice_code(code: &str) -> bool {
    is_pref_receipt_code(code) || is_city_receipt_code(code)
}

/// Prefectural receipt family (1003, 1013, 1023, ...).
pub fn is_pref_receipt_code(code: &str) -> bool {
    matches!(code.parse::<u32>(), Ok(n) if (1000..2000).contains(&n) && n % 10 == 3)
}

/// Municipal receipt family (2003, 2013, 2023, ...).
pub fn is_city_receipt_code(code: &str) -> bool {
    matches!(code.parse::<u32>(), Ok(n) if (2000..3000).contains(&n) && n % 10 == 3)
}

/// Positional sequencer for one job. Assignments are cached so repeated
/// observations of the same jurisdiction yield the same code.
pub struct ReceiptSequencer<'a> {
    ctx: &'a JobContext,
    tokyo_logged: bool,
    assigned: HashMap<String, String>,
}

impl<'a> ReceiptSequencer<'a> {
    pub fn new(ctx: &'a JobContext) -> Self {
        Self {
            ctx,
            tokyo_logged: false,
            assigned: HashMap::new(),
        }
    }

    /// The Tokyo invariant is revalidated on every assignment call.
    fn ensure_tokyo_rule(&mut self) -> EngineResult<()> {
        self.ctx.validate_tokyo_constraint()?;
        if !self.tokyo_logged {
            match self.ctx.get_set_index_for_pref(TOKYO) {
                Some(1) => info!("[SEQ] Tokyo rule validation passed: Tokyo is at Set #1"),
                _ => debug!("[SEQ] Tokyo rule validation passed: Tokyo not in sets"),
            }
            self.tokyo_logged = true;
        }
        Ok(())
    }

    /// Sequence a prefectural receipt by the detected prefecture.
    ///
    /// The snapshot's serial bucket, when present, scopes the idempotency
    /// cache; otherwise the prefecture name does.
    pub fn assign_pref_seq(&mut self, ocr_pref: &str, bucket: Option<&str>) -> EngineResult<String> {
        self.ensure_tokyo_rule()?;

        let cache_key = match bucket {
            Some(bucket) => format!("pref_{bucket}"),
            None => format!("pref_{ocr_pref}"),
        };
        if let Some(code) = self.assigned.get(&cache_key) {
            debug!("[SEQ][PREF] cached: {ocr_pref} -> {code}");
            return Ok(code.clone());
        }

        let set_index = self.ctx.get_set_index_for_pref(ocr_pref).ok_or_else(|| {
            EngineError::UnknownJurisdictionInSets {
                prefecture: ocr_pref.to_string(),
                city: None,
            }
        })?;

        let code = format!("{:04}", BASE_PREF + (set_index as u32 - 1) * 10);
        info!(
            "[SEQ][PREF] assigned: set={set_index} pref={ocr_pref} \
             formula={BASE_PREF}+({set_index}-1)*10={code}"
        );
        self.assigned.insert(cache_key, code.clone());
        Ok(code)
    }

    /// Sequence a municipal receipt by the detected prefecture and city,
    /// applying the Tokyo-skip adjustment when it is in effect.
    ///
    /// As with prefectural receipts, a serial bucket scopes the cache.
    pub fn assign_city_seq(
        &mut self,
        ocr_pref: &str,
        ocr_city: &str,
        bucket: Option<&str>,
    ) -> EngineResult<String> {
        self.ensure_tokyo_rule()?;

        let cache_key = match bucket {
            Some(bucket) => format!("city_{bucket}"),
            None => format!("city_{ocr_pref}_{ocr_city}"),
        };
        if let Some(code) = self.assigned.get(&cache_key) {
            debug!("[SEQ][CITY] cached: {ocr_pref} {ocr_city} -> {code}");
            return Ok(code.clone());
        }

        let set_index = self
            .ctx
            .get_set_index_for_city(ocr_pref, ocr_city)
            .ok_or_else(|| EngineError::UnknownJurisdictionInSets {
                prefecture: ocr_pref.to_string(),
                city: Some(ocr_city.to_string()),
            })?;

        // Tokyo-skip: set 1 is Tokyo with no city, so municipal indices
        // above 1 move up by one.
        let tokyo_skip = self.ctx.get_set_index_for_pref(TOKYO) == Some(1)
            && self
                .ctx
                .get_city_for_set(1)
                .filter(|c| !c.trim().is_empty())
                .is_none()
            && set_index > 1;
        let adjusted_index = if tokyo_skip { set_index - 1 } else { set_index };
        if tokyo_skip {
            info!("[SEQ][CITY] Tokyo-skip applied: set={set_index} -> adjusted={adjusted_index}");
        }

        let code = format!("{:04}", BASE_CITY + (adjusted_index as u32 - 1) * 10);
        info!(
            "[SEQ][CITY] assigned: set={set_index} city={ocr_pref} {ocr_city} \
             tokyo_skip={tokyo_skip} formula={BASE_CITY}+({adjusted_index}-1)*10={code}"
        );
        self.assigned.insert(cache_key, code.clone());
        Ok(code)
    }
}
