//! Jurisdictional overlay for local-tax codes.
//!
//! Outside the local-tax domain the overlay is skipped entirely and the
//! reason names the domain, so national/consumption/accounting/assets/
//! summary documents produce no overlay chatter in logs. Prefectural
//! declarations are upgraded through a fixed prefecture→code table;
//! municipal declarations keep their classified ordinal.

use tracing::{debug, info};

use crate::core::domain::{is_municipal_tax, is_prefecture_tax, resolve_domain, Domain};

/// Jurisdiction set context for one page, drawn from the job's UI sets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetContext {
    pub prefecture: Option<String>,
    pub city: Option<String>,
    /// 1-based UI set index, when known.
    pub set_index: Option<usize>,
}

impl SetContext {
    pub fn new(prefecture: impl Into<String>) -> Self {
        Self {
            prefecture: Some(prefecture.into()),
            city: None,
            set_index: None,
        }
    }

    pub fn with_city(prefecture: impl Into<String>, city: impl Into<String>) -> Self {
        Self {
            prefecture: Some(prefecture.into()),
            city: Some(city.into()),
            set_index: None,
        }
    }
}

/// Outcome of overlay evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayOutcome {
    /// Upgraded code, `None` when the overlay was skipped.
    pub overlay_code: Option<String>,
    /// Why the overlay applied, kept the base, or was skipped.
    pub reason: String,
}

impl OverlayOutcome {
    pub fn skipped(&self) -> bool {
        self.overlay_code.is_none()
    }
}

/// Prefecture → prefectural declaration code.
pub const PREFECTURE_CODE_MAP: &[(&str, &str)] = &[
    ("東京都", "1001"),
    ("愛知県", "1011"),
    ("福岡県", "1021"),
    ("大阪府", "1031"),
    ("神奈川県", "1041"),
];

/// Look up the prefectural declaration code for a prefecture name.
pub fn prefecture_code(prefecture: &str) -> Option<&'static str> {
    PREFECTURE_CODE_MAP
        .iter()
        .find(|(name, _)| *name == prefecture)
        .map(|(_, code)| *code)
}

/// Apply the local-tax overlay to a classified base code.
pub fn apply_local_overlay(base_code: &str, ctx: &SetContext) -> OverlayOutcome {
    let domain = resolve_domain(base_code);

    if domain != Domain::LocalTax {
        info!("overlay=SKIPPED(domain={domain})");
        return OverlayOutcome {
            overlay_code: None,
            reason: domain.to_string(),
        };
    }

    if is_prefecture_tax(base_code) {
        return apply_prefecture_overlay(base_code, ctx);
    }
    if is_municipal_tax(base_code) {
        return apply_municipal_overlay(base_code, ctx);
    }

    debug!(base_code, "other local-tax code, overlay kept as-is");
    OverlayOutcome {
        overlay_code: Some(base_code.to_string()),
        reason: "OTHER_LOCAL_TAX".to_string(),
    }
}

fn apply_prefecture_overlay(base_code: &str, ctx: &SetContext) -> OverlayOutcome {
    let Some(prefecture) = ctx.prefecture.as_deref() else {
        debug!(base_code, "no prefecture context, keeping base code");
        return OverlayOutcome {
            overlay_code: Some(base_code.to_string()),
            reason: "NO_PREFECTURE".to_string(),
        };
    };

    match prefecture_code(prefecture) {
        Some(upgraded) => {
            info!("自治体名付きコード生成: {base_code} → {upgraded} ({prefecture})");
            OverlayOutcome {
                overlay_code: Some(upgraded.to_string()),
                reason: format!("PREF={prefecture}"),
            }
        }
        None => {
            debug!(base_code, prefecture, "prefecture not in mapping");
            OverlayOutcome {
                overlay_code: Some(base_code.to_string()),
                reason: format!("UNMAPPED_PREF={prefecture}"),
            }
        }
    }
}

fn apply_municipal_overlay(base_code: &str, ctx: &SetContext) -> OverlayOutcome {
    // Municipal codes carry their ordinal from classification; the overlay
    // only annotates which city the sets resolved.
    match ctx.city.as_deref() {
        Some(city) => OverlayOutcome {
            overlay_code: Some(base_code.to_string()),
            reason: format!("MUNICIPAL={city}"),
        },
        None => OverlayOutcome {
            overlay_code: Some(base_code.to_string()),
            reason: "MUNICIPAL_NO_CITY".to_string(),
        },
    }
}
