//! Domain resolution for document codes.
//!
//! The first digit of a four-digit document code selects the processing
//! domain. Resolution is a pure total function: any input, including
//! malformed codes, maps to a defined tag.

use serde::{Deserialize, Serialize};

/// Coarse processing domain of a document code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Domain {
    /// 0xxx, national tax filings.
    NationalTax,
    /// 1xxx (prefectural) and 2xxx (municipal), local tax.
    LocalTax,
    /// 3xxx, consumption tax.
    ConsumptionTax,
    /// 5xxx, accounting ledgers and statements.
    Accounting,
    /// 6xxx, fixed-asset schedules.
    Assets,
    /// 7xxx, summaries and tax-category aggregates.
    Summary,
    /// Anything else.
    Unknown,
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            Domain::NationalTax => "NATIONAL_TAX",
            Domain::LocalTax => "LOCAL_TAX",
            Domain::ConsumptionTax => "CONSUMPTION_TAX",
            Domain::Accounting => "ACCOUNTING",
            Domain::Assets => "ASSETS",
            Domain::Summary => "SUMMARY",
            Domain::Unknown => "UNKNOWN",
        };
        f.write_str(tag)
    }
}

/// Resolve the processing domain from a document code's first digit.
pub fn resolve_domain(code: &str) -> Domain {
    match code.as_bytes().first() {
        Some(b'0') => Domain::NationalTax,
        Some(b'1') | Some(b'2') => Domain::LocalTax,
        Some(b'3') => Domain::ConsumptionTax,
        Some(b'5') => Domain::Accounting,
        Some(b'6') => Domain::Assets,
        Some(b'7') => Domain::Summary,
        _ => Domain::Unknown,
    }
}

/// Prefectural local-tax codes (`10..`).
pub fn is_prefecture_tax(code: &str) -> bool {
    code.starts_with("10")
}

/// Municipal local-tax codes (`20..`).
pub fn is_municipal_tax(code: &str) -> bool {
    code.starts_with("20")
}

/// Overlay processing applies only to the local-tax domain.
pub fn should_suppress_overlay(code: &str) -> bool {
    resolve_domain(code) != Domain::LocalTax
}

/// Japanese description of a domain, used in audit output.
pub fn domain_description(domain: Domain) -> &'static str {
    match domain {
        Domain::NationalTax => "国税関連書類",
        Domain::LocalTax => "地方税関連書類",
        Domain::ConsumptionTax => "消費税関連書類",
        Domain::Accounting => "会計書類",
        Domain::Assets => "固定資産関連書類",
        Domain::Summary => "集計・税区分関連書類",
        Domain::Unknown => "未分類書類",
    }
}
