//! Report normalization: raw engine reports → bounded common schema.
//!
//! Normalization is pure and total. It never fails: every field access is
//! optional and defaulted, so a malformed, truncated, or unfamiliar raw
//! report degrades to empty fields instead of an error. Backend report
//! shapes drift across versions; nothing in here treats a raw report as a
//! contract.
//!
//! Truncation is deterministic and documented per list in the engine
//! submodules; the output always satisfies [`NormalizedReport::within_bounds`].

mod reputation;
mod sandbox;
mod static_scan;

use crate::domain::{EngineKind, NormalizedReport, SignatureRecord, SIGNATURE_CAP};
use crate::engine::RawReport;

/// Reduce one engine's raw report into the common bounded schema
pub fn normalize(kind: EngineKind, raw: &RawReport) -> NormalizedReport {
    let report = match kind {
        EngineKind::Sandbox => sandbox::normalize(raw),
        EngineKind::StaticScan => static_scan::normalize(raw),
        EngineKind::Reputation => reputation::normalize(raw),
    };
    debug_assert!(report.within_bounds());
    report
}

/// Keep the top [`SIGNATURE_CAP`] records by descending severity.
/// The sort is stable, so equal severities keep the engine's own ordering.
fn cap_signatures(mut signatures: Vec<SignatureRecord>) -> Vec<SignatureRecord> {
    signatures.sort_by_key(|sig| std::cmp::Reverse(sig.severity));
    signatures.truncate(SIGNATURE_CAP);
    signatures
}

/// First-N strings out of a raw JSON array, in the engine's own order
fn string_samples(value: Option<&serde_json::Value>, cap: usize) -> Vec<String> {
    value
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str())
                .take(cap)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Length of a raw JSON array, 0 for anything that is not one
fn array_len(value: Option<&serde_json::Value>) -> usize {
    value.and_then(|v| v.as_array()).map_or(0, |a| a.len())
}
