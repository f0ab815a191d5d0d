//! Reputation (VirusTotal-style) report reduction.
//!
//! Two raw shapes arrive here: analysis objects (from an upload) carry
//! `data.attributes.{stats, results}`, file objects (from identity search)
//! carry `data.attributes.{last_analysis_stats, last_analysis_results,
//! popular_threat_classification}`. Both reduce the same way.
//!
//! Truncation: per-vendor detections become signature records (malicious
//! ranked above suspicious, ties in the backend's own key order, which
//! serde_json keeps sorted and therefore deterministic), capped at
//! [`SIGNATURE_CAP`]. Reputation reports carry no network section.

use serde_json::Value;

use crate::domain::{
    EngineKind, NormalizedReport, SignatureRecord, VerdictHint,
};

use super::cap_signatures;

pub fn normalize(raw: &Value) -> NormalizedReport {
    let mut report = NormalizedReport::empty(EngineKind::Reputation);

    let attributes = raw
        .get("data")
        .and_then(|d| d.get("attributes"))
        .or_else(|| raw.get("attributes"))
        .unwrap_or(raw);

    let stats = attributes
        .get("stats")
        .or_else(|| attributes.get("last_analysis_stats"));

    let malicious = stat(stats, "malicious");
    let suspicious = stat(stats, "suspicious");
    let total = malicious
        + suspicious
        + stat(stats, "harmless")
        + stat(stats, "undetected")
        + stat(stats, "type-unsupported");

    report.verdict = VerdictHint {
        label: (total > 0).then(|| format!("{malicious}/{total} vendors flagged")),
        family: attributes
            .get("popular_threat_classification")
            .and_then(|c| c.get("suggested_threat_label"))
            .and_then(|l| l.as_str())
            .map(str::to_string),
        score: (total > 0).then(|| malicious as f64),
    };

    let results = attributes
        .get("results")
        .or_else(|| attributes.get("last_analysis_results"));
    report.signatures = cap_signatures(collect_detections(results));

    report
}

fn stat(stats: Option<&Value>, key: &str) -> u64 {
    stats
        .and_then(|s| s.get(key))
        .and_then(|v| v.as_u64())
        .unwrap_or(0)
}

/// One signature record per vendor that flagged the file
fn collect_detections(results: Option<&Value>) -> Vec<SignatureRecord> {
    let Some(results) = results.and_then(|r| r.as_object()) else {
        return Vec::new();
    };

    results
        .iter()
        .filter_map(|(vendor, verdict)| {
            let category = verdict.get("category").and_then(|c| c.as_str())?;
            let severity = match category {
                "malicious" => 2,
                "suspicious" => 1,
                _ => return None,
            };
            Some(SignatureRecord {
                name: verdict
                    .get("engine_name")
                    .and_then(|n| n.as_str())
                    .unwrap_or(vendor)
                    .to_string(),
                description: verdict
                    .get("result")
                    .and_then(|r| r.as_str())
                    .unwrap_or_default()
                    .to_string(),
                severity,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SIGNATURE_CAP;
    use serde_json::json;

    #[test]
    fn reduces_an_analysis_object() {
        let raw = json!({"data": {"attributes": {
            "status": "completed",
            "stats": {"malicious": 34, "suspicious": 2, "harmless": 4, "undetected": 30},
            "results": {
                "VendorA": {"category": "malicious", "engine_name": "VendorA", "result": "Trojan.GenericKD"},
                "VendorB": {"category": "undetected"},
                "VendorC": {"category": "suspicious", "result": "heur/agent"},
            },
        }}});

        let report = normalize(&raw);
        assert_eq!(report.verdict.label.as_deref(), Some("34/70 vendors flagged"));
        assert_eq!(report.verdict.score, Some(34.0));
        assert_eq!(report.signatures.len(), 2, "undetected vendors are dropped");
        assert_eq!(report.signatures[0].name, "VendorA");
        assert!(report.network.is_empty());
    }

    #[test]
    fn reduces_a_file_object_from_identity_search() {
        let raw = json!({"data": {"attributes": {
            "last_analysis_stats": {"malicious": 1, "harmless": 9},
            "last_analysis_results": {
                "VendorZ": {"category": "malicious", "result": "Emotet.A"},
            },
            "popular_threat_classification": {"suggested_threat_label": "trojan.emotet"},
        }}});

        let report = normalize(&raw);
        assert_eq!(report.verdict.family.as_deref(), Some("trojan.emotet"));
        assert_eq!(report.verdict.label.as_deref(), Some("1/10 vendors flagged"));
        assert_eq!(report.signatures[0].description, "Emotet.A");
    }

    #[test]
    fn detection_list_is_capped() {
        let results: serde_json::Map<String, Value> = (0..40)
            .map(|i| {
                (
                    format!("Vendor{i:02}"),
                    json!({"category": "malicious", "result": "bad"}),
                )
            })
            .collect();
        let raw = json!({"data": {"attributes": {"stats": {"malicious": 40}, "results": results}}});

        let report = normalize(&raw);
        assert_eq!(report.signatures.len(), SIGNATURE_CAP);
        assert!(report.within_bounds());
    }

    #[test]
    fn empty_stats_produce_no_verdict() {
        let report = normalize(&json!({"data": {"attributes": {}}}));
        assert_eq!(report.verdict, VerdictHint::default());
    }
}
