//! Static analyzer (MobSF-style) report reduction.
//!
//! Raw shape read (all optional): `security_score` (or `score`), `verdict`,
//! `findings[] {title, description, severity}` with string severities,
//! `domains[]`, `urls[]`.
//!
//! Truncation: findings keep the top [`SIGNATURE_CAP`] by mapped severity
//! (high=3, warning/medium=2, info/low=1; stable on ties); domains then
//! URLs fill the network list up to [`NETWORK_CAP`], each first-N in the
//! engine's own order.

use serde_json::Value;

use crate::domain::{
    EngineKind, NetworkIndicator, NetworkIndicatorKind, NormalizedReport, SignatureRecord,
    VerdictHint, NETWORK_CAP,
};

use super::cap_signatures;

pub fn normalize(raw: &Value) -> NormalizedReport {
    let mut report = NormalizedReport::empty(EngineKind::StaticScan);

    report.verdict = VerdictHint {
        label: raw
            .get("verdict")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        family: None,
        score: raw
            .get("security_score")
            .or_else(|| raw.get("score"))
            .and_then(|s| s.as_f64()),
    };

    report.signatures = cap_signatures(collect_findings(raw));
    report.network = collect_network(raw);

    report
}

fn severity_rank(severity: Option<&str>) -> i64 {
    match severity.unwrap_or("") {
        "high" | "critical" => 3,
        "warning" | "medium" => 2,
        "info" | "low" => 1,
        _ => 0,
    }
}

fn collect_findings(raw: &Value) -> Vec<SignatureRecord> {
    raw.get("findings")
        .and_then(|f| f.as_array())
        .map(|findings| {
            findings
                .iter()
                .map(|finding| SignatureRecord {
                    name: finding
                        .get("title")
                        .or_else(|| finding.get("name"))
                        .and_then(|t| t.as_str())
                        .unwrap_or("unnamed")
                        .to_string(),
                    description: finding
                        .get("description")
                        .and_then(|d| d.as_str())
                        .unwrap_or_default()
                        .to_string(),
                    severity: severity_rank(
                        finding.get("severity").and_then(|s| s.as_str()),
                    ),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn collect_network(raw: &Value) -> Vec<NetworkIndicator> {
    let mut indicators = Vec::new();

    for (key, kind) in [
        ("domains", NetworkIndicatorKind::Dns),
        ("urls", NetworkIndicatorKind::Http),
    ] {
        if let Some(values) = raw.get(key).and_then(|v| v.as_array()) {
            for value in values {
                if indicators.len() >= NETWORK_CAP {
                    return indicators;
                }
                if let Some(value) = value.as_str() {
                    indicators.push(NetworkIndicator {
                        kind,
                        value: value.to_string(),
                        detail: None,
                    });
                }
            }
        }
    }

    indicators
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reduces_findings_by_severity() {
        let raw = json!({
            "security_score": 23.0,
            "verdict": "high risk",
            "findings": [
                {"title": "cleartext traffic", "severity": "warning", "description": "..."},
                {"title": "debug enabled", "severity": "info"},
                {"title": "exported component", "severity": "high"},
            ],
            "domains": ["tracker.example"],
            "urls": ["http://tracker.example/p"],
        });

        let report = normalize(&raw);
        assert_eq!(report.verdict.score, Some(23.0));
        assert_eq!(report.verdict.label.as_deref(), Some("high risk"));
        assert_eq!(report.signatures[0].name, "exported component");
        assert_eq!(report.network.len(), 2);
        assert_eq!(report.network[0].kind, NetworkIndicatorKind::Dns);
        assert!(report.within_bounds());
    }

    #[test]
    fn unknown_severity_strings_rank_lowest() {
        assert_eq!(severity_rank(Some("catastrophic")), 0);
        assert_eq!(severity_rank(None), 0);
        assert_eq!(severity_rank(Some("high")), 3);
    }
}
