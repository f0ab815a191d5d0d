//! Sandbox (CAPE-style) report reduction.
//!
//! Raw shape read (all optional): `malscore`, `malware_family`,
//! `signatures[] {name, description, severity}`, `network.hosts[] {ip}`,
//! `network.dns[] {request, answers[]}`, `network.http[] {uri, method,
//! host}`, `behavior.summary.{processes, files, keys, mutexes}`.
//!
//! Truncation: signatures keep the top [`SIGNATURE_CAP`] by descending
//! severity (stable on ties); network indicators fill hosts, then DNS, then
//! HTTP, each in the engine's own order, up to [`NETWORK_CAP`] total;
//! behavioral samples are first-[`SAMPLE_CAP`] with full counts kept beside
//! them.

use serde_json::Value;

use crate::domain::{
    BehaviorCounts, BehaviorSamples, NetworkIndicator, NetworkIndicatorKind, NormalizedReport,
    SignatureRecord, VerdictHint, EngineKind, NETWORK_CAP, SAMPLE_CAP, SIGNATURE_CAP,
};

use super::{array_len, cap_signatures, string_samples};

pub fn normalize(raw: &Value) -> NormalizedReport {
    let mut report = NormalizedReport::empty(EngineKind::Sandbox);

    report.verdict = VerdictHint {
        label: None,
        family: raw
            .get("malware_family")
            .and_then(|f| f.as_str())
            .filter(|f| !f.is_empty())
            .map(str::to_string),
        score: raw.get("malscore").and_then(|s| s.as_f64()),
    };

    report.signatures = cap_signatures(collect_signatures(raw));
    report.network = collect_network(raw.get("network"));

    let summary = raw.get("behavior").and_then(|b| b.get("summary"));
    let network = raw.get("network");
    report.counts = BehaviorCounts {
        processes_spawned: array_len(summary.and_then(|s| s.get("processes"))),
        files_written: array_len(summary.and_then(|s| s.get("files"))),
        registry_writes: array_len(summary.and_then(|s| s.get("keys"))),
        mutexes_created: array_len(summary.and_then(|s| s.get("mutexes"))),
        hosts_contacted: array_len(network.and_then(|n| n.get("hosts"))),
        dns_queries: array_len(network.and_then(|n| n.get("dns"))),
        http_requests: array_len(network.and_then(|n| n.get("http"))),
    };
    report.samples = BehaviorSamples {
        processes: string_samples(summary.and_then(|s| s.get("processes")), SAMPLE_CAP),
        files_written: string_samples(summary.and_then(|s| s.get("files")), SAMPLE_CAP),
        registry_keys: string_samples(summary.and_then(|s| s.get("keys")), SAMPLE_CAP),
        mutexes: string_samples(summary.and_then(|s| s.get("mutexes")), SAMPLE_CAP),
    };

    report
}

fn collect_signatures(raw: &Value) -> Vec<SignatureRecord> {
    raw.get("signatures")
        .and_then(|s| s.as_array())
        .map(|sigs| {
            sigs.iter()
                .map(|sig| SignatureRecord {
                    name: sig
                        .get("name")
                        .and_then(|n| n.as_str())
                        .unwrap_or("unnamed")
                        .to_string(),
                    description: sig
                        .get("description")
                        .and_then(|d| d.as_str())
                        .unwrap_or_default()
                        .to_string(),
                    severity: sig.get("severity").and_then(|s| s.as_i64()).unwrap_or(0),
                })
                // Pre-trim far upstream of the cap so a hostile million-entry
                // report does not get fully sorted
                .take(SIGNATURE_CAP * 50)
                .collect()
        })
        .unwrap_or_default()
}

fn collect_network(network: Option<&Value>) -> Vec<NetworkIndicator> {
    let mut indicators = Vec::new();
    let Some(network) = network else {
        return indicators;
    };

    if let Some(hosts) = network.get("hosts").and_then(|h| h.as_array()) {
        for host in hosts {
            if indicators.len() >= NETWORK_CAP {
                return indicators;
            }
            let value = host
                .get("ip")
                .and_then(|ip| ip.as_str())
                .or_else(|| host.as_str());
            if let Some(value) = value {
                indicators.push(NetworkIndicator {
                    kind: NetworkIndicatorKind::Host,
                    value: value.to_string(),
                    detail: host
                        .get("country_name")
                        .and_then(|c| c.as_str())
                        .map(str::to_string),
                });
            }
        }
    }

    if let Some(queries) = network.get("dns").and_then(|d| d.as_array()) {
        for query in queries {
            if indicators.len() >= NETWORK_CAP {
                return indicators;
            }
            if let Some(request) = query.get("request").and_then(|r| r.as_str()) {
                let answer = query
                    .get("answers")
                    .and_then(|a| a.as_array())
                    .and_then(|a| a.first())
                    .and_then(|a| a.get("data"))
                    .and_then(|d| d.as_str());
                indicators.push(NetworkIndicator {
                    kind: NetworkIndicatorKind::Dns,
                    value: request.to_string(),
                    detail: answer.map(str::to_string),
                });
            }
        }
    }

    if let Some(requests) = network.get("http").and_then(|h| h.as_array()) {
        for request in requests {
            if indicators.len() >= NETWORK_CAP {
                return indicators;
            }
            if let Some(uri) = request.get("uri").and_then(|u| u.as_str()) {
                let method = request.get("method").and_then(|m| m.as_str()).unwrap_or("GET");
                let host = request.get("host").and_then(|h| h.as_str()).unwrap_or("");
                indicators.push(NetworkIndicator {
                    kind: NetworkIndicatorKind::Http,
                    value: uri.to_string(),
                    detail: Some(format!("{method} {host}")),
                });
            }
        }
    }

    indicators
}
