//! Normalized report types.
//!
//! Raw engine reports are unbounded (a sandbox run can produce megabytes of
//! behavioral logs). Everything here is size-bounded by construction: list
//! fields are capped at small constants and unbounded raw lists are reduced
//! to structured counts. The downstream summarizer's token cost is bounded
//! by these caps, so changing them changes real money.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::engine_kind::EngineKind;
use super::submission::{JobRef, SubmissionState};

/// Maximum signature/indicator records kept per report
pub const SIGNATURE_CAP: usize = 10;

/// Maximum network indicators kept per report
pub const NETWORK_CAP: usize = 10;

/// Maximum example entries kept per behavioral sample list
pub const SAMPLE_CAP: usize = 5;

/// Free-form verdict hints from one engine.
///
/// Deliberately not a fixed taxonomy: each engine speaks its own dialect
/// ("malscore 8.2", "Emotet", "34/70 vendors flagged") and the summarizer is
/// the component that reconciles them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerdictHint {
    /// Short human-readable label (e.g. "malicious", "suspicious")
    pub label: Option<String>,

    /// Malware family name, when the engine commits to one
    pub family: Option<String>,

    /// Engine-native numeric score, on whatever scale the engine uses
    pub score: Option<f64>,
}

/// One triggered signature or detection record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureRecord {
    /// Signature or detection name
    pub name: String,

    /// Engine-provided description, possibly empty
    pub description: String,

    /// Engine-native severity (0 when the engine does not rank)
    pub severity: i64,
}

/// Kind of a network indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkIndicatorKind {
    Host,
    Dns,
    Http,
}

/// One network indicator observed during analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkIndicator {
    pub kind: NetworkIndicatorKind,

    /// The contacted host, queried name, or requested URL
    pub value: String,

    /// Secondary detail (DNS answer, HTTP method + host, ...)
    pub detail: Option<String>,
}

/// Structured counts replacing raw unbounded behavioral lists
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BehaviorCounts {
    pub processes_spawned: usize,
    pub files_written: usize,
    pub registry_writes: usize,
    pub mutexes_created: usize,
    pub hosts_contacted: usize,
    pub dns_queries: usize,
    pub http_requests: usize,
}

/// Small example lists backing the counts, each capped at [`SAMPLE_CAP`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BehaviorSamples {
    pub processes: Vec<String>,
    pub files_written: Vec<String>,
    pub registry_keys: Vec<String>,
    pub mutexes: Vec<String>,
}

/// The reduced, size-bounded form of one engine's report.
///
/// Invariant: `signatures.len() <= SIGNATURE_CAP`,
/// `network.len() <= NETWORK_CAP`, and every sample list holds at most
/// [`SAMPLE_CAP`] entries, regardless of raw report size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedReport {
    /// Engine that produced the underlying raw report
    pub engine: EngineKind,

    /// Free-form verdict hints
    pub verdict: VerdictHint,

    /// Highest-value signature records, capped at [`SIGNATURE_CAP`]
    pub signatures: Vec<SignatureRecord>,

    /// Network indicators, capped at [`NETWORK_CAP`]
    pub network: Vec<NetworkIndicator>,

    /// Structured behavioral counts
    pub counts: BehaviorCounts,

    /// Capped behavioral examples
    pub samples: BehaviorSamples,
}

impl NormalizedReport {
    /// An empty report for an engine (also the degraded output for a raw
    /// report with no recognizable fields)
    pub fn empty(engine: EngineKind) -> Self {
        Self {
            engine,
            verdict: VerdictHint::default(),
            signatures: Vec::new(),
            network: Vec::new(),
            counts: BehaviorCounts::default(),
            samples: BehaviorSamples::default(),
        }
    }

    /// Check the size-bound invariant (used by tests and debug assertions)
    pub fn within_bounds(&self) -> bool {
        self.signatures.len() <= SIGNATURE_CAP
            && self.network.len() <= NETWORK_CAP
            && self.samples.processes.len() <= SAMPLE_CAP
            && self.samples.files_written.len() <= SAMPLE_CAP
            && self.samples.registry_keys.len() <= SAMPLE_CAP
            && self.samples.mutexes.len() <= SAMPLE_CAP
    }
}

/// Per-engine outcome of one analyzed artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineOutcome {
    /// Terminal (or, for progress snapshots, current) state
    pub state: SubmissionState,

    /// Remote job reference, when one exists
    pub job_ref: Option<JobRef>,

    /// Normalized report for Succeeded/Reused outcomes
    pub report: Option<NormalizedReport>,

    /// Error detail for Failed/TimedOut outcomes
    pub error: Option<String>,
}

/// The overall result of analyzing one artifact: the set of per-engine
/// outcomes, never collapsed into one boolean. A caller must be able to see
/// "sandbox timed out, reputation check succeeded".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtifactAnalysis {
    /// Primary digest of the analyzed artifact
    pub sha256: String,

    /// Outcome per selected engine (BTreeMap for deterministic ordering)
    pub outcomes: BTreeMap<EngineKind, EngineOutcome>,
}

impl ArtifactAnalysis {
    /// Complete only when every selected submission reached a terminal state
    pub fn is_complete(&self) -> bool {
        !self.outcomes.is_empty() && self.outcomes.values().all(|o| o.state.is_terminal())
    }

    /// The bounded mapping handed to the summarizer collaborator
    pub fn reports(&self) -> BTreeMap<EngineKind, &NormalizedReport> {
        self.outcomes
            .iter()
            .filter_map(|(kind, outcome)| outcome.report.as_ref().map(|r| (*kind, r)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_report_is_within_bounds() {
        for kind in EngineKind::ALL {
            assert!(NormalizedReport::empty(kind).within_bounds());
        }
    }

    #[test]
    fn analysis_completeness_requires_all_terminal() {
        let mut analysis = ArtifactAnalysis {
            sha256: "aa".repeat(32),
            ..Default::default()
        };
        assert!(!analysis.is_complete(), "no outcomes yet");

        analysis.outcomes.insert(
            EngineKind::Sandbox,
            EngineOutcome {
                state: SubmissionState::Polling,
                job_ref: None,
                report: None,
                error: None,
            },
        );
        analysis.outcomes.insert(
            EngineKind::Reputation,
            EngineOutcome {
                state: SubmissionState::Succeeded,
                job_ref: Some(JobRef::new("r-1")),
                report: Some(NormalizedReport::empty(EngineKind::Reputation)),
                error: None,
            },
        );
        assert!(!analysis.is_complete(), "sandbox is still polling");

        analysis
            .outcomes
            .get_mut(&EngineKind::Sandbox)
            .unwrap()
            .state = SubmissionState::TimedOut;
        assert!(analysis.is_complete());
        assert_eq!(analysis.reports().len(), 1, "only reputation has a report");
    }
}
