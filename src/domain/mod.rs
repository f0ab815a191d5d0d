//! Core domain types

mod artifact;
mod engine_kind;
mod report;
mod submission;

pub use artifact::{ArtifactIdentity, DeclaredType};
pub use engine_kind::EngineKind;
pub use report::{
    ArtifactAnalysis, BehaviorCounts, BehaviorSamples, EngineOutcome, NetworkIndicator,
    NetworkIndicatorKind, NormalizedReport, SignatureRecord, VerdictHint, NETWORK_CAP,
    SAMPLE_CAP, SIGNATURE_CAP,
};
pub use submission::{JobRef, Submission, SubmissionId, SubmissionKey, SubmissionState};
