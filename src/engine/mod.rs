//! Engine clients: the uniform contract over heterogeneous analysis backends.
//!
//! Each backend (detonation sandbox, static analyzer, reputation database)
//! is an opaque capability provider reached over request/response HTTP. All
//! of them implement the same [`EngineClient`] contract: submit an artifact,
//! poll the resulting job, fetch its report once finished, and - where the
//! backend supports it - search for prior jobs by content digest.
//!
//! # Idempotency
//!
//! Remote engines do NOT deduplicate submissions. The lifecycle manager is
//! responsible for never calling [`EngineClient::submit`] twice for one
//! logical submission; the clients here make no such guarantee.

pub mod http;
mod registry;
mod reputation;
mod sandbox;
mod selector;
mod static_scan;

pub use registry::EngineRegistry;
pub use reputation::ReputationClient;
pub use sandbox::SandboxClient;
pub use selector::{EngineSelector, Fallback, Selection};
pub use static_scan::StaticScanClient;

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

use crate::domain::{ArtifactIdentity, EngineKind, JobRef};

/// A raw, engine-shaped report. The shape varies across backends and across
/// versions of the same backend; nothing downstream may assume any field
/// exists.
pub type RawReport = serde_json::Value;

/// Errors surfaced by engine clients
#[derive(Debug, Error)]
pub enum EngineError {
    /// Network failure or 5xx from the backend. Retried a bounded number of
    /// times at the client layer only, never higher up.
    #[error("transient engine error: {0}")]
    Transient(String),

    /// Authentication or authorization failure. Fatal, not retryable.
    #[error("engine rejected credentials: {0}")]
    Auth(String),

    /// The engine refused the artifact itself (wrong type, too large, ...).
    /// Fatal for this submission, not retryable.
    #[error("engine rejected artifact: {0}")]
    Rejected(String),

    /// The backend answered with a shape this client cannot read
    #[error("malformed engine response: {0}")]
    Protocol(String),
}

impl EngineError {
    /// Only transient errors qualify for the client-layer retry loop
    pub fn is_transient(&self) -> bool {
        matches!(self, EngineError::Transient(_))
    }
}

/// Remote job status as observed by a single poll round-trip
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    /// Queued on the engine, not yet running
    Pending,
    /// Analysis in progress
    Running,
    /// Finished; the report can now be fetched
    Succeeded,
    /// The engine gave up, with its stated reason
    Failed(String),
}

/// The uniform contract every analysis backend implements.
///
/// `poll_status` must be safe to call repeatedly: each call is one remote
/// round-trip with no side effects on the remote job. `fetch_report` is only
/// valid after `poll_status` returned [`JobState::Succeeded`].
#[async_trait]
pub trait EngineClient: Send + Sync {
    /// Which engine this client speaks to
    fn kind(&self) -> EngineKind;

    /// Submit an artifact for analysis, returning the engine-assigned job
    /// reference. Not idempotent on the remote side.
    async fn submit(&self, artifact: &ArtifactIdentity, path: &Path)
        -> Result<JobRef, EngineError>;

    /// One status round-trip for a remote job
    async fn poll_status(&self, job: &JobRef) -> Result<JobState, EngineError>;

    /// Fetch the raw report of a succeeded job
    async fn fetch_report(&self, job: &JobRef) -> Result<RawReport, EngineError>;

    /// Search for prior jobs covering the same content, newest first.
    ///
    /// Optional capability: the default returns `Ok(None)`, meaning the
    /// backend cannot search by digest and the lifecycle manager must skip
    /// the cross-system reuse check and always submit.
    async fn search_by_identity(
        &self,
        _artifact: &ArtifactIdentity,
    ) -> Result<Option<Vec<JobRef>>, EngineError> {
        Ok(None)
    }
}
