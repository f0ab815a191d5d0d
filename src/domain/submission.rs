//! Submission record and lifecycle states

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::artifact::ArtifactIdentity;
use super::engine_kind::EngineKind;
use super::report::NormalizedReport;

/// Unique identifier of a submission within this system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionId(uuid::Uuid);

impl SubmissionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for SubmissionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque engine-assigned reference to a remote analysis job
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobRef(String);

impl JobRef {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Dedup key for submissions: one artifact's work for one engine
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubmissionKey {
    /// Primary content digest of the artifact
    pub sha256: String,
    /// Engine the work was routed to
    pub engine: EngineKind,
}

impl SubmissionKey {
    pub fn new(sha256: impl Into<String>, engine: EngineKind) -> Self {
        Self {
            sha256: sha256.into(),
            engine,
        }
    }
}

impl std::fmt::Display for SubmissionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.engine, &self.sha256[..self.sha256.len().min(12)])
    }
}

/// The lifecycle state of a submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionState {
    /// Submission exists but no remote work has started
    Created,
    /// The engine accepted the artifact and assigned a job reference
    Submitted,
    /// The remote job is being polled at the configured interval
    Polling,
    /// Terminal: the remote job finished and its report was normalized
    Succeeded,
    /// Terminal: the engine reported a failure (no retry)
    Failed,
    /// Terminal: the polling budget was exhausted; the remote job is
    /// abandoned but not cancelled
    TimedOut,
    /// Terminal: a prior result for the same content was reused and no new
    /// remote work was started
    Reused,
}

impl SubmissionState {
    /// A terminal state permits no further automatic transition
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SubmissionState::Succeeded
                | SubmissionState::Failed
                | SubmissionState::TimedOut
                | SubmissionState::Reused
        )
    }

    /// Stable marker string used in logs and serialized output
    pub fn as_marker(&self) -> &'static str {
        match self {
            SubmissionState::Created => "created",
            SubmissionState::Submitted => "submitted",
            SubmissionState::Polling => "polling",
            SubmissionState::Succeeded => "succeeded",
            SubmissionState::Failed => "failed",
            SubmissionState::TimedOut => "timedout",
            SubmissionState::Reused => "reused",
        }
    }
}

impl std::fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_marker())
    }
}

/// One artifact's analysis work for one engine.
///
/// A submission is owned by the lifecycle manager for its entire life; no
/// other component mutates it. Once a terminal state is reached the record
/// never changes again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    /// Identifier of this submission within this system
    pub id: SubmissionId,

    /// Content identity of the artifact under analysis
    pub artifact: ArtifactIdentity,

    /// Engine this submission was routed to
    pub engine: EngineKind,

    /// Engine-assigned job reference, present once the remote job exists
    /// (or once a prior job was adopted for reuse)
    pub job_ref: Option<JobRef>,

    /// Current lifecycle state
    pub state: SubmissionState,

    /// When the submission was created
    pub created_at: DateTime<Utc>,

    /// When the remote job was last polled
    pub last_polled_at: Option<DateTime<Utc>>,

    /// Normalized terminal report (Succeeded and Reused only)
    pub report: Option<NormalizedReport>,

    /// Terminal error detail (Failed and TimedOut only)
    pub error: Option<String>,
}

impl Submission {
    pub fn new(artifact: ArtifactIdentity, engine: EngineKind) -> Self {
        Self {
            id: SubmissionId::new(),
            artifact,
            engine,
            job_ref: None,
            state: SubmissionState::Created,
            created_at: Utc::now(),
            last_polled_at: None,
            report: None,
            error: None,
        }
    }

    pub fn key(&self) -> SubmissionKey {
        SubmissionKey::new(self.artifact.sha256.clone(), self.engine)
    }

    /// Transition to a new state. Transitions out of a terminal state are
    /// ignored: terminal means terminal.
    pub fn set_state(&mut self, state: SubmissionState) {
        if self.state.is_terminal() {
            tracing::debug!(
                submission = %self.id,
                from = %self.state,
                to = %state,
                "ignoring transition out of terminal state"
            );
            return;
        }
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DeclaredType;

    fn identity() -> ArtifactIdentity {
        ArtifactIdentity {
            sha256: "ab".repeat(32),
            md5: "cd".repeat(16),
            length: 4,
            declared_type: DeclaredType::new("exe"),
        }
    }

    #[test]
    fn terminal_states_are_terminal() {
        assert!(SubmissionState::Succeeded.is_terminal());
        assert!(SubmissionState::Failed.is_terminal());
        assert!(SubmissionState::TimedOut.is_terminal());
        assert!(SubmissionState::Reused.is_terminal());
        assert!(!SubmissionState::Created.is_terminal());
        assert!(!SubmissionState::Submitted.is_terminal());
        assert!(!SubmissionState::Polling.is_terminal());
    }

    #[test]
    fn no_regression_from_terminal_state() {
        let mut sub = Submission::new(identity(), EngineKind::Sandbox);
        sub.set_state(SubmissionState::Submitted);
        sub.set_state(SubmissionState::Polling);
        sub.set_state(SubmissionState::Succeeded);
        assert_eq!(sub.state, SubmissionState::Succeeded);

        sub.set_state(SubmissionState::Polling);
        assert_eq!(
            sub.state,
            SubmissionState::Succeeded,
            "a terminal submission must never regress"
        );
        sub.set_state(SubmissionState::Failed);
        assert_eq!(sub.state, SubmissionState::Succeeded);
    }

    #[test]
    fn key_is_digest_plus_engine() {
        let sub = Submission::new(identity(), EngineKind::Reputation);
        let key = sub.key();
        assert_eq!(key.sha256, identity().sha256);
        assert_eq!(key.engine, EngineKind::Reputation);
    }
}
