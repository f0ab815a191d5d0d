//! Submission manager: within-system dedup and per-engine orchestration.
//!
//! The manager owns the reuse index, the single piece of shared mutable
//! state in the whole core: a concurrent map from (digest, engine) to the
//! submission record. Index access goes through the map's entry API, which
//! serializes per key, so two concurrent uploads of identical bytes cannot
//! both decide "no prior result" and double-submit. Nothing is locked
//! across a remote round-trip.
//!
//! Reuse policy (one rule, applied per (digest, engine) key):
//! - a non-terminal submission is returned as-is, no new work;
//! - a prior Succeeded/Reused submission yields a Reused submission sharing
//!   its job ref and report, with zero remote calls;
//! - a prior Failed/TimedOut submission does not block a fresh attempt.

use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;

use crate::config::{Config, LifecycleSettings};
use crate::domain::{
    ArtifactAnalysis, ArtifactIdentity, DeclaredType, EngineKind, EngineOutcome, Submission,
    SubmissionKey, SubmissionState,
};
use crate::engine::{EngineRegistry, EngineSelector, Selection};

use super::{driver, SubmissionCell, SubmissionHandle};

/// Errors surfaced before any engine work starts
#[derive(Debug, Error)]
pub enum AnalyzeError {
    /// The declared type maps to no engine under the configured policy
    #[error("declared type '{0}' is not analyzable under the current policy")]
    UnsupportedType(DeclaredType),

    /// The selected engine has no configured client
    #[error("no client configured for engine {0}")]
    EngineUnavailable(EngineKind),
}

/// Orchestrates submissions across engines.
///
/// Construct once (from [`Config`] or parts) and share; all methods take
/// `&self` and are safe to call concurrently.
pub struct SubmissionManager {
    registry: EngineRegistry,
    selector: EngineSelector,
    lifecycle: LifecycleSettings,
    submissions: DashMap<SubmissionKey, Arc<SubmissionCell>>,
}

impl SubmissionManager {
    pub fn new(
        registry: EngineRegistry,
        selector: EngineSelector,
        lifecycle: LifecycleSettings,
    ) -> Self {
        Self {
            registry,
            selector,
            lifecycle,
            submissions: DashMap::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            EngineRegistry::from_config(config),
            config.selector.build(),
            config.lifecycle.clone(),
        )
    }

    /// Engines that would analyze this declared type
    pub fn select(&self, declared: &DeclaredType) -> Selection {
        self.selector.select(declared)
    }

    /// Analyze one artifact across all selected engines, waiting until every
    /// submission reaches a terminal state. Per-engine failures never abort
    /// sibling engines; each shows up as its own outcome.
    pub async fn analyze(
        &self,
        artifact: &ArtifactIdentity,
        path: &Path,
    ) -> Result<ArtifactAnalysis, AnalyzeError> {
        let engines = match self.selector.select(&artifact.declared_type) {
            Selection::Engines(set) => set,
            Selection::Unsupported => {
                return Err(AnalyzeError::UnsupportedType(artifact.declared_type.clone()))
            }
        };

        let mut waiters = Vec::new();
        let mut unavailable = Vec::new();
        for engine in engines {
            match self.get_or_submit(artifact, engine, path) {
                Ok(handle) => waiters.push(async move { (engine, handle.wait_terminal().await) }),
                Err(err) => {
                    tracing::warn!(%engine, "skipping engine: {err}");
                    unavailable.push(engine);
                }
            }
        }

        let mut analysis = ArtifactAnalysis {
            sha256: artifact.sha256.clone(),
            ..Default::default()
        };
        for engine in unavailable {
            analysis.outcomes.insert(
                engine,
                EngineOutcome {
                    state: SubmissionState::Failed,
                    job_ref: None,
                    report: None,
                    error: Some(format!("no client configured for engine {engine}")),
                },
            );
        }
        for (engine, submission) in futures::future::join_all(waiters).await {
            analysis.outcomes.insert(engine, outcome_of(&submission));
        }

        Ok(analysis)
    }

    /// Get the live submission for an (artifact, engine) pair, creating and
    /// driving a new one only when the reuse policy demands it.
    pub fn get_or_submit(
        &self,
        artifact: &ArtifactIdentity,
        engine: EngineKind,
        path: &Path,
    ) -> Result<SubmissionHandle, AnalyzeError> {
        let client = self
            .registry
            .get(engine)
            .ok_or(AnalyzeError::EngineUnavailable(engine))?;
        let key = SubmissionKey::new(artifact.sha256.clone(), engine);

        enum Plan {
            /// An equivalent submission already runs (or just ran)
            Attach(SubmissionHandle),
            /// A prior success is reused without remote work
            Reuse(Submission),
            /// This caller won the entry race and must drive
            Drive(Arc<SubmissionCell>, SubmissionHandle),
        }

        // The entry API serializes per key: exactly one caller can install
        // a fresh cell, so exactly one driver task exists per stored
        // submission. No remote call happens while the shard is held.
        let plan = match self.submissions.entry(key.clone()) {
            dashmap::mapref::entry::Entry::Occupied(mut occupied) => {
                let existing = occupied.get().clone();
                let state = existing.state();
                if !state.is_terminal() {
                    tracing::debug!(key = %key, %state, "suppressing duplicate submission");
                    Plan::Attach(existing.handle())
                } else if matches!(state, SubmissionState::Succeeded | SubmissionState::Reused) {
                    Plan::Reuse(existing.snapshot())
                } else {
                    // Failed or TimedOut: a fresh attempt replaces it
                    let fresh = SubmissionCell::new(Submission::new(artifact.clone(), engine));
                    let handle = fresh.handle();
                    occupied.insert(fresh.clone());
                    Plan::Drive(fresh, handle)
                }
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                let fresh = SubmissionCell::new(Submission::new(artifact.clone(), engine));
                let handle = fresh.handle();
                vacant.insert(fresh.clone());
                Plan::Drive(fresh, handle)
            }
        };

        match plan {
            Plan::Attach(handle) => Ok(handle),
            Plan::Reuse(prior) => {
                tracing::info!(key = %key, "reusing prior in-system result");
                let mut reused = Submission::new(artifact.clone(), engine);
                reused.job_ref = prior.job_ref;
                reused.report = prior.report;
                reused.state = SubmissionState::Reused;
                Ok(SubmissionCell::new(reused).handle())
            }
            Plan::Drive(cell, handle) => {
                tokio::spawn(driver::drive(
                    cell,
                    client,
                    path.to_path_buf(),
                    self.lifecycle.clone(),
                ));
                Ok(handle)
            }
        }
    }

    /// Point-in-time progress for one artifact: the current (possibly
    /// non-terminal) outcome per selected engine. Engines with no
    /// submission yet are simply absent.
    pub fn progress(&self, artifact: &ArtifactIdentity) -> ArtifactAnalysis {
        let mut analysis = ArtifactAnalysis {
            sha256: artifact.sha256.clone(),
            ..Default::default()
        };
        for engine in EngineKind::ALL {
            let key = SubmissionKey::new(artifact.sha256.clone(), engine);
            if let Some(cell) = self.submissions.get(&key) {
                analysis
                    .outcomes
                    .insert(engine, outcome_of(&cell.snapshot()));
            }
        }
        analysis
    }
}

fn outcome_of(submission: &Submission) -> EngineOutcome {
    EngineOutcome {
        state: submission.state.clone(),
        job_ref: submission.job_ref.clone(),
        report: submission.report.clone(),
        error: submission.error.clone(),
    }
}
