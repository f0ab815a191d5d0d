//! The per-submission unit of work: reuse check, submit, poll to terminal.
//!
//! Exactly one driver task runs per stored submission; the manager's entry
//! locking guarantees it. The driver holds no lock across any remote
//! round-trip, and its only suspension points are the engine calls and the
//! inter-poll sleep, so it can be scheduled as an independent unit of
//! deferred work.

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::LifecycleSettings;
use crate::domain::{JobRef, SubmissionState};
use crate::engine::{EngineClient, EngineError, JobState};
use crate::normalize;

use super::SubmissionCell;

pub(crate) async fn drive(
    cell: Arc<SubmissionCell>,
    client: Arc<dyn EngineClient>,
    path: PathBuf,
    settings: LifecycleSettings,
) {
    let artifact = cell.snapshot().artifact;
    let engine = client.kind();
    let digest = artifact.short_digest().to_string();
    let start = tokio::time::Instant::now();

    // Cross-system reuse: has anyone, anywhere, already analyzed these
    // exact bytes at this engine? Only engines with an identity-search
    // capability can answer; a search failure is never fatal, it just
    // means we submit like the capability was absent.
    let mut adopted: Option<JobRef> = None;
    match client.search_by_identity(&artifact).await {
        Ok(Some(prior_refs)) => {
            if let Some(prior) = prior_refs.into_iter().next() {
                match client.poll_status(&prior).await {
                    Ok(JobState::Succeeded) => {
                        tracing::info!(%engine, %digest, job = %prior, "reusing prior engine-side result");
                        cell.set_job_ref(prior.clone());
                        match fetch_normalized(&cell, &client, &prior).await {
                            Ok(()) => {
                                cell.set_state(SubmissionState::Reused);
                                return;
                            }
                            Err(err) => {
                                // Prior job exists but its report is gone;
                                // fall through to a fresh submission.
                                tracing::warn!(%engine, %digest, "prior report unusable: {err}");
                            }
                        }
                    }
                    Ok(JobState::Pending) | Ok(JobState::Running) => {
                        // An earlier (possibly abandoned) submission is
                        // still in flight remotely. Attach to it instead of
                        // detonating the same bytes twice.
                        tracing::info!(%engine, %digest, job = %prior, "attaching to in-flight prior job");
                        adopted = Some(prior);
                    }
                    Ok(JobState::Failed(_)) | Err(_) => {}
                }
            }
        }
        Ok(None) => {}
        Err(err) => {
            tracing::warn!(%engine, %digest, "identity search failed, submitting fresh: {err}");
        }
    }

    let job_ref = match adopted {
        Some(job_ref) => {
            cell.set_job_ref(job_ref.clone());
            job_ref
        }
        None => match client.submit(&artifact, &path).await {
            Ok(job_ref) => {
                tracing::info!(%engine, %digest, job = %job_ref, "submitted");
                cell.set_job_ref(job_ref.clone());
                cell.set_state(SubmissionState::Submitted);
                job_ref
            }
            Err(err) => {
                tracing::warn!(%engine, %digest, "submit failed: {err}");
                cell.finish_with_error(SubmissionState::Failed, err.to_string());
                return;
            }
        },
    };

    cell.set_state(SubmissionState::Polling);

    loop {
        // Budget check first: a submission that has spent its budget is
        // timed out even if the very next poll would have succeeded.
        if start.elapsed() >= settings.timeout() {
            tracing::warn!(%engine, %digest, job = %job_ref, "polling budget exhausted, abandoning remote job");
            cell.finish_with_error(
                SubmissionState::TimedOut,
                format!("no terminal status within {}s", settings.timeout_secs),
            );
            return;
        }

        cell.touch_polled();
        match client.poll_status(&job_ref).await {
            Ok(JobState::Succeeded) => {
                match fetch_normalized(&cell, &client, &job_ref).await {
                    Ok(()) => cell.set_state(SubmissionState::Succeeded),
                    Err(err) => {
                        cell.finish_with_error(SubmissionState::Failed, err.to_string())
                    }
                }
                return;
            }
            Ok(JobState::Failed(reason)) => {
                tracing::warn!(%engine, %digest, job = %job_ref, "engine failed: {reason}");
                cell.finish_with_error(SubmissionState::Failed, reason);
                return;
            }
            Ok(JobState::Pending) | Ok(JobState::Running) => {}
            Err(err) if err.is_transient() => {
                // The client already retried; count this as a missed poll
                // and try again next interval within the same budget.
                tracing::warn!(%engine, %digest, job = %job_ref, "poll failed transiently: {err}");
            }
            Err(err) => {
                cell.finish_with_error(SubmissionState::Failed, err.to_string());
                return;
            }
        }

        tokio::time::sleep(settings.poll_interval()).await;
    }
}

/// Fetch the raw report and store its normalized reduction.
/// Normalization itself cannot fail; only the fetch can.
async fn fetch_normalized(
    cell: &SubmissionCell,
    client: &Arc<dyn EngineClient>,
    job_ref: &JobRef,
) -> Result<(), EngineError> {
    let raw = client.fetch_report(job_ref).await?;
    let report = normalize::normalize(client.kind(), &raw);
    // State is set by the caller: Reused and Succeeded share this path
    cell.set_report(report);
    Ok(())
}
