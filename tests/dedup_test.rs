//! Integration tests for dedup and reuse: the within-system reuse index,
//! the concurrent double-submit race, and engine-side identity search

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use malsieve::engine::JobState;
use malsieve::{EngineKind, JobRef, SubmissionState};

use common::{artifact, artifact_path, fast_lifecycle, manager_with, StubEngine};

/// Two concurrent uploads of identical bytes produce exactly one remote
/// submission; the second caller attaches to the first caller's work
#[tokio::test]
async fn concurrent_identical_uploads_submit_once() {
    let sandbox = Arc::new(
        StubEngine::new(EngineKind::Sandbox)
            .with_polls([JobState::Pending, JobState::Running, JobState::Succeeded]),
    );
    let manager = Arc::new(manager_with(&[sandbox.clone()], fast_lifecycle()));

    let sample = artifact(10);
    let path = artifact_path();
    let (first, second) = tokio::join!(
        manager.analyze(&sample, &path),
        manager.analyze(&sample, &path),
    );
    let first = first.unwrap();
    let second = second.unwrap();

    assert_eq!(
        sandbox.submit_calls.load(Ordering::SeqCst),
        1,
        "identical concurrent uploads must share one remote job"
    );
    for analysis in [&first, &second] {
        let outcome = &analysis.outcomes[&EngineKind::Sandbox];
        assert_eq!(outcome.state, SubmissionState::Succeeded);
        assert_eq!(outcome.job_ref.as_ref().unwrap().as_str(), "J1");
    }
}

/// A completed submission short-circuits later requests for the same bytes:
/// terminal state Reused, same report, zero additional remote calls
#[tokio::test]
async fn completed_submission_is_reused_without_remote_work() {
    let report = serde_json::json!({
        "malscore": 8.2,
        "malware_family": "Emotet",
        "signatures": [{"name": "injects_code", "description": "", "severity": 3}],
    });
    let sandbox = Arc::new(StubEngine::new(EngineKind::Sandbox).with_report(report));
    let manager = manager_with(&[sandbox.clone()], fast_lifecycle());
    let sample = artifact(11);

    let first = manager.analyze(&sample, &artifact_path()).await.unwrap();
    assert_eq!(
        first.outcomes[&EngineKind::Sandbox].state,
        SubmissionState::Succeeded
    );
    let calls_after_first = sandbox.remote_calls();

    let second = manager.analyze(&sample, &artifact_path()).await.unwrap();
    let reused = &second.outcomes[&EngineKind::Sandbox];
    assert_eq!(reused.state, SubmissionState::Reused);
    assert_eq!(
        reused.report, first.outcomes[&EngineKind::Sandbox].report,
        "the reused outcome must carry the original report"
    );
    assert_eq!(
        sandbox.remote_calls(),
        calls_after_first,
        "reuse must make zero remote calls"
    );
}

/// Different bytes never share a submission, even back to back
#[tokio::test]
async fn distinct_artifacts_each_submit() {
    let sandbox = Arc::new(StubEngine::new(EngineKind::Sandbox));
    let manager = manager_with(&[sandbox.clone()], fast_lifecycle());

    manager.analyze(&artifact(12), &artifact_path()).await.unwrap();
    manager.analyze(&artifact(13), &artifact_path()).await.unwrap();

    assert_eq!(sandbox.submit_calls.load(Ordering::SeqCst), 2);
}

/// A failed prior attempt does not poison the key: the next request for the
/// same bytes submits fresh
#[tokio::test]
async fn failed_prior_attempt_allows_resubmission() {
    let sandbox = Arc::new(
        StubEngine::new(EngineKind::Sandbox).with_polls([
            JobState::Failed("machine wedged".into()),
            JobState::Succeeded,
        ]),
    );
    let manager = manager_with(&[sandbox.clone()], fast_lifecycle());
    let sample = artifact(14);

    let first = manager.analyze(&sample, &artifact_path()).await.unwrap();
    assert_eq!(
        first.outcomes[&EngineKind::Sandbox].state,
        SubmissionState::Failed
    );

    let second = manager.analyze(&sample, &artifact_path()).await.unwrap();
    assert_eq!(
        second.outcomes[&EngineKind::Sandbox].state,
        SubmissionState::Succeeded
    );
    assert_eq!(
        sandbox.submit_calls.load(Ordering::SeqCst),
        2,
        "a failure must not block a fresh attempt"
    );
}

/// Engine-side identity search finds a completed prior job from another
/// system: adopt its report, never re-submit
#[tokio::test]
async fn engine_side_prior_result_is_adopted() {
    let sandbox = Arc::new(
        StubEngine::new(EngineKind::Sandbox)
            .with_search(vec![JobRef::new("OLD-7")])
            .with_report(serde_json::json!({"malscore": 6.0})),
    );
    let manager = manager_with(&[sandbox.clone()], fast_lifecycle());

    let analysis = manager.analyze(&artifact(15), &artifact_path()).await.unwrap();

    let outcome = &analysis.outcomes[&EngineKind::Sandbox];
    assert_eq!(outcome.state, SubmissionState::Reused);
    assert_eq!(outcome.job_ref.as_ref().unwrap().as_str(), "OLD-7");
    assert_eq!(outcome.report.as_ref().unwrap().verdict.score, Some(6.0));
    assert_eq!(sandbox.submit_calls.load(Ordering::SeqCst), 0);
    assert_eq!(sandbox.search_calls.load(Ordering::SeqCst), 1);
}

/// Identity search finds a still-running prior job (e.g. one an earlier
/// run abandoned): attach to it instead of detonating the bytes again
#[tokio::test]
async fn in_flight_engine_side_job_is_attached() {
    let sandbox = Arc::new(
        StubEngine::new(EngineKind::Sandbox)
            .with_search(vec![JobRef::new("OLD-8")])
            .with_polls([JobState::Running, JobState::Running, JobState::Succeeded]),
    );
    let manager = manager_with(&[sandbox.clone()], fast_lifecycle());

    let analysis = manager.analyze(&artifact(16), &artifact_path()).await.unwrap();

    let outcome = &analysis.outcomes[&EngineKind::Sandbox];
    assert_eq!(outcome.state, SubmissionState::Succeeded);
    assert_eq!(
        outcome.job_ref.as_ref().unwrap().as_str(),
        "OLD-8",
        "the adopted job ref must be the remote one"
    );
    assert_eq!(sandbox.submit_calls.load(Ordering::SeqCst), 0);
}

/// An empty search result means nothing to reuse: submit normally
#[tokio::test]
async fn empty_search_result_submits_fresh() {
    let sandbox = Arc::new(StubEngine::new(EngineKind::Sandbox).with_search(Vec::new()));
    let manager = manager_with(&[sandbox.clone()], fast_lifecycle());

    let analysis = manager.analyze(&artifact(17), &artifact_path()).await.unwrap();

    assert_eq!(
        analysis.outcomes[&EngineKind::Sandbox].state,
        SubmissionState::Succeeded
    );
    assert_eq!(sandbox.submit_calls.load(Ordering::SeqCst), 1);
}

/// Reuse is keyed per (digest, engine): a sandbox result for some bytes
/// says nothing about the reputation engine's view of the same bytes
#[tokio::test]
async fn reuse_is_scoped_to_one_engine() {
    let sandbox = Arc::new(StubEngine::new(EngineKind::Sandbox));
    let reputation = Arc::new(StubEngine::new(EngineKind::Reputation));
    let manager = manager_with(&[sandbox.clone(), reputation.clone()], fast_lifecycle());
    let sample = artifact(18);

    let first = manager.analyze(&sample, &artifact_path()).await.unwrap();
    assert!(first.is_complete());

    let second = manager.analyze(&sample, &artifact_path()).await.unwrap();
    assert_eq!(
        second.outcomes[&EngineKind::Sandbox].state,
        SubmissionState::Reused
    );
    assert_eq!(
        second.outcomes[&EngineKind::Reputation].state,
        SubmissionState::Reused
    );
    // One submit per engine, both from the first analysis
    assert_eq!(sandbox.submit_calls.load(Ordering::SeqCst), 1);
    assert_eq!(reputation.submit_calls.load(Ordering::SeqCst), 1);
}
