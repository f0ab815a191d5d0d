//! Shared test fixtures: scripted stub engines and manager construction

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use malsieve::config::LifecycleSettings;
use malsieve::engine::{
    EngineClient, EngineError, EngineRegistry, EngineSelector, Fallback, JobState,
};
use malsieve::submission::SubmissionManager;
use malsieve::{ArtifactIdentity, DeclaredType, EngineKind, JobRef};

/// A scripted engine backend.
///
/// Polls consume the script front to back; once the script is empty the
/// last entry repeats forever (an always-Running stub is just `[Running]`).
/// Every remote call is counted so tests can assert exactly how much remote
/// work happened.
pub struct StubEngine {
    kind: EngineKind,
    poll_script: Mutex<VecDeque<JobState>>,
    last_poll: Mutex<JobState>,
    report: serde_json::Value,
    /// None = identity search unsupported; Some(refs) = supported
    search_result: Option<Vec<JobRef>>,
    /// When set, submit fails fatally with this message
    reject_submit: Option<String>,

    pub submit_calls: AtomicUsize,
    pub poll_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
    pub search_calls: AtomicUsize,
}

impl StubEngine {
    pub fn new(kind: EngineKind) -> Self {
        Self {
            kind,
            poll_script: Mutex::new(VecDeque::from([JobState::Succeeded])),
            last_poll: Mutex::new(JobState::Succeeded),
            report: serde_json::json!({}),
            search_result: None,
            reject_submit: None,
            submit_calls: AtomicUsize::new(0),
            poll_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
            search_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_polls(mut self, polls: impl IntoIterator<Item = JobState>) -> Self {
        let script: VecDeque<_> = polls.into_iter().collect();
        if let Some(last) = script.back() {
            self.last_poll = Mutex::new(last.clone());
        }
        self.poll_script = Mutex::new(script);
        self
    }

    pub fn with_report(mut self, report: serde_json::Value) -> Self {
        self.report = report;
        self
    }

    pub fn with_search(mut self, refs: Vec<JobRef>) -> Self {
        self.search_result = Some(refs);
        self
    }

    pub fn with_rejected_submit(mut self, reason: &str) -> Self {
        self.reject_submit = Some(reason.to_string());
        self
    }

    pub fn remote_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
            + self.poll_calls.load(Ordering::SeqCst)
            + self.fetch_calls.load(Ordering::SeqCst)
            + self.search_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EngineClient for StubEngine {
    fn kind(&self) -> EngineKind {
        self.kind
    }

    async fn submit(
        &self,
        _artifact: &ArtifactIdentity,
        _path: &Path,
    ) -> Result<JobRef, EngineError> {
        let n = self.submit_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(reason) = &self.reject_submit {
            return Err(EngineError::Rejected(reason.clone()));
        }
        Ok(JobRef::new(format!("J{n}")))
    }

    async fn poll_status(&self, _job: &JobRef) -> Result<JobState, EngineError> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);
        let mut script = self.poll_script.lock().unwrap();
        match script.pop_front() {
            Some(state) => Ok(state),
            None => Ok(self.last_poll.lock().unwrap().clone()),
        }
    }

    async fn fetch_report(&self, _job: &JobRef) -> Result<serde_json::Value, EngineError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.report.clone())
    }

    async fn search_by_identity(
        &self,
        _artifact: &ArtifactIdentity,
    ) -> Result<Option<Vec<JobRef>>, EngineError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.search_result.clone())
    }
}

/// A selector routing "exe" to exactly the given engines, nothing else
pub fn selector_for(engines: &[EngineKind]) -> EngineSelector {
    EngineSelector::new(
        BTreeMap::from([("exe".to_string(), engines.iter().copied().collect::<BTreeSet<_>>())]),
        Fallback::Unsupported,
    )
}

/// Fast lifecycle settings so tests never sit in real sleeps for long
pub fn fast_lifecycle() -> LifecycleSettings {
    LifecycleSettings {
        poll_interval_ms: 10,
        timeout_secs: 30,
    }
}

/// Build a manager over the given stubs with an "exe" → stubs selector
pub fn manager_with(
    stubs: &[Arc<StubEngine>],
    lifecycle: LifecycleSettings,
) -> SubmissionManager {
    let mut registry = EngineRegistry::new();
    let kinds: Vec<_> = stubs.iter().map(|s| s.kind()).collect();
    for stub in stubs {
        registry.register(stub.clone());
    }
    SubmissionManager::new(registry, selector_for(&kinds), lifecycle)
}

/// An artifact identity with a unique digest per `seed`
pub fn artifact(seed: u8) -> ArtifactIdentity {
    ArtifactIdentity {
        sha256: format!("{:02x}", seed).repeat(32),
        md5: format!("{:02x}", seed).repeat(16),
        length: 1024,
        declared_type: DeclaredType::new("exe"),
    }
}

/// Somewhere for stubs to pretend the artifact lives
pub fn artifact_path() -> PathBuf {
    PathBuf::from("/nonexistent/sample.exe")
}
