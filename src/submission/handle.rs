//! Shared submission state and its observer handle

use std::sync::{Arc, RwLock};

use chrono::Utc;
use tokio::sync::watch;

use crate::domain::{JobRef, NormalizedReport, Submission, SubmissionState};

/// The manager-owned, mutable side of one submission.
///
/// Mutations take a short write lock and never hold it across an await;
/// state changes are mirrored into a watch channel so observers see them
/// without touching the lock.
pub(crate) struct SubmissionCell {
    shared: Arc<RwLock<Submission>>,
    state_tx: watch::Sender<SubmissionState>,
}

impl SubmissionCell {
    pub fn new(submission: Submission) -> Arc<Self> {
        let (state_tx, _) = watch::channel(submission.state.clone());
        Arc::new(Self {
            shared: Arc::new(RwLock::new(submission)),
            state_tx,
        })
    }

    pub fn handle(self: &Arc<Self>) -> SubmissionHandle {
        SubmissionHandle {
            shared: self.shared.clone(),
            state_rx: self.state_tx.subscribe(),
        }
    }

    pub fn state(&self) -> SubmissionState {
        self.state_tx.borrow().clone()
    }

    pub fn snapshot(&self) -> Submission {
        self.shared.read().unwrap().clone()
    }

    /// Transition lifecycle state (terminal states are sticky, see
    /// [`Submission::set_state`])
    pub fn set_state(&self, state: SubmissionState) {
        let current = {
            let mut sub = self.shared.write().unwrap();
            sub.set_state(state);
            sub.state.clone()
        };
        self.state_tx.send_replace(current);
    }

    pub fn set_job_ref(&self, job_ref: JobRef) {
        self.shared.write().unwrap().job_ref = Some(job_ref);
    }

    pub fn touch_polled(&self) {
        self.shared.write().unwrap().last_polled_at = Some(Utc::now());
    }

    /// Record the normalized report; the caller transitions state
    pub fn set_report(&self, report: NormalizedReport) {
        self.shared.write().unwrap().report = Some(report);
    }

    /// Terminal failure: record the error detail, then transition
    pub fn finish_with_error(&self, state: SubmissionState, error: impl Into<String>) {
        {
            let mut sub = self.shared.write().unwrap();
            sub.error = Some(error.into());
        }
        self.set_state(state);
    }
}

/// Read-only view of one submission, cheap to clone.
///
/// Progress is independently observable per submission: a caller holding
/// handles for several engines can report "sandbox still polling,
/// reputation done" without waiting for either.
#[derive(Clone)]
pub struct SubmissionHandle {
    shared: Arc<RwLock<Submission>>,
    state_rx: watch::Receiver<SubmissionState>,
}

impl SubmissionHandle {
    /// Current lifecycle state, without locking the record
    pub fn state(&self) -> SubmissionState {
        self.state_rx.borrow().clone()
    }

    /// A point-in-time copy of the full record
    pub fn snapshot(&self) -> Submission {
        self.shared.read().unwrap().clone()
    }

    /// Wait until the submission reaches a terminal state, then return the
    /// final record. Returns immediately when already terminal.
    pub async fn wait_terminal(&self) -> Submission {
        let mut rx = self.state_rx.clone();
        // A dropped sender means the driver is gone; the snapshot is then
        // as final as this submission will ever get.
        let _ = rx.wait_for(|state| state.is_terminal()).await;
        self.snapshot()
    }
}
