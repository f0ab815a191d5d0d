//! Submission lifecycle management.
//!
//! One [`Submission`](crate::domain::Submission) tracks one artifact's work
//! at one engine. The manager owns every submission for its whole life and
//! is the only component that mutates one; everyone else observes through
//! read-only handles.

mod driver;
mod handle;
mod manager;

pub use handle::SubmissionHandle;
pub(crate) use handle::SubmissionCell;
pub use manager::{AnalyzeError, SubmissionManager};
