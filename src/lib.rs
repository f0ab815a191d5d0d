//! malsieve - submission dedup and orchestration for malware analysis
//!
//! malsieve accepts untrusted files, computes a stable content identity for
//! each one, and routes unique files to one or more asynchronous analysis
//! backends (a detonation sandbox, a static analyzer, a reputation database).
//! Identical bytes are analyzed once per engine, ever: submissions are
//! deduplicated both within this process (the reuse index) and across
//! systems (engine-side identity search, where the backend supports it).
//!
//! ## Pipeline
//!
//! 1. **Identity**: a streaming hash pass produces an [`ArtifactIdentity`]
//!    without buffering the whole file.
//! 2. **Selection**: the declared type maps to a set of engines via a
//!    configurable table.
//! 3. **Lifecycle**: each (artifact, engine) pair becomes a [`Submission`]
//!    driven through submit → poll → fetch, with reuse short-circuits,
//!    a timeout budget, and no retry of fatal engine errors.
//! 4. **Normalization**: every raw engine report is reduced to a
//!    size-bounded [`NormalizedReport`] for the downstream summarizer.

pub mod config;
pub mod domain;
pub mod engine;
pub mod identity;
pub mod normalize;
pub mod submission;

pub use domain::*;
