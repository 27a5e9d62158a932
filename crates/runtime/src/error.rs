//! Scheduler errors.
//!
//! Every error the core can raise is fatal for the run that raised it. The
//! scheduler never retries, skips or patches around a failure; it surfaces
//! the first one and stops dispatching work.
//!
//! # Error Categories
//!
//! - **Configuration errors**: [`Error::OrderingFrozen`], [`Error::OrderingNotFrozen`],
//!   [`Error::CycleDetected`], [`Error::UnreachablePhase`], [`Error::TimeOutOfRange`],
//!   [`Error::InvalidJob`], [`Error::InvalidConfig`]
//! - **Contract errors**: [`Error::ContractViolation`]
//! - **Collaborator errors**: [`Error::JobFailed`], [`Error::JobPanicked`]
//! - **Internal errors**: [`Error::MissingResult`], [`Error::DuplicateReady`],
//!   [`Error::Stalled`], [`Error::Internal`]
//!
//! Internal errors mean the scheduler's own bookkeeping disagrees with
//! itself. They are reported instead of panicking so the embedding
//! application decides how to die.

use thiserror::Error;

/// Scheduler result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Error returned by a job body.
///
/// The core does not interpret it; it is wrapped in [`Error::JobFailed`]
/// and aborts the run.
pub type JobFailure = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised while configuring or running a pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// A link was declared (or `freeze` called again) after the ordering was frozen.
    #[error("phase ordering is frozen: cannot {operation}")]
    OrderingFrozen {
        /// What the caller attempted.
        operation: String,
    },

    /// A dependency graph was built from an ordering that was never frozen.
    #[error("phase ordering must be frozen before building a dependency graph")]
    OrderingNotFrozen,

    /// The same-time (distance 0) links form a cycle.
    ///
    /// Jobs at the same chunk could never all become ready, so the ordering
    /// is rejected at freeze time.
    #[error("cycle detected in same-time links: {phases:?}")]
    CycleDetected {
        /// Phases that could not be placed in a topological order.
        phases: Vec<String>,
    },

    /// A non-entry phase has no same-time link from another phase.
    ///
    /// Jobs of such a phase would never be triggered at chunk 0.
    #[error("phase {phase} has no same-time predecessor and is not the entry phase")]
    UnreachablePhase {
        /// The phase without a distance 0 predecessor.
        phase: String,
    },

    /// A job identifier was requested outside `[0, number_chunks + 1]`.
    #[error("time {time} outside [0, {limit}]")]
    TimeOutOfRange {
        /// The requested time.
        time: isize,
        /// The largest admissible time.
        limit: usize,
    },

    /// The time is in range but the phase has no job there.
    #[error("no job for phase {phase} at time {time}")]
    InvalidJob {
        /// Phase of the requested identifier.
        phase: String,
        /// Time of the requested identifier.
        time: usize,
    },

    /// Run options are unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A job's arguments or result do not match its phase contract.
    #[error("contract violation in {job}: {detail}")]
    ContractViolation {
        /// The job whose contract failed.
        job: String,
        /// Which side of the contract failed.
        detail: String,
    },

    /// A job body returned an error.
    #[error("job {job} failed: {source}")]
    JobFailed {
        /// The failed job.
        job: String,
        /// The error reported by the job body.
        #[source]
        source: JobFailure,
    },

    /// A job body or its factory panicked.
    ///
    /// The panic is caught on the worker so the remaining workers can wind
    /// down; the run is aborted like any other job failure.
    #[error("job {job} panicked: {message}")]
    JobPanicked {
        /// The job that panicked.
        job: String,
        /// The panic payload, if it was a string.
        message: String,
    },

    /// A predecessor result was needed but is no longer retained.
    #[error("result of {predecessor} missing while assembling arguments for {job}")]
    MissingResult {
        /// The job being assembled.
        job: String,
        /// The predecessor whose result was not found.
        predecessor: String,
    },

    /// A job was enqueued twice.
    #[error("job {0} is already in the ready queue")]
    DuplicateReady(String),

    /// The run ended with jobs that never became ready.
    #[error("scheduler stalled with {pending} pending jobs (first: {first})")]
    Stalled {
        /// Number of jobs still waiting on predecessors.
        pending: usize,
        /// One of the stuck jobs.
        first: String,
    },

    /// Scheduler bookkeeping is inconsistent.
    #[error("internal scheduler error: {0}")]
    Internal(String),
}
