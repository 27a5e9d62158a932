//! The executable unit and its boundary with pipeline code.
//!
//! Pipeline-specific work lives entirely behind three traits:
//!
//! - [`JobFactory`] builds a [`Job`] from an identifier and its arguments
//! - [`Job`] runs and yields an optional [`JobResult`]
//! - [`Contract`] states, per phase, what arguments and results look like
//!
//! The scheduler checks both sides of the contract around every job. A
//! violation is a wiring bug between phases, never a data problem, so it
//! aborts the run.

use std::fmt;
use std::sync::Arc;

use crate::error::JobFailure;
use crate::types::{JobId, Phase};

/// Output of one finished job: a fixed-length tuple of pipeline values.
///
/// `V` is the pipeline's value type, normally an enum with one variant per
/// kind of payload the phases exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct JobResult<V> {
    values: Vec<V>,
}

impl<V> JobResult<V> {
    /// Wrap the values produced by a job.
    pub fn new(values: Vec<V>) -> Self {
        Self { values }
    }

    /// Result holding a single value.
    pub fn single(value: V) -> Self {
        Self {
            values: vec![value],
        }
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if the result holds no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at position `index`.
    pub fn result(&self, index: usize) -> Option<&V> {
        self.values.get(index)
    }

    /// Iterate over the values in order.
    pub fn iter(&self) -> std::slice::Iter<'_, V> {
        self.values.iter()
    }

    /// Take the values out.
    pub fn into_values(self) -> Vec<V> {
        self.values
    }
}

impl<V: fmt::Display> fmt::Display for JobResult<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (index, value) in self.values.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{value}")?;
        }
        f.write_str("]")
    }
}

/// Arguments handed to a job.
///
/// Position `i` matches the `i`-th incoming link of the job's phase.
/// `None` means the predecessor lies outside the horizon or produced
/// nothing.
pub type Arguments<V> = Vec<Option<Arc<JobResult<V>>>>;

/// One unit of work, ready to run.
pub trait Job<V>: Send {
    /// Label used in logs and errors.
    fn label(&self) -> String;

    /// Execute the job.
    ///
    /// Sink phases may return `Ok(None)`; their only effect is whatever
    /// they write to shared sinks held by the factory.
    fn run(self: Box<Self>) -> Result<Option<JobResult<V>>, JobFailure>;
}

/// Builds jobs for the scheduler.
///
/// The factory is shared by every worker. State that outlives a single job
/// (an output buffer written by a sink phase, say) belongs here behind its
/// own lock; jobs borrow it for their lifetime.
pub trait JobFactory<P: Phase, V>: Sync {
    /// Build the job for `id` from its resolved arguments.
    fn create(&self, id: JobId<P>, arguments: Arguments<V>) -> Box<dyn Job<V> + '_>;
}

/// Per-phase shape rules for arguments and results.
///
/// Implement it on the phase enum with one `match` arm per phase.
pub trait Contract<V> {
    /// Are these arguments well formed for this phase?
    fn valid_arguments(&self, arguments: &[Option<Arc<JobResult<V>>>]) -> bool;

    /// Is this a well formed output for this phase?
    fn valid_result(&self, result: Option<&JobResult<V>>) -> bool;
}

/// True if `argument` is absent or holds exactly one value accepted by
/// `shape`.
///
/// Covers the common "null or a single payload of kind X" argument rule.
pub fn absent_or_single<V>(argument: &Option<Arc<JobResult<V>>>, shape: impl Fn(&V) -> bool) -> bool {
    match argument {
        None => true,
        Some(result) => result.len() == 1 && result.result(0).is_some_and(shape),
    }
}
