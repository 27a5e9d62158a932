//! Scheduler bookkeeping shared by every worker.
//!
//! All of it lives behind one lock. Workers only ever touch it through the
//! three steps below, each of which runs to completion while the lock is
//! held:
//!
//! - [`State::admit`] feeds entry jobs through the gate
//! - [`State::dispatch`] pops a ready job and resolves its arguments
//! - [`State::complete`] records a result and wakes successors

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, trace};

use crate::dag::Dependencies;
use crate::error::{Error, Result};
use crate::job::{Arguments, Contract, JobResult};
use crate::look_ahead::LookAhead;
use crate::ready_queue::ReadyQueue;
use crate::statistics::{JobStatistics, StatisticsSink};
use crate::storage::{PendingJobs, ResultStore};
use crate::types::{JobId, Phase};

use super::run::RunState;

/// What a worker brings back from running a job.
///
/// A failed or panicking job arrives as [`Error::JobFailed`] or
/// [`Error::JobPanicked`].
pub(super) struct Outcome<V> {
    pub result: Result<Option<JobResult<V>>>,
    pub elapsed: Duration,
}

/// Statistics sink supplied by the caller.
pub(super) type ExternalSink<'s, P> = &'s mut (dyn StatisticsSink<P> + Send);

pub(super) struct State<'s, P: Phase, V> {
    pub dependencies: Dependencies<P>,
    pub gate: LookAhead,
    pub ready: ReadyQueue<P>,
    pub pending: PendingJobs<P>,
    pub results: ResultStore<P, V>,
    pub statistics: JobStatistics<P>,
    pub sink: Option<ExternalSink<'s, P>>,
    pub run_state: RunState,
    pub running: usize,
    pub completed: usize,
    pub max_ready: usize,
    pub failure: Option<Error>,
}

impl<'s, P, V> State<'s, P, V>
where
    P: Phase + Contract<V>,
{
    pub fn new(
        dependencies: Dependencies<P>,
        look_ahead: usize,
        sink: Option<ExternalSink<'s, P>>,
    ) -> Result<Self> {
        let gate = LookAhead::new(look_ahead, dependencies.delta())?;
        Ok(Self {
            dependencies,
            gate,
            ready: ReadyQueue::new(),
            pending: PendingJobs::default(),
            results: ResultStore::default(),
            statistics: JobStatistics::default(),
            sink,
            run_state: RunState::Idle,
            running: 0,
            completed: 0,
            max_ready: 0,
            failure: None,
        })
    }

    pub fn transition(&mut self, next: RunState) {
        if self.run_state != next {
            info!(from = %self.run_state, to = %next, "run state changed");
            self.run_state = next;
        }
    }

    /// Whether workers should stop picking up work.
    pub fn is_stopped(&self) -> bool {
        self.failure.is_some() || self.run_state == RunState::Done
    }

    /// Keep the first error; later ones are consequences of it.
    pub fn fail(&mut self, err: Error) {
        if self.failure.is_none() {
            error!(error = %err, "run aborted");
            self.failure = Some(err);
        }
        self.transition(RunState::Done);
    }

    /// Admit every entry job the gate currently allows.
    pub fn admit(&mut self) -> Result<()> {
        while let Some(id) = self.dependencies.next(&self.gate) {
            self.gate.admitted(id.time());
            debug!(job = %id, lowest = self.gate.lowest(), "entry job admitted");
            self.satisfy(id)?;
        }
        if self.dependencies.is_exhausted() && self.run_state == RunState::Admitting {
            self.transition(RunState::Draining);
        }
        Ok(())
    }

    /// Record one satisfied dependency of `id`, creating its counter on
    /// first touch, and queue it once nothing is outstanding.
    ///
    /// Entry jobs carry one extra dependency standing for their admission,
    /// so predecessors finishing early cannot make them ready before the
    /// gate has let their chunk in.
    fn satisfy(&mut self, id: JobId<P>) -> Result<()> {
        if !self.pending.contains(&id) {
            let predecessors = self
                .dependencies
                .from(&id)
                .iter()
                .filter(|predecessor| predecessor.is_some())
                .count();
            let admission = usize::from(id.phase() == self.dependencies.ordering().entry());
            self.pending.insert(id, predecessors + admission);
            self.gate.open(id.time())?;
        }

        if self.pending.satisfy(&id)? {
            if !self.ready.add(id) {
                return Err(Error::DuplicateReady(id.to_string()));
            }
            self.max_ready = self.max_ready.max(self.ready.len());
            trace!(job = %id, "job ready");
        }
        Ok(())
    }

    /// Pop the next ready job the gate allows and resolve its arguments.
    pub fn dispatch(&mut self) -> Result<Option<(JobId<P>, Arguments<V>)>> {
        let Some(id) = self.ready.next(&self.gate) else {
            return Ok(None);
        };

        let mut arguments = Vec::new();
        for predecessor in self.dependencies.from(&id) {
            let argument = match predecessor {
                Some(predecessor) => self.results.take(&predecessor, &id)?,
                None => None,
            };
            arguments.push(argument);
        }
        if !id.phase().valid_arguments(&arguments) {
            return Err(Error::ContractViolation {
                job: id.to_string(),
                detail: format!("arguments {} rejected", describe(&arguments)),
            });
        }

        self.running += 1;
        trace!(job = %id, running = self.running, "job dispatched");
        Ok(Some((id, arguments)))
    }

    /// Record the outcome of a job that ran outside the lock.
    ///
    /// Successors are registered before the job is closed in the gate, so
    /// the oldest open chunk can only move forward.
    pub fn complete(&mut self, id: JobId<P>, outcome: Outcome<V>) -> Result<()> {
        self.running -= 1;
        let result = outcome.result?;
        if !id.phase().valid_result(result.as_ref()) {
            return Err(Error::ContractViolation {
                job: id.to_string(),
                detail: match &result {
                    Some(result) => format!("result with {} values rejected", result.len()),
                    None => "missing result".to_string(),
                },
            });
        }

        let elapsed_nanos = u64::try_from(outcome.elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.statistics.increment(&id, elapsed_nanos);
        if let Some(sink) = self.sink.as_deref_mut() {
            sink.increment(&id, elapsed_nanos);
        }

        let successors = self.dependencies.to(&id);
        self.results.insert(id, result.map(Arc::new), successors.len());
        for successor in successors {
            self.satisfy(successor)?;
        }
        self.gate.close(id.time())?;
        self.completed += 1;
        trace!(job = %id, completed = self.completed, "job completed");
        Ok(())
    }

    /// True when no worker can ever find more work.
    pub fn is_drained(&self) -> bool {
        self.dependencies.is_exhausted() && self.running == 0 && self.ready.is_empty()
    }

    /// Check that a drained run left nothing behind.
    pub fn verify_drained(&self) -> Result<()> {
        if let Some(first) = self.pending.first() {
            return Err(Error::Stalled {
                pending: self.pending.len(),
                first: first.to_string(),
            });
        }
        if !self.results.is_empty() {
            return Err(Error::Internal(format!(
                "{} results retained after the run drained",
                self.results.len()
            )));
        }
        Ok(())
    }

    /// Error for a run where nothing is running yet nothing can start.
    pub fn stalled(&self) -> Error {
        Error::Stalled {
            pending: self.pending.len() + self.ready.len(),
            first: self
                .ready
                .peek()
                .or(self.pending.first())
                .map_or_else(|| "nothing".to_string(), ToString::to_string),
        }
    }
}

fn describe<V>(arguments: &[Option<Arc<JobResult<V>>>]) -> String {
    let shapes: Vec<String> = arguments
        .iter()
        .map(|argument| match argument {
            Some(result) => format!("{} values", result.len()),
            None => "null".to_string(),
        })
        .collect();
    format!("[{}]", shapes.join(", "))
}
