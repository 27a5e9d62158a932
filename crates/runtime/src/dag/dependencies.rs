//! An ordering bound to a concrete number of chunks.

use std::sync::Arc;

use tracing::debug;

use crate::error::{Error, Result};
use crate::look_ahead::AdmissionGate;
use crate::types::{JobId, Phase};

use super::ordering::Ordering;

/// Dependency graph of one run.
///
/// Resolves predecessors and successors of individual jobs against the
/// horizon and owns the admission cursor that feeds entry jobs into the
/// pipeline. Everything except the cursor is read-only.
#[derive(Debug, Clone)]
pub struct Dependencies<P: Phase> {
    ordering: Arc<Ordering<P>>,
    number_chunks: usize,
    /// Whether the terminal phase has a flush job at `number_chunks + 1`
    flush: bool,
    cursor: usize,
}

impl<P: Phase> Dependencies<P> {
    /// Bind a frozen ordering to `number_chunks` chunks.
    ///
    /// Fails for an unfrozen ordering and for a chunk count whose horizon
    /// cannot be addressed.
    pub fn new(ordering: Arc<Ordering<P>>, number_chunks: usize) -> Result<Self> {
        if !ordering.is_frozen() {
            return Err(Error::OrderingNotFrozen);
        }
        let flush = ordering
            .from(ordering.terminal())
            .iter()
            .any(|(offset, _)| *offset < 0);

        // The flush chunk must stay addressable as a signed time, and the
        // job count must fit
        let horizon = number_chunks
            .checked_add(2)
            .filter(|horizon| isize::try_from(*horizon).is_ok())
            .and_then(|horizon| horizon.checked_mul(P::ALL.len()));
        if horizon.is_none() {
            return Err(Error::InvalidConfig(format!(
                "{number_chunks} chunks exceed the addressable horizon"
            )));
        }

        debug!(
            number_chunks,
            flush,
            entry = %ordering.entry(),
            terminal = %ordering.terminal(),
            "dependency graph created"
        );
        Ok(Self {
            ordering,
            number_chunks,
            flush,
            cursor: 0,
        })
    }

    /// The ordering this graph was built from.
    pub fn ordering(&self) -> &Arc<Ordering<P>> {
        &self.ordering
    }

    /// Number of chunks in the run, excluding the drain chunk.
    pub fn number_chunks(&self) -> usize {
        self.number_chunks
    }

    /// Largest link distance.
    pub fn delta(&self) -> usize {
        self.ordering.delta()
    }

    /// Whether a job of `phase` exists at `time`.
    pub fn is_valid(&self, time: isize, phase: P) -> bool {
        let Ok(time) = usize::try_from(time) else {
            return false;
        };
        if time <= self.number_chunks {
            return true;
        }
        self.flush && time == self.number_chunks + 1 && phase == self.ordering.terminal()
    }

    /// Validated identifier constructor.
    pub fn id(&self, time: usize, phase: P) -> Result<JobId<P>> {
        let limit = self.number_chunks + 1;
        if time > limit {
            return Err(Error::TimeOutOfRange {
                time: isize::try_from(time).unwrap_or(isize::MAX),
                limit,
            });
        }
        if !self.is_valid(time as isize, phase) {
            return Err(Error::InvalidJob {
                phase: phase.to_string(),
                time,
            });
        }
        Ok(self.make(time, phase))
    }

    fn make(&self, time: usize, phase: P) -> JobId<P> {
        JobId::new(time, phase, self.ordering.rank(phase))
    }

    /// Predecessors of `id`, one entry per incoming link in declaration
    /// order.
    ///
    /// References outside the horizon resolve to `None`. The position of
    /// each entry is the position of the matching argument of the job.
    pub fn from(&self, id: &JobId<P>) -> Vec<Option<JobId<P>>> {
        self.ordering
            .from(id.phase())
            .iter()
            .map(|(offset, phase)| {
                let time = id.time() as isize + offset;
                self.is_valid(time, *phase)
                    .then(|| self.make(time as usize, *phase))
            })
            .collect()
    }

    /// Successors of `id` inside the horizon.
    pub fn to(&self, id: &JobId<P>) -> Vec<JobId<P>> {
        self.ordering
            .to(id.phase())
            .iter()
            .filter_map(|(distance, phase)| {
                let time = id.time() + distance;
                self.is_valid(time as isize, *phase)
                    .then(|| self.make(time, *phase))
            })
            .collect()
    }

    /// Admit the next entry job if the gate allows it.
    ///
    /// Returns `None` without advancing when every entry chunk has been
    /// admitted or the gate refuses the chunk under the cursor.
    pub fn next<G: AdmissionGate + ?Sized>(&mut self, gate: &G) -> Option<JobId<P>> {
        if self.is_exhausted() {
            return None;
        }
        let entry = self.ordering.entry();
        if !gate.ok(self.cursor, self.ordering.rank(entry)) {
            return None;
        }
        let id = self.make(self.cursor, entry);
        self.cursor += 1;
        Some(id)
    }

    /// True once every entry chunk has been admitted.
    pub fn is_exhausted(&self) -> bool {
        self.cursor > self.number_chunks
    }

    /// Number of entry jobs admitted so far.
    pub fn admitted(&self) -> usize {
        self.cursor
    }

    /// Total number of jobs in the run.
    pub fn job_count(&self) -> usize {
        P::ALL.len() * (self.number_chunks + 1) + usize::from(self.flush)
    }
}
