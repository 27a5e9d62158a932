//! Core scheduler types.
//!
//! [`Phase`] is implemented by the pipeline's closed set of stages,
//! [`Link`] is one declared dependency between them and [`JobId`] names a
//! single unit of work: one phase at one chunk.

use std::cmp::Ordering as CmpOrdering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A stage of a fixed pipeline.
///
/// Phases form a small, closed, enumerable set known when the pipeline is
/// configured. Implement it on a fieldless enum:
///
/// ```
/// use std::fmt;
/// use strand_runtime::Phase;
///
/// #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// enum Stage {
///     Read,
///     Write,
/// }
///
/// impl fmt::Display for Stage {
///     fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
///         fmt::Debug::fmt(self, f)
///     }
/// }
///
/// impl Phase for Stage {
///     const ALL: &'static [Self] = &[Stage::Read, Stage::Write];
/// }
///
/// assert_eq!(Stage::Write.index(), 1);
/// ```
pub trait Phase:
    Copy + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static
{
    /// Every phase, in declaration order.
    const ALL: &'static [Self];

    /// Position of this phase in [`Phase::ALL`].
    fn index(self) -> usize {
        Self::ALL
            .iter()
            .position(|phase| *phase == self)
            .unwrap_or(Self::ALL.len())
    }
}

/// A declared dependency: a `to` job at time `t` needs the `from` job at
/// time `t - distance`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Link<P> {
    /// Producing phase.
    pub from: P,
    /// How many chunks back the producer sits.
    pub distance: usize,
    /// Consuming phase.
    pub to: P,
}

impl<P: fmt::Display> fmt::Display for Link<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}@{}", self.from, self.to, self.distance)
    }
}

/// Identifier of one job: a phase at a chunk.
///
/// The identifier carries the phase's precedence rank, assigned when the
/// ordering is frozen, so that it is totally ordered on its own: by time
/// first, then by rank. Ranks are unique per phase, which keeps the order
/// consistent with equality on `(time, phase)`.
///
/// Identifiers are created by [`Dependencies`](crate::dag::Dependencies),
/// which validates the time against the run's horizon.
#[derive(Debug, Clone, Copy)]
pub struct JobId<P> {
    time: usize,
    phase: P,
    rank: usize,
}

impl<P: Phase> JobId<P> {
    pub(crate) fn new(time: usize, phase: P, rank: usize) -> Self {
        Self { time, phase, rank }
    }

    /// Chunk this job belongs to.
    pub fn time(&self) -> usize {
        self.time
    }

    /// Phase this job runs.
    pub fn phase(&self) -> P {
        self.phase
    }

    /// Same-time precedence rank of the phase.
    pub fn rank(&self) -> usize {
        self.rank
    }
}

impl<P: Phase> PartialEq for JobId<P> {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.phase == other.phase
    }
}

impl<P: Phase> Eq for JobId<P> {}

impl<P: Phase> Hash for JobId<P> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.time.hash(state);
        self.phase.hash(state);
    }
}

impl<P: Phase> Ord for JobId<P> {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.time
            .cmp(&other.time)
            .then_with(|| self.rank.cmp(&other.rank))
    }
}

impl<P: Phase> PartialOrd for JobId<P> {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl<P: Phase> fmt::Display for JobId<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.phase, self.time)
    }
}
