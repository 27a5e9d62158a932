//! Build-once description of the links between phases.

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::types::{Link, Phase};

use super::topology::same_time_levels;

/// The links of a pipeline and the relations derived from them.
///
/// An ordering is mutable until [`Ordering::freeze`] succeeds and read-only
/// afterwards. Share the frozen value through an `Arc`; there is no global
/// instance.
///
/// The order in which links are declared is significant: it is the order
/// of the arguments handed to every job of the consuming phase.
///
/// ```
/// # use strand_runtime::example::ExamplePhase;
/// use strand_runtime::dag::Ordering;
///
/// let mut ordering = Ordering::new(ExamplePhase::Incr, ExamplePhase::Out);
/// ordering.set_link(ExamplePhase::Incr, 0, ExamplePhase::Dangling).unwrap();
/// ordering.set_link(ExamplePhase::Dangling, 0, ExamplePhase::Complex).unwrap();
/// ordering.set_link(ExamplePhase::Dangling, 0, ExamplePhase::Merge).unwrap();
/// ordering.set_link(ExamplePhase::Dangling, 0, ExamplePhase::Bed).unwrap();
/// ordering.set_link(ExamplePhase::Merge, 0, ExamplePhase::Out).unwrap();
/// ordering.freeze().unwrap();
///
/// assert!(ordering.before(ExamplePhase::Incr, ExamplePhase::Out));
/// assert!(ordering.set_link(ExamplePhase::Out, 1, ExamplePhase::Out).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct Ordering<P: Phase> {
    entry: P,
    terminal: P,
    links: Vec<Link<P>>,
    /// Per consuming phase: `(-distance, from)` in declaration order
    from: Vec<Vec<(isize, P)>>,
    /// Per producing phase: `(distance, to)` in declaration order
    to: Vec<Vec<(usize, P)>>,
    /// `before[a][b]`: a precedes b within a chunk
    before: Vec<Vec<bool>>,
    rank: Vec<usize>,
    delta: usize,
    frozen: bool,
}

impl<P: Phase> Ordering<P> {
    /// Create an empty ordering.
    ///
    /// `entry` is the phase whose jobs are admitted into the pipeline chunk
    /// by chunk. `terminal` is the final sink, the only phase that gets a
    /// flush job after the drain chunk.
    pub fn new(entry: P, terminal: P) -> Self {
        let count = P::ALL.len();
        Self {
            entry,
            terminal,
            links: Vec::new(),
            from: vec![Vec::new(); count],
            to: vec![Vec::new(); count],
            before: vec![vec![false; count]; count],
            rank: (0..count).collect(),
            delta: 0,
            frozen: false,
        }
    }

    /// Declare that a `to` job at chunk `t` consumes the `from` job at chunk
    /// `t - distance`.
    ///
    /// Fails once the ordering is frozen, for a link identical to one
    /// already declared, and for a phase missing from [`Phase::ALL`].
    pub fn set_link(&mut self, from: P, distance: usize, to: P) -> Result<()> {
        let link = Link { from, distance, to };
        if self.frozen {
            return Err(Error::OrderingFrozen {
                operation: format!("add link {link}"),
            });
        }

        if self.links.contains(&link) {
            return Err(Error::InvalidConfig(format!("duplicate link {link}")));
        }

        let offset = isize::try_from(distance)
            .map_err(|_| Error::InvalidConfig(format!("link distance {distance} too large")))?;
        let (from_slot, to_slot) = (listed(from)?, listed(to)?);
        self.from[to_slot].push((-offset, from));
        self.to[from_slot].push((distance, to));
        self.delta = self.delta.max(distance);
        self.links.push(link);

        debug!(%link, "link declared");
        Ok(())
    }

    /// Close the configuration.
    ///
    /// Validates that the same-time links are acyclic and that every phase
    /// other than the entry can be reached within a chunk, then computes the
    /// precedence relation and ranks. Freezing twice is an error.
    pub fn freeze(&mut self) -> Result<()> {
        if self.frozen {
            return Err(Error::OrderingFrozen {
                operation: "freeze again".to_string(),
            });
        }

        listed(self.entry)?;
        listed(self.terminal)?;

        let levels = same_time_levels(&self.links).map_err(|err| Error::CycleDetected {
            phases: err.involved.iter().map(ToString::to_string).collect(),
        })?;

        for phase in P::ALL {
            if *phase == self.entry {
                continue;
            }
            let reachable = self
                .links
                .iter()
                .any(|link| link.to == *phase && link.from != *phase && link.distance == 0);
            if !reachable {
                return Err(Error::UnreachablePhase {
                    phase: phase.to_string(),
                });
            }
        }

        for (rank, phase) in levels.iter().flatten().enumerate() {
            self.rank[phase.index()] = rank;
        }
        self.before = self.closure();
        self.frozen = true;

        info!(
            links = self.links.len(),
            delta = self.delta,
            levels = levels.len(),
            "phase ordering frozen"
        );
        Ok(())
    }

    /// Transitive closure of the distance 0 links.
    fn closure(&self) -> Vec<Vec<bool>> {
        let count = P::ALL.len();
        let mut reach = vec![vec![false; count]; count];
        for link in self.links.iter().filter(|link| link.distance == 0) {
            reach[link.from.index()][link.to.index()] = true;
        }
        // Floyd-Warshall; the phase set is tiny
        for k in 0..count {
            for i in 0..count {
                if reach[i][k] {
                    for j in 0..count {
                        if reach[k][j] {
                            reach[i][j] = true;
                        }
                    }
                }
            }
        }
        reach
    }

    /// Whether [`Ordering::freeze`] has succeeded.
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Phase admitted chunk by chunk.
    pub fn entry(&self) -> P {
        self.entry
    }

    /// Final sink phase.
    pub fn terminal(&self) -> P {
        self.terminal
    }

    /// Links in declaration order.
    pub fn links(&self) -> &[Link<P>] {
        &self.links
    }

    /// Predecessor offsets of `phase` as `(-distance, from)`.
    ///
    /// Declaration order is preserved; it is the argument order of the
    /// phase's jobs.
    pub fn from(&self, phase: P) -> &[(isize, P)] {
        self.from.get(phase.index()).map_or(&[], Vec::as_slice)
    }

    /// Successor offsets of `phase` as `(distance, to)`.
    pub fn to(&self, phase: P) -> &[(usize, P)] {
        self.to.get(phase.index()).map_or(&[], Vec::as_slice)
    }

    /// True if `a` strictly precedes `b` within one chunk.
    ///
    /// Always false before the ordering is frozen.
    pub fn before(&self, a: P, b: P) -> bool {
        self.before
            .get(a.index())
            .and_then(|row| row.get(b.index()))
            .copied()
            .unwrap_or(false)
    }

    /// Same-time rank of a phase.
    ///
    /// Consistent with [`Ordering::before`]; phases it leaves unordered are
    /// ranked by declaration index. Equals the declaration index until the
    /// ordering is frozen.
    pub fn rank(&self, phase: P) -> usize {
        self.rank.get(phase.index()).copied().unwrap_or(usize::MAX)
    }

    /// Largest link distance.
    ///
    /// Results must be retained for at least `delta() + 1` chunks.
    pub fn delta(&self) -> usize {
        self.delta
    }
}

/// Slot of `phase` in the per-phase tables.
fn listed<P: Phase>(phase: P) -> Result<usize> {
    let index = phase.index();
    if index < P::ALL.len() {
        Ok(index)
    } else {
        Err(Error::InvalidConfig(format!("phase {phase} is not listed in Phase::ALL")))
    }
}
