//! Topological leveling of the same-time links.

use indexmap::{IndexMap, IndexSet};

use crate::types::{Link, Phase};

/// Error returned when the distance 0 links contain a cycle.
///
/// Contains every phase that could not be placed in a level. A self link at
/// distance 0 is reported as a one-phase cycle.
#[derive(Debug)]
pub struct CycleError<P> {
    /// Phases involved in, or blocked behind, the cycle.
    pub involved: Vec<P>,
}

/// Compute topological levels of the phases over the distance 0 links using
/// Kahn's algorithm.
///
/// Phases inside a level have no same-time dependency on each other and are
/// sorted by declaration index, so flattening the levels gives a
/// deterministic linear extension of the precedence relation.
pub(super) fn same_time_levels<P: Phase>(links: &[Link<P>]) -> Result<Vec<Vec<P>>, CycleError<P>> {
    let mut in_degree: IndexMap<P, usize> = P::ALL.iter().map(|phase| (*phase, 0)).collect();
    let mut dependents: IndexMap<P, Vec<P>> = IndexMap::new();

    // Deduplicate edges so a link declared twice counts once
    let mut seen: IndexSet<(P, P)> = IndexSet::new();
    for link in links.iter().filter(|link| link.distance == 0) {
        if seen.insert((link.from, link.to)) {
            *in_degree.entry(link.to).or_insert(0) += 1;
            dependents.entry(link.from).or_default().push(link.to);
        }
    }

    let mut levels = Vec::new();
    let mut current: Vec<P> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(phase, _)| *phase)
        .collect();
    let mut processed = 0;

    while !current.is_empty() {
        current.sort_by_key(|phase| phase.index());
        processed += current.len();

        let mut next = Vec::new();
        for phase in &current {
            if let Some(targets) = dependents.get(phase) {
                for target in targets {
                    if let Some(degree) = in_degree.get_mut(target) {
                        *degree -= 1;
                        if *degree == 0 {
                            next.push(*target);
                        }
                    }
                }
            }
        }

        levels.push(std::mem::replace(&mut current, next));
    }

    if processed != in_degree.len() {
        let involved = in_degree
            .iter()
            .filter(|(_, degree)| **degree > 0)
            .map(|(phase, _)| *phase)
            .collect();
        return Err(CycleError { involved });
    }

    Ok(levels)
}
