//! Per-phase job timing.
//!
//! Observability only: nothing in the scheduler reads these numbers back.

use std::fmt;
use std::time::Duration;

use indexmap::IndexMap;
use serde::Serialize;

use crate::types::{JobId, Phase};

/// Receives one call per completed job.
pub trait StatisticsSink<P: Phase> {
    /// Record that `id` ran for `elapsed_nanos`.
    fn increment(&mut self, id: &JobId<P>, elapsed_nanos: u64);
}

/// Accumulated timing of one phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PhaseTiming {
    /// Jobs completed.
    pub count: u64,
    /// Sum of job run times.
    pub total_nanos: u64,
    /// Longest single job.
    pub max_nanos: u64,
}

impl PhaseTiming {
    /// Mean run time, zero if nothing ran.
    pub fn mean(&self) -> Duration {
        if self.count == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(self.total_nanos / self.count)
    }
}

/// Timing per phase, kept in declaration order.
#[derive(Debug, Clone, Serialize)]
#[serde(bound = "")]
pub struct JobStatistics<P: Phase> {
    #[serde(serialize_with = "serialize_phases")]
    phases: IndexMap<P, PhaseTiming>,
}

impl<P: Phase> Default for JobStatistics<P> {
    fn default() -> Self {
        Self {
            phases: P::ALL
                .iter()
                .map(|phase| (*phase, PhaseTiming::default()))
                .collect(),
        }
    }
}

impl<P: Phase> JobStatistics<P> {
    /// Timing of one phase.
    pub fn timing(&self, phase: P) -> PhaseTiming {
        self.phases.get(&phase).copied().unwrap_or_default()
    }

    /// Jobs completed for `phase`.
    pub fn count(&self, phase: P) -> u64 {
        self.timing(phase).count
    }

    /// Jobs completed over all phases.
    pub fn total_count(&self) -> u64 {
        self.phases.values().map(|timing| timing.count).sum()
    }

    /// Run time summed over all phases.
    pub fn total_nanos(&self) -> u64 {
        self.phases.values().map(|timing| timing.total_nanos).sum()
    }

    /// Iterate over `(phase, timing)` in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (P, PhaseTiming)> + '_ {
        self.phases.iter().map(|(phase, timing)| (*phase, *timing))
    }

    /// Fold another set of statistics into this one.
    pub fn merge(&mut self, other: &Self) {
        for (phase, timing) in other.iter() {
            let entry = self.phases.entry(phase).or_default();
            entry.count += timing.count;
            entry.total_nanos += timing.total_nanos;
            entry.max_nanos = entry.max_nanos.max(timing.max_nanos);
        }
    }
}

impl<P: Phase> StatisticsSink<P> for JobStatistics<P> {
    fn increment(&mut self, id: &JobId<P>, elapsed_nanos: u64) {
        let timing = self.phases.entry(id.phase()).or_default();
        timing.count += 1;
        timing.total_nanos += elapsed_nanos;
        timing.max_nanos = timing.max_nanos.max(elapsed_nanos);
    }
}

impl<P: Phase> fmt::Display for JobStatistics<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .phases
            .keys()
            .map(|phase| phase.to_string().len())
            .max()
            .unwrap_or(0)
            .max("Phase".len());

        writeln!(
            f,
            "{:<width$} {:>8} {:>14} {:>14} {:>14}",
            "Phase", "Jobs", "Total(ms)", "Mean(us)", "Max(us)"
        )?;
        for (phase, timing) in self.iter() {
            writeln!(
                f,
                "{:<width$} {:>8} {:>14.3} {:>14.3} {:>14.3}",
                phase.to_string(),
                timing.count,
                timing.total_nanos as f64 / 1e6,
                timing.mean().as_nanos() as f64 / 1e3,
                timing.max_nanos as f64 / 1e3,
            )?;
        }
        write!(
            f,
            "{:<width$} {:>8} {:>14.3}",
            "Total",
            self.total_count(),
            self.total_nanos() as f64 / 1e6
        )
    }
}

fn serialize_phases<P: Phase, S: serde::Serializer>(
    phases: &IndexMap<P, PhaseTiming>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_map(phases.iter().map(|(phase, timing)| (phase.to_string(), timing)))
}
