//! Admission gates bounding how far the pipeline runs ahead.
//!
//! The scheduler asks a gate before admitting a new entry chunk and before
//! dispatching a ready job. [`LookAhead`] is the production policy;
//! [`Unbounded`] lets everything through and exists for tests and tiny
//! pipelines.

use std::collections::VecDeque;

use tracing::trace;

use crate::error::{Error, Result};

/// Backpressure policy consulted by the scheduler.
///
/// Implementations must be monotonic within a run: once `ok(time, rank)`
/// has returned `true` it must not return `false` for the same arguments
/// later on.
pub trait AdmissionGate {
    /// May a job of the phase with same-time rank `rank` at chunk `time`
    /// proceed? Rank 0 is the entry phase.
    fn ok(&self, time: usize, rank: usize) -> bool;
}

/// Gate that never refuses.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unbounded;

impl AdmissionGate for Unbounded {
    fn ok(&self, _time: usize, _rank: usize) -> bool {
        true
    }
}

/// Look-ahead gate keyed on the oldest unfinished chunk.
///
/// Every job is *opened* when the scheduler first learns about it and
/// *closed* when it completes. The lowest chunk that still has open jobs
/// (never moving past the admission cursor) is the window start. Entry jobs
/// may be admitted up to `look_ahead` chunks past it. Downstream phases get
/// `delta` extra chunks of slack because they legitimately reach back that
/// far, which keeps the gate from refusing work it already committed to.
///
/// `lowest` only grows, so the gate is monotonic.
#[derive(Debug, Clone)]
pub struct LookAhead {
    look_ahead: usize,
    delta: usize,
    lowest: usize,
    /// Entry chunks admitted so far; `lowest` never passes it
    cursor: usize,
    /// Open job counts for chunks `lowest..lowest + open.len()`
    open: VecDeque<usize>,
    max_in_flight: usize,
}

impl LookAhead {
    /// Create a gate admitting at most `look_ahead` entry chunks past the
    /// oldest unfinished one.
    pub fn new(look_ahead: usize, delta: usize) -> Result<Self> {
        if look_ahead == 0 {
            return Err(Error::InvalidConfig(
                "look-ahead must admit at least one chunk".to_string(),
            ));
        }
        Ok(Self {
            look_ahead,
            delta,
            lowest: 0,
            cursor: 0,
            open: VecDeque::new(),
            max_in_flight: 0,
        })
    }

    /// Oldest chunk that may still have unfinished work.
    pub fn lowest(&self) -> usize {
        self.lowest
    }

    /// Configured look-ahead.
    pub fn look_ahead(&self) -> usize {
        self.look_ahead
    }

    /// Number of chunks between the oldest and newest open job, inclusive.
    pub fn in_flight(&self) -> usize {
        self.open
            .iter()
            .rposition(|count| *count > 0)
            .map_or(0, |last| last + 1)
    }

    /// Largest value [`LookAhead::in_flight`] reached during the run.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    /// Record that the entry job at `time` was admitted.
    pub fn admitted(&mut self, time: usize) {
        self.cursor = self.cursor.max(time + 1);
    }

    /// Record that a job at `time` exists and has not finished.
    pub fn open(&mut self, time: usize) -> Result<()> {
        let offset = time.checked_sub(self.lowest).ok_or_else(|| {
            Error::Internal(format!(
                "job opened at chunk {time} behind look-ahead window starting at {}",
                self.lowest
            ))
        })?;
        if self.open.len() <= offset {
            self.open.resize(offset + 1, 0);
        }
        self.open[offset] += 1;
        self.max_in_flight = self.max_in_flight.max(self.in_flight());
        Ok(())
    }

    /// Record that a job at `time` finished.
    pub fn close(&mut self, time: usize) -> Result<()> {
        let slot = time
            .checked_sub(self.lowest)
            .and_then(|offset| self.open.get_mut(offset))
            .filter(|count| **count > 0)
            .ok_or_else(|| Error::Internal(format!("no open job at chunk {time} to close")))?;
        *slot -= 1;
        self.advance();
        Ok(())
    }

    fn advance(&mut self) {
        let before = self.lowest;
        while self.lowest < self.cursor && self.open.front().is_none_or(|count| *count == 0) {
            self.open.pop_front();
            self.lowest += 1;
        }
        if self.lowest != before {
            trace!(lowest = self.lowest, "look-ahead window advanced");
        }
    }
}

impl AdmissionGate for LookAhead {
    fn ok(&self, time: usize, rank: usize) -> bool {
        let slack = if rank == 0 { 0 } else { self.delta };
        time < self.lowest + self.look_ahead + slack
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_look_ahead_rejected() {
        assert!(matches!(LookAhead::new(0, 1), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_entry_bounded_by_look_ahead() {
        let gate = LookAhead::new(2, 1).unwrap();
        assert!(gate.ok(0, 0));
        assert!(gate.ok(1, 0));
        assert!(!gate.ok(2, 0));
        // Downstream phases get delta extra chunks
        assert!(gate.ok(2, 3));
        assert!(!gate.ok(3, 3));
    }

    #[test]
    fn test_window_advances_when_chunk_finishes() {
        let mut gate = LookAhead::new(1, 1).unwrap();
        gate.admitted(0);
        gate.open(0).unwrap();
        gate.open(0).unwrap();
        assert!(!gate.ok(1, 0));

        gate.close(0).unwrap();
        assert_eq!(gate.lowest(), 0);
        gate.close(0).unwrap();

        assert_eq!(gate.lowest(), 1);
        assert!(gate.ok(1, 0));
    }

    #[test]
    fn test_window_never_passes_cursor() {
        let mut gate = LookAhead::new(1, 0).unwrap();
        gate.admitted(0);
        gate.open(0).unwrap();
        gate.close(0).unwrap();

        // Nothing admitted at chunk 1 yet, so chunk 1 is not finished
        assert_eq!(gate.lowest(), 1);
        gate.admitted(1);
        gate.open(1).unwrap();
        gate.close(1).unwrap();
        assert_eq!(gate.lowest(), 2);
    }

    #[test]
    fn test_window_waits_for_oldest_chunk() {
        let mut gate = LookAhead::new(3, 1).unwrap();
        for time in 0..3 {
            gate.admitted(time);
            gate.open(time).unwrap();
        }
        gate.close(1).unwrap();
        gate.close(2).unwrap();
        assert_eq!(gate.lowest(), 0);
        assert_eq!(gate.in_flight(), 1);

        gate.close(0).unwrap();
        assert_eq!(gate.lowest(), 3);
        assert_eq!(gate.max_in_flight(), 3);
    }

    #[test]
    fn test_monotonic() {
        let mut gate = LookAhead::new(2, 1).unwrap();
        let mut allowed = Vec::new();
        for time in 0..6 {
            gate.admitted(time);
            gate.open(time).unwrap();
            gate.close(time).unwrap();
            for candidate in 0..10 {
                if gate.ok(candidate, 0) {
                    allowed.push(candidate);
                }
            }
            for candidate in &allowed {
                assert!(gate.ok(*candidate, 0));
            }
        }
    }

    #[test]
    fn test_close_without_open_is_internal_error() {
        let mut gate = LookAhead::new(1, 0).unwrap();
        assert!(matches!(gate.close(0), Err(Error::Internal(_))));
    }

    #[test]
    fn test_unbounded_always_ok() {
        assert!(Unbounded.ok(usize::MAX - 1, 0));
    }
}
