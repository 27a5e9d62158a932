//! Run configuration and the summary handed back after a run.
//!
//! [`RunOptions`] is plain data so a host program can embed it in its own
//! configuration file; [`RunReport`] carries what was observed while the
//! scheduler drained the pipeline.

use std::fmt;
use std::num::NonZeroUsize;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::statistics::JobStatistics;
use crate::types::Phase;

/// Options for configuring a scheduler run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    /// Worker threads executing jobs.
    pub threads: usize,
    /// Entry chunks admitted past the oldest unfinished one.
    pub look_ahead: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            threads: std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
            look_ahead: 2,
        }
    }
}

impl RunOptions {
    /// Options with an explicit thread count and the default look-ahead.
    pub fn with_threads(threads: usize) -> Self {
        Self {
            threads,
            ..Self::default()
        }
    }

    /// Reject options no run can work with.
    pub fn validate(&self) -> Result<()> {
        if self.threads == 0 {
            return Err(Error::InvalidConfig(
                "at least one worker thread is required".to_string(),
            ));
        }
        if self.look_ahead == 0 {
            return Err(Error::InvalidConfig(
                "look-ahead must admit at least one chunk".to_string(),
            ));
        }
        Ok(())
    }
}

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    /// Created, nothing admitted.
    Idle,
    /// Entry chunks are still being admitted.
    Admitting,
    /// Every entry chunk is admitted; the remaining work is draining.
    Draining,
    /// Every job finished, or the run was aborted.
    Done,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::Admitting => "admitting",
            RunState::Draining => "draining",
            RunState::Done => "done",
        };
        f.write_str(name)
    }
}

/// Summary returned after a successful run.
#[derive(Debug, Clone, Serialize)]
#[serde(bound = "")]
pub struct RunReport<P: Phase> {
    /// Jobs executed.
    pub jobs: usize,
    /// Chunks in the run, excluding the drain chunk.
    pub number_chunks: usize,
    /// Options the run used.
    pub options: RunOptions,
    /// Most chunks that had unfinished jobs at the same time.
    pub max_in_flight_chunks: usize,
    /// Most results retained for successors at the same time.
    pub max_retained: usize,
    /// Most jobs waiting in the ready queue at the same time.
    pub max_ready: usize,
    /// Wall-clock time of the run.
    pub elapsed: Duration,
    /// Per-phase job timing.
    pub statistics: JobStatistics<P>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_are_valid() {
        let options = RunOptions::default();
        assert!(options.threads >= 1);
        assert_eq!(options.look_ahead, 2);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_zero_threads_rejected() {
        let options = RunOptions {
            threads: 0,
            look_ahead: 2,
        };
        assert!(matches!(options.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_zero_look_ahead_rejected() {
        let options = RunOptions {
            threads: 1,
            look_ahead: 0,
        };
        assert!(matches!(options.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_options_from_partial_json() {
        let options: RunOptions = serde_json::from_str(r#"{"look_ahead": 5}"#).unwrap();
        assert_eq!(options.look_ahead, 5);
        assert_eq!(options.threads, RunOptions::default().threads);
    }
}
