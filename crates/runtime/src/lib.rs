//! Strand Runtime.
//!
//! A dependency scheduler for pipelines that process a stream of chunks
//! through a fixed set of phases. Phases are wired together by links that
//! may reach back a bounded number of chunks, so each job waits only for
//! the specific earlier jobs it consumes while the pipeline as a whole runs
//! several chunks at once.
//!
//! # Architecture
//!
//! The runtime is organized into several modules:
//!
//! - [`types`] - Core types: [`Phase`], [`Link`], [`JobId`]
//! - [`dag`] - Phase [`Ordering`](dag::Ordering) and the per-run
//!   [`Dependencies`](dag::Dependencies) graph
//! - [`look_ahead`] - Admission gates bounding how far ahead the pipeline runs
//! - [`ready_queue`] - Time-bucketed ring of jobs ready to run
//! - [`storage`] - Retained results and outstanding dependency counters
//! - [`job`] - The [`Job`], [`JobFactory`] and [`Contract`] boundary
//! - [`executor`] - The multi-threaded [`Scheduler`] driver
//! - [`statistics`] - Per-phase job timing
//! - [`example`] - A six-phase demonstration pipeline
//! - [`error`] - Error types for scheduler failures
//!
//! # Execution Model
//!
//! A run over `n` chunks proceeds as follows:
//!
//! 1. **Admit** - entry jobs enter chunk by chunk while the look-ahead gate
//!    allows it
//! 2. **Dispatch** - the smallest ready job by `(time, rank)` is handed to a
//!    worker together with its predecessors' results
//! 3. **Complete** - the result is retained for each successor and every
//!    successor whose dependencies are now all met becomes ready
//!
//! The run ends once every chunk has been admitted and drained.
//!
//! # Example
//!
//! ```
//! use strand_runtime::example::run_example;
//! use strand_runtime::RunOptions;
//!
//! let (report, bed, out) = run_example(3, RunOptions::with_threads(2)).unwrap();
//! assert_eq!(report.jobs, 25);
//! assert_eq!(bed.lines().count(), 4);
//! assert_eq!(out.lines().count(), 5);
//! ```

pub mod dag;
pub mod error;
pub mod example;
pub mod executor;
pub mod job;
pub mod look_ahead;
pub mod ready_queue;
pub mod statistics;
pub mod storage;
pub mod types;

pub use dag::{Dependencies, Ordering};
pub use error::{Error, JobFailure, Result};
pub use executor::{RunOptions, RunReport, RunState, Scheduler};
pub use job::{Arguments, Contract, Job, JobFactory, JobResult};
pub use look_ahead::{AdmissionGate, LookAhead, Unbounded};
pub use ready_queue::ReadyQueue;
pub use statistics::{JobStatistics, PhaseTiming, StatisticsSink};
pub use types::*;
