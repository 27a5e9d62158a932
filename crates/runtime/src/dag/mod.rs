//! Phase ordering and the chunked dependency graph.
//!
//! This module describes *what depends on what*. It knows nothing about
//! threads, queues or results.
//!
//! # Structure
//!
//! - [`Ordering`] - The build-once list of links between phases, with the
//!   derived same-time precedence
//! - [`Dependencies`] - An ordering bound to a horizon of chunks; resolves
//!   predecessors and successors of individual jobs and admits entry jobs
//!
//! # Time Model
//!
//! A link `from -> to @ d` means the `to` job at chunk `t` consumes the
//! result of the `from` job at chunk `t - d`. Links with `d == 0` order
//! phases *within* a chunk and must be acyclic. Links with `d > 0` carry
//! state forward in time; a phase may link to itself that way (a sink that
//! must write chunks in order, for instance).
//!
//! For `n` chunks every phase has a job at each chunk `0..=n`. Chunk `n` is
//! the drain chunk. When a link into the terminal phase reaches back in
//! time, the terminal phase gets one more job at `n + 1` to flush what the
//! drain chunk left behind. References outside that horizon resolve to
//! `None`.

mod dependencies;
mod ordering;
mod topology;


pub use dependencies::Dependencies;
pub use ordering::Ordering;
pub use topology::CycleError;
