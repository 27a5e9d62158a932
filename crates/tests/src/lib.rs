//! Integration test harness for Strand.
//!
//! This crate runs arbitrary pipelines end to end and records what the
//! scheduler did: when each job started and finished and which results it
//! was handed. Tests then check the recording against the declared links.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

use parking_lot::Mutex;
use strand_runtime::job::absent_or_single;
use strand_runtime::{
    Arguments, Contract, Dependencies, Job, JobFactory, JobFailure, JobId, JobResult, Ordering,
    Phase, Result, RunOptions, RunReport, Scheduler,
};

/// Generic six-stage pipeline used by the harness.
///
/// Which stages talk to each other is decided per test by the links passed
/// to [`TestHarness::from_links`]. `Sink` never produces a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    /// Entry stage.
    Source,
    /// Intermediate stage, wired per test.
    A,
    /// Intermediate stage, wired per test.
    B,
    /// Intermediate stage, wired per test.
    C,
    /// Intermediate stage, wired per test.
    D,
    /// Terminal stage; records but returns no result.
    Sink,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl Phase for Stage {
    const ALL: &'static [Self] = &[Stage::Source, Stage::A, Stage::B, Stage::C, Stage::D, Stage::Sink];
}

/// Every job produces its own identifier, so consumers can check they got
/// the right predecessor in the right position.
impl Contract<JobId<Stage>> for Stage {
    fn valid_arguments(&self, arguments: &[Option<Arc<JobResult<JobId<Stage>>>>]) -> bool {
        arguments
            .iter()
            .all(|argument| absent_or_single(argument, |_| true))
    }

    fn valid_result(&self, result: Option<&JobResult<JobId<Stage>>>) -> bool {
        match self {
            Stage::Sink => result.is_none(),
            _ => result.is_some_and(|result| result.len() == 1),
        }
    }
}

/// One executed job.
#[derive(Debug, Clone)]
pub struct Event {
    /// The job that ran.
    pub id: JobId<Stage>,
    /// Global sequence number taken when the job started.
    pub started: usize,
    /// Global sequence number taken when the job finished.
    pub finished: usize,
    /// Identifiers found in each argument position, `None` where the
    /// predecessor lies outside the horizon.
    pub arguments: Vec<Option<JobId<Stage>>>,
}

#[derive(Default)]
struct RecordingFactory {
    clock: AtomicUsize,
    events: Mutex<Vec<Event>>,
}

impl JobFactory<Stage, JobId<Stage>> for RecordingFactory {
    fn create(&self, id: JobId<Stage>, arguments: Arguments<JobId<Stage>>) -> Box<dyn Job<JobId<Stage>> + '_> {
        Box::new(RecordingJob {
            id,
            arguments,
            factory: self,
        })
    }
}

struct RecordingJob<'f> {
    id: JobId<Stage>,
    arguments: Arguments<JobId<Stage>>,
    factory: &'f RecordingFactory,
}

impl Job<JobId<Stage>> for RecordingJob<'_> {
    fn label(&self) -> String {
        self.id.to_string()
    }

    fn run(self: Box<Self>) -> std::result::Result<Option<JobResult<JobId<Stage>>>, JobFailure> {
        let started = self.factory.clock.fetch_add(1, AtomicOrdering::SeqCst);
        let arguments = self
            .arguments
            .iter()
            .map(|argument| argument.as_ref().and_then(|result| result.result(0).copied()))
            .collect();
        std::thread::yield_now();
        let finished = self.factory.clock.fetch_add(1, AtomicOrdering::SeqCst);

        self.factory.events.lock().push(Event {
            id: self.id,
            started,
            finished,
            arguments,
        });
        Ok((self.id.phase() != Stage::Sink).then(|| JobResult::single(self.id)))
    }
}

/// What one run did.
pub struct Recording {
    pub report: RunReport<Stage>,
    pub events: Vec<Event>,
}

/// Test harness for running pipelines built from a list of links.
pub struct TestHarness {
    ordering: Arc<Ordering<Stage>>,
}

impl TestHarness {
    /// Build and freeze a pipeline from `(from, distance, to)` links.
    ///
    /// # Panics
    ///
    /// Panics if the links do not form a valid ordering.
    pub fn from_links(entry: Stage, terminal: Stage, links: &[(Stage, usize, Stage)]) -> Self {
        let mut ordering = Ordering::new(entry, terminal);
        for (from, distance, to) in links {
            ordering
                .set_link(*from, *distance, *to)
                .unwrap_or_else(|e| panic!("invalid link: {e}"));
        }
        ordering
            .freeze()
            .unwrap_or_else(|e| panic!("invalid ordering: {e}"));
        Self {
            ordering: Arc::new(ordering),
        }
    }

    /// The frozen ordering.
    pub fn ordering(&self) -> &Arc<Ordering<Stage>> {
        &self.ordering
    }

    /// Dependency graph over `number_chunks` chunks.
    pub fn dependencies(&self, number_chunks: usize) -> Dependencies<Stage> {
        Dependencies::new(self.ordering.clone(), number_chunks)
            .unwrap_or_else(|e| panic!("cannot build dependencies: {e}"))
    }

    /// Run the pipeline, returning the scheduler's error if it fails.
    pub fn try_run(&self, number_chunks: usize, options: RunOptions) -> Result<Recording> {
        let factory = RecordingFactory::default();
        let report = Scheduler::new(self.dependencies(number_chunks), &factory, options)?.run()?;
        let mut events = factory.events.into_inner();
        events.sort_by_key(|event| event.started);
        Ok(Recording { report, events })
    }

    /// Run the pipeline.
    ///
    /// # Panics
    ///
    /// Panics if the run fails.
    pub fn run(&self, number_chunks: usize, options: RunOptions) -> Recording {
        self.try_run(number_chunks, options)
            .unwrap_or_else(|e| panic!("run failed: {e}"))
    }

    /// Check a recording against the declared links.
    ///
    /// Every job in the horizon ran exactly once, after each of its
    /// predecessors finished, and received their results in declaration
    /// order.
    ///
    /// # Panics
    ///
    /// Panics on the first violation found.
    pub fn assert_consistent(&self, number_chunks: usize, recording: &Recording) {
        let dependencies = self.dependencies(number_chunks);
        assert_eq!(
            recording.events.len(),
            dependencies.job_count(),
            "number of executed jobs"
        );

        let mut finished = std::collections::HashMap::new();
        for event in &recording.events {
            assert!(
                finished.insert(event.id, event.finished).is_none(),
                "{} ran twice",
                event.id
            );
        }

        for event in &recording.events {
            let predecessors = dependencies.from(&event.id);
            assert_eq!(event.arguments.len(), predecessors.len(), "arity of {}", event.id);
            for (position, predecessor) in predecessors.iter().enumerate() {
                let Some(predecessor) = predecessor else {
                    assert_eq!(event.arguments[position], None, "{} argument {position}", event.id);
                    continue;
                };
                let done = finished
                    .get(predecessor)
                    .unwrap_or_else(|| panic!("{predecessor} never ran"));
                assert!(
                    *done < event.started,
                    "{} started before {predecessor} finished",
                    event.id
                );
                let expected = (predecessor.phase() != Stage::Sink).then_some(*predecessor);
                assert_eq!(event.arguments[position], expected, "{} argument {position}", event.id);
            }
        }
    }
}

/// A linear chain `Source -> A -> B -> C -> D -> Sink` within each chunk.
pub fn chain_links() -> Vec<(Stage, usize, Stage)> {
    vec![
        (Stage::Source, 0, Stage::A),
        (Stage::A, 0, Stage::B),
        (Stage::B, 0, Stage::C),
        (Stage::C, 0, Stage::D),
        (Stage::D, 0, Stage::Sink),
    ]
}
