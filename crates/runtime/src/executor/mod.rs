//! Scheduler driver
//!
//! Runs every job of a [`Dependencies`] graph on a pool of worker threads.
//!
//! Each worker loops over the same three steps: admit the entry chunks the
//! look-ahead gate allows, pop the smallest ready job, run it with the lock
//! released and record its result. Workers with nothing to do park on a
//! condition variable until a completion or an abort changes the picture.
//!
//! A failing job aborts the run. Jobs already in flight finish, nothing new
//! is dispatched, and [`Scheduler::run`] returns the first error. A job that
//! panics is caught on its worker and aborts the run the same way.

mod run;
mod state;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{info, instrument, trace};

use crate::dag::Dependencies;
use crate::error::{Error, Result};
use crate::job::{Arguments, Contract, JobFactory};
use crate::statistics::StatisticsSink;
use crate::types::{JobId, Phase};

pub use run::{RunOptions, RunReport, RunState};

use state::{ExternalSink, Outcome, State};

/// Drives one run of a pipeline.
pub struct Scheduler<'f, P: Phase, V, F: ?Sized> {
    dependencies: Dependencies<P>,
    factory: &'f F,
    options: RunOptions,
    sink: Option<ExternalSink<'f, P>>,
    _values: std::marker::PhantomData<fn() -> V>,
}

impl<'f, P, V, F> Scheduler<'f, P, V, F>
where
    P: Phase + Contract<V>,
    V: Send + Sync + 'static,
    F: JobFactory<P, V> + ?Sized,
{
    /// Prepare a run of `dependencies`, building jobs with `factory`.
    pub fn new(dependencies: Dependencies<P>, factory: &'f F, options: RunOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            dependencies,
            factory,
            options,
            sink: None,
            _values: std::marker::PhantomData,
        })
    }

    /// Also report every completed job to `sink`.
    ///
    /// The sink sees exactly one [`StatisticsSink::increment`] per job, under
    /// the scheduler lock. The per-phase table in [`RunReport`] is kept
    /// either way.
    pub fn with_statistics(mut self, sink: &'f mut (dyn StatisticsSink<P> + Send)) -> Self {
        self.sink = Some(sink);
        self
    }

    /// The graph this scheduler runs.
    pub fn dependencies(&self) -> &Dependencies<P> {
        &self.dependencies
    }

    /// Options the run will use.
    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Execute every job and wait for the pipeline to drain.
    #[instrument(
        skip_all,
        fields(
            chunks = self.dependencies.number_chunks(),
            threads = self.options.threads,
            look_ahead = self.options.look_ahead
        )
    )]
    pub fn run(self) -> Result<RunReport<P>> {
        let started = Instant::now();
        let number_chunks = self.dependencies.number_chunks();
        let job_count = self.dependencies.job_count();
        info!(job_count, "run started");

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.threads)
            .thread_name(|index| format!("strand-worker-{index}"))
            .build()
            .map_err(|err| Error::Internal(format!("cannot start worker pool: {err}")))?;

        let mut state = State::new(self.dependencies, self.options.look_ahead, self.sink)?;
        state.transition(RunState::Admitting);
        let shared = Shared {
            state: Mutex::new(state),
            wake: Condvar::new(),
        };

        let factory = self.factory;
        pool.broadcast(|context| {
            trace!(worker = context.index(), "worker started");
            shared.work(factory);
        });

        let state = shared.state.into_inner();
        if let Some(err) = state.failure {
            return Err(err);
        }
        state.verify_drained()?;
        if state.completed != job_count {
            return Err(Error::Internal(format!(
                "{} jobs completed, expected {job_count}",
                state.completed
            )));
        }

        let report = RunReport {
            jobs: state.completed,
            number_chunks,
            options: self.options,
            max_in_flight_chunks: state.gate.max_in_flight(),
            max_retained: state.results.max_retained(),
            max_ready: state.max_ready,
            elapsed: started.elapsed(),
            statistics: state.statistics,
        };
        info!(
            jobs = report.jobs,
            elapsed_ms = report.elapsed.as_millis() as u64,
            max_in_flight_chunks = report.max_in_flight_chunks,
            max_retained = report.max_retained,
            "run finished"
        );
        Ok(report)
    }
}

struct Shared<'s, P: Phase, V> {
    state: Mutex<State<'s, P, V>>,
    wake: Condvar,
}

impl<'s, P, V> Shared<'s, P, V>
where
    P: Phase + Contract<V>,
    V: Send + Sync + 'static,
{
    /// Worker loop; returns once the run is done or aborted.
    fn work<F>(&self, factory: &F)
    where
        F: JobFactory<P, V> + ?Sized,
    {
        let mut guard = self.state.lock();
        while !guard.is_stopped() {
            if let Err(err) = guard.admit() {
                self.abort(&mut guard, err);
                break;
            }

            match guard.dispatch() {
                Ok(Some((id, arguments))) => {
                    let outcome = MutexGuard::unlocked(&mut guard, || execute(factory, id, arguments));
                    if let Err(err) = guard.complete(id, outcome) {
                        self.abort(&mut guard, err);
                        break;
                    }
                    self.wake.notify_all();
                }
                Ok(None) if guard.is_drained() => {
                    guard.transition(RunState::Done);
                    self.wake.notify_all();
                }
                Ok(None) if guard.running == 0 => {
                    let err = guard.stalled();
                    self.abort(&mut guard, err);
                }
                Ok(None) => self.wake.wait(&mut guard),
                Err(err) => self.abort(&mut guard, err),
            }
        }
    }

    fn abort(&self, guard: &mut MutexGuard<'_, State<'s, P, V>>, err: Error) {
        guard.fail(err);
        self.wake.notify_all();
    }
}

fn execute<P, V, F>(factory: &F, id: JobId<P>, arguments: Arguments<V>) -> Outcome<V>
where
    P: Phase,
    F: JobFactory<P, V> + ?Sized,
{
    let started = Instant::now();
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        let job = factory.create(id, arguments);
        trace!(job = %job.label(), "job running");
        job.run()
    }));
    let elapsed = started.elapsed();

    let result = match result {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(source)) => Err(Error::JobFailed {
            job: id.to_string(),
            source,
        }),
        Err(payload) => Err(Error::JobPanicked {
            job: id.to_string(),
            message: panic_message(payload.as_ref()),
        }),
    };
    Outcome { result, elapsed }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
