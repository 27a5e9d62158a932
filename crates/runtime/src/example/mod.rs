//! A small six-phase pipeline exercising every scheduler feature.
//!
//! ```text
//!            +-----> BED ---(1)--> BED
//!            |
//! INCR -> DANGLING -> COMPLEX
//!  |   (1)   |          |
//!  +-------> +-------> MERGE -> OUT ---(1)--> OUT
//! ```
//!
//! `DANGLING` at chunk `t` consumes `INCR` at both `t - 1` and `t`. `BED`
//! and `OUT` are sinks that write in chunk order because each depends on
//! its own previous chunk. Every job records its identifier and its
//! arguments, so the two sink buffers capture the complete schedule in a
//! form that must be identical across runs and thread counts.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::dag::{Dependencies, Ordering};
use crate::error::{JobFailure, Result};
use crate::executor::{RunOptions, RunReport, Scheduler};
use crate::job::{absent_or_single, Arguments, Contract, Job, JobFactory, JobResult};
use crate::types::{JobId, Phase};

/// Phases of the example pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExamplePhase {
    /// Entry phase, admitted chunk by chunk.
    Incr,
    /// Consumes `INCR` of the previous and the current chunk.
    Dangling,
    /// Single-input stage between `DANGLING` and `MERGE`.
    Complex,
    /// Joins `DANGLING` and `COMPLEX` of the same chunk.
    Merge,
    /// Side sink fed by `DANGLING`, ordered by its own previous chunk.
    Bed,
    /// Terminal sink. Gets the flush job after the drain chunk.
    Out,
}

impl fmt::Display for ExamplePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExamplePhase::Incr => "INCR",
            ExamplePhase::Dangling => "DANGLING",
            ExamplePhase::Complex => "COMPLEX",
            ExamplePhase::Merge => "MERGE",
            ExamplePhase::Bed => "BED",
            ExamplePhase::Out => "OUT",
        };
        f.write_str(name)
    }
}

impl Phase for ExamplePhase {
    const ALL: &'static [Self] = &[
        ExamplePhase::Incr,
        ExamplePhase::Dangling,
        ExamplePhase::Complex,
        ExamplePhase::Merge,
        ExamplePhase::Bed,
        ExamplePhase::Out,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

/// Values exchanged between example phases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExampleValue {
    /// Rendered identifier and arguments of the producing job.
    Label(String),
}

impl fmt::Display for ExampleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExampleValue::Label(label) => f.write_str(label),
        }
    }
}

fn is_label(value: &ExampleValue) -> bool {
    matches!(value, ExampleValue::Label(_))
}

impl Contract<ExampleValue> for ExamplePhase {
    fn valid_arguments(&self, arguments: &[Option<Arc<JobResult<ExampleValue>>>]) -> bool {
        match self {
            ExamplePhase::Incr => arguments.is_empty(),
            ExamplePhase::Complex => {
                arguments.len() == 1 && absent_or_single(&arguments[0], is_label)
            }
            ExamplePhase::Dangling | ExamplePhase::Merge => {
                arguments.len() == 2
                    && arguments
                        .iter()
                        .all(|argument| absent_or_single(argument, is_label))
            }
            // The previous sink job never produces anything.
            ExamplePhase::Bed | ExamplePhase::Out => {
                arguments.len() == 2
                    && arguments[0].is_none()
                    && absent_or_single(&arguments[1], is_label)
            }
        }
    }

    fn valid_result(&self, result: Option<&JobResult<ExampleValue>>) -> bool {
        match self {
            ExamplePhase::Bed | ExamplePhase::Out => result.is_none(),
            _ => result.is_some_and(|result| result.len() == 1),
        }
    }
}

/// The example ordering, frozen.
pub fn example_ordering() -> Result<Arc<Ordering<ExamplePhase>>> {
    use ExamplePhase::*;

    let mut ordering = Ordering::new(Incr, Out);
    for (from, distance, to) in [
        (Incr, 1, Dangling),
        (Incr, 0, Dangling),
        (Bed, 1, Bed),
        (Dangling, 0, Bed),
        (Dangling, 0, Complex),
        (Dangling, 0, Merge),
        (Complex, 0, Merge),
        (Out, 1, Out),
        (Merge, 0, Out),
    ] {
        ordering.set_link(from, distance, to)?;
    }
    ordering.freeze()?;
    Ok(Arc::new(ordering))
}

fn render(arguments: &Arguments<ExampleValue>) -> String {
    arguments
        .iter()
        .map(|argument| match argument {
            Some(result) => result.to_string(),
            None => "null".to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Job factory recording every job into labels and sink buffers.
#[derive(Debug, Default)]
pub struct ExampleJobFactory {
    bed: Mutex<String>,
    out: Mutex<String>,
    /// Job whose execution fails, for exercising aborts.
    failing: Option<JobId<ExamplePhase>>,
}

impl ExampleJobFactory {
    /// Factory whose jobs all succeed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory whose job `id` fails when run.
    pub fn failing_at(id: JobId<ExamplePhase>) -> Self {
        Self {
            failing: Some(id),
            ..Self::default()
        }
    }

    /// Everything the `BED` sink wrote.
    pub fn bed_output(&self) -> String {
        self.bed.lock().clone()
    }

    /// Everything the `OUT` sink wrote.
    pub fn out_output(&self) -> String {
        self.out.lock().clone()
    }
}

impl JobFactory<ExamplePhase, ExampleValue> for ExampleJobFactory {
    fn create(
        &self,
        id: JobId<ExamplePhase>,
        arguments: Arguments<ExampleValue>,
    ) -> Box<dyn Job<ExampleValue> + '_> {
        let sink = match id.phase() {
            ExamplePhase::Bed => Some(&self.bed),
            ExamplePhase::Out => Some(&self.out),
            _ => None,
        };
        Box::new(ExampleJob {
            id,
            arguments,
            sink,
            fail: self.failing == Some(id),
        })
    }
}

struct ExampleJob<'f> {
    id: JobId<ExamplePhase>,
    arguments: Arguments<ExampleValue>,
    sink: Option<&'f Mutex<String>>,
    fail: bool,
}

impl Job<ExampleValue> for ExampleJob<'_> {
    fn label(&self) -> String {
        self.id.to_string()
    }

    fn run(self: Box<Self>) -> std::result::Result<Option<JobResult<ExampleValue>>, JobFailure> {
        if self.fail {
            return Err(format!("{} failed on purpose", self.id).into());
        }
        let arguments = render(&self.arguments);
        match self.sink {
            Some(sink) => {
                sink.lock().push_str(&format!("{} [{arguments}]\n", self.id));
                Ok(None)
            }
            None => Ok(Some(JobResult::single(ExampleValue::Label(format!(
                "{}({arguments})",
                self.id
            ))))),
        }
    }
}

/// Run the example pipeline over `number_chunks` chunks.
///
/// Returns the run report together with the `BED` and `OUT` sink contents.
pub fn run_example(
    number_chunks: usize,
    options: RunOptions,
) -> Result<(RunReport<ExamplePhase>, String, String)> {
    let dependencies = Dependencies::new(example_ordering()?, number_chunks)?;
    let factory = ExampleJobFactory::new();
    let report = Scheduler::new(dependencies, &factory, options)?.run()?;
    Ok((report, factory.bed_output(), factory.out_output()))
}
