//! Scheduler benchmarks
//!
//! Measures:
//! - Ready queue throughput with a sliding window of chunks
//! - End-to-end runs of the example pipeline across thread counts and
//!   look-ahead settings

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

use strand_runtime::example::{ExamplePhase, example_ordering, run_example};
use strand_runtime::{Dependencies, Phase, ReadyQueue, RunOptions, Unbounded};

/// Feed a queue the way the scheduler does: a few chunks ahead of the
/// oldest, draining as it goes.
fn bench_ready_queue(c: &mut Criterion) {
    let mut group = c.benchmark_group("ready_queue");
    let number_chunks = 2_000;
    let dependencies = Dependencies::new(example_ordering().unwrap(), number_chunks).unwrap();

    for window in [1, 4, 16] {
        group.throughput(Throughput::Elements(
            (number_chunks * ExamplePhase::ALL.len()) as u64,
        ));
        group.bench_with_input(BenchmarkId::from_parameter(window), &window, |b, &window| {
            b.iter(|| {
                let mut queue = ReadyQueue::new();
                for time in 0..number_chunks {
                    for phase in ExamplePhase::ALL {
                        queue.add(dependencies.id(time, *phase).unwrap());
                    }
                    if time >= window {
                        for _ in 0..ExamplePhase::ALL.len() {
                            black_box(queue.next(&Unbounded));
                        }
                    }
                }
                while let Some(id) = queue.next(&Unbounded) {
                    black_box(id);
                }
            });
        });
    }
    group.finish();
}

fn bench_example_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("example_run");
    group.sample_size(20);
    let number_chunks = 500;

    for threads in [1, 2, 4] {
        for look_ahead in [1, 4] {
            let options = RunOptions {
                threads,
                look_ahead,
            };
            group.bench_with_input(
                BenchmarkId::new(format!("threads_{threads}"), look_ahead),
                &options,
                |b, options| {
                    b.iter(|| black_box(run_example(number_chunks, *options).unwrap()));
                },
            );
        }
    }
    group.finish();
}

criterion_group!(benches, bench_ready_queue, bench_example_run);
criterion_main!(benches);
