//! Integration tests for end-to-end scheduling.
//!
//! These tests run whole pipelines through the scheduler and verify the
//! recorded execution against the declared links:
//! Declare links → Freeze → Run → Verify

use proptest::prelude::*;
use strand_runtime::example::{ExamplePhase, example_ordering, run_example};
use strand_runtime::{Dependencies, Error, Phase, RunOptions};
use strand_tests::{Stage, TestHarness, chain_links};

fn options(threads: usize, look_ahead: usize) -> RunOptions {
    RunOptions {
        threads,
        look_ahead,
    }
}

/// The example pipeline writes the same sink output no matter how the
/// work is spread over threads.
#[test]
fn test_example_output_is_deterministic() {
    let (_, bed, out) = run_example(5, options(1, 2)).unwrap();
    assert_eq!(bed.lines().count(), 6);
    assert_eq!(out.lines().count(), 7);

    for _ in 0..5 {
        for threads in [2, 4, 8] {
            let (_, again_bed, again_out) = run_example(5, options(threads, 2)).unwrap();
            assert_eq!(again_bed, bed);
            assert_eq!(again_out, out);
        }
    }
}

/// Sinks receive the previous sink job as their first argument, which is
/// always empty, and their producer as the second.
#[test]
fn test_example_sink_lines() {
    let (_, bed, out) = run_example(2, options(2, 1)).unwrap();

    for line in bed.lines() {
        assert!(line.contains(" [null, [DANGLING@"), "{line}");
    }
    let last = out.lines().last().unwrap();
    assert_eq!(last, "OUT@3 [null, null]");
}

#[test]
fn test_example_statistics_cover_every_job() {
    let (report, _, _) = run_example(10, options(3, 2)).unwrap();
    let dependencies = Dependencies::new(example_ordering().unwrap(), 10).unwrap();

    assert_eq!(report.jobs, dependencies.job_count());
    assert_eq!(report.statistics.total_count() as usize, report.jobs);
    assert_eq!(report.statistics.count(ExamplePhase::Incr), 11);
    assert_eq!(report.statistics.count(ExamplePhase::Out), 12);
}

/// Test that a plain chain runs every job once and in dependency order.
#[test]
fn test_chain_is_consistent() {
    let harness = TestHarness::from_links(Stage::Source, Stage::Sink, &chain_links());
    for threads in [1, 4] {
        let recording = harness.run(20, options(threads, 3));
        harness.assert_consistent(20, &recording);
    }
}

/// Without a link reaching back in time into the terminal stage there is
/// no flush job.
#[test]
fn test_chain_has_no_flush_job() {
    let harness = TestHarness::from_links(Stage::Source, Stage::Sink, &chain_links());
    let dependencies = harness.dependencies(4);
    assert_eq!(dependencies.job_count(), Stage::ALL.len() * 5);
    assert!(dependencies.id(5, Stage::Sink).is_err());
}

/// Links reaching three chunks back, a diamond within the chunk and an
/// entry stage that depends on its own previous chunk.
fn wide_links() -> Vec<(Stage, usize, Stage)> {
    vec![
        (Stage::Source, 1, Stage::Source),
        (Stage::Source, 0, Stage::A),
        (Stage::Source, 0, Stage::B),
        (Stage::A, 3, Stage::B),
        (Stage::A, 0, Stage::C),
        (Stage::B, 0, Stage::C),
        (Stage::C, 2, Stage::D),
        (Stage::C, 0, Stage::D),
        (Stage::Sink, 1, Stage::Sink),
        (Stage::D, 0, Stage::Sink),
        (Stage::B, 2, Stage::Sink),
    ]
}

#[test]
fn test_wide_pipeline_is_consistent() {
    let harness = TestHarness::from_links(Stage::Source, Stage::Sink, &wide_links());
    assert_eq!(harness.ordering().delta(), 3);

    for threads in [1, 2, 6] {
        for look_ahead in [1, 2, 7] {
            let recording = harness.run(30, options(threads, look_ahead));
            harness.assert_consistent(30, &recording);
        }
    }
}

#[test]
fn test_wide_pipeline_respects_look_ahead() {
    let harness = TestHarness::from_links(Stage::Source, Stage::Sink, &wide_links());
    let delta = harness.ordering().delta();

    for look_ahead in [1, 2, 5] {
        let recording = harness.run(60, options(4, look_ahead));
        assert!(
            recording.report.max_in_flight_chunks <= look_ahead + delta,
            "look_ahead={look_ahead} in_flight={}",
            recording.report.max_in_flight_chunks
        );
        // Results never pile up for the whole run
        assert!(recording.report.max_retained < recording.events.len() / 2);
    }
}

/// Entry jobs are still admitted in order even when a predecessor in the
/// previous chunk finished long ago.
#[test]
fn test_entry_jobs_start_in_chunk_order() {
    let harness = TestHarness::from_links(Stage::Source, Stage::Sink, &wide_links());
    let recording = harness.run(25, options(4, 4));
    let starts: Vec<usize> = recording
        .events
        .iter()
        .filter(|event| event.id.phase() == Stage::Source)
        .map(|event| event.id.time())
        .collect();
    assert_eq!(starts, (0..=25).collect::<Vec<_>>());
}

#[test]
fn test_unfrozen_ordering_is_rejected() {
    let ordering = std::sync::Arc::new(strand_runtime::Ordering::<Stage>::new(Stage::Source, Stage::Sink));
    assert!(matches!(
        Dependencies::new(ordering, 3),
        Err(Error::OrderingNotFrozen)
    ));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_any_configuration_is_consistent(
        chunks in 0usize..40,
        threads in 1usize..5,
        look_ahead in 1usize..6,
    ) {
        let harness = TestHarness::from_links(Stage::Source, Stage::Sink, &wide_links());
        let recording = harness.run(chunks, options(threads, look_ahead));
        harness.assert_consistent(chunks, &recording);
        prop_assert_eq!(recording.report.jobs, harness.dependencies(chunks).job_count());
    }
}
