//! Strand Run - Drives the example pipeline through the scheduler
//!
//! This binary runs the six-phase example pipeline over a number of chunks,
//! optionally repeats the run to check that the sink output is identical
//! every time, and prints the run report.

use clap::Parser;
use strand_runtime::RunOptions;
use strand_runtime::example::run_example;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "strand-run")]
#[command(about = "Run the example pipeline through the chunked scheduler")]
struct Cli {
    /// Number of chunks to process
    #[arg(long, default_value = "100")]
    chunks: usize,

    /// Worker threads (defaults to available parallelism)
    #[arg(long)]
    threads: Option<usize>,

    /// Entry chunks admitted past the oldest unfinished one
    #[arg(long, default_value = "2")]
    look_ahead: usize,

    /// Run this many times and verify the output never changes
    #[arg(long, default_value = "1")]
    repeat: usize,

    /// Print the per-phase timing table
    #[arg(long)]
    stats: bool,

    /// Print the run report as JSON
    #[arg(long)]
    json: bool,

    /// Print the BED and OUT sink contents
    #[arg(long)]
    output: bool,
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "strand_run=info,strand_runtime=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let options = RunOptions {
        threads: cli.threads.unwrap_or(RunOptions::default().threads),
        look_ahead: cli.look_ahead,
    };
    if let Err(e) = options.validate() {
        error!("{}", e);
        std::process::exit(1);
    }

    info!(
        "Running example pipeline: {} chunks, {} threads, look-ahead {}",
        cli.chunks, options.threads, options.look_ahead
    );

    let mut first: Option<(String, String)> = None;
    let mut last_report = None;
    for attempt in 1..=cli.repeat.max(1) {
        let (report, bed, out) = match run_example(cli.chunks, options) {
            Ok(result) => result,
            Err(e) => {
                error!("Run {} failed: {}", attempt, e);
                std::process::exit(1);
            }
        };

        match &first {
            None => first = Some((bed, out)),
            Some((first_bed, first_out)) => {
                if *first_bed != bed || *first_out != out {
                    error!("Run {} produced different sink output than run 1", attempt);
                    std::process::exit(1);
                }
            }
        }
        info!(
            "Run {}: {} jobs in {:.3} ms",
            attempt,
            report.jobs,
            report.elapsed.as_secs_f64() * 1e3
        );
        last_report = Some(report);
    }

    let Some(report) = last_report else {
        return;
    };
    if cli.repeat > 1 {
        info!("All {} runs produced identical output", cli.repeat);
    }
    info!(
        "Peak chunks in flight: {}, peak retained results: {}, peak ready jobs: {}",
        report.max_in_flight_chunks, report.max_retained, report.max_ready
    );

    if cli.output
        && let Some((bed, out)) = &first
    {
        println!("# BED\n{bed}# OUT\n{out}");
    }
    if cli.stats {
        println!("{}", report.statistics);
    }
    if cli.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                error!("Failed to serialize run report: {}", e);
                std::process::exit(1);
            }
        }
    }
}
