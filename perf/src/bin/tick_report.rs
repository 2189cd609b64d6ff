//! Runs a publisher and one filtering subscriber in-process over a real
//! socket and prints per-stage timings, arrival jitter and resource usage.
//!
//! ```bash
//! cargo run -p gyre-perf --release --bin tick_report -- --seconds 10 --frequency-hz 1000
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use gyre_config::{AhrsKind, Parameters};
use gyre_icc::ShutdownSignal;
use gyre_perf::report::{print_budget, print_publisher_report, print_subscriber_report, stage_results};
use gyre_perf::*;
use publisher_core::SyntheticSource;
use publisher_engine::Publisher;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use subscriber_engine::{ChannelSink, Subscriber};

#[derive(Parser, Debug)]
#[command(name = "tick_report", about = "Per-stage timing of the publisher/subscriber loops")]
struct Args {
    /// How long to run
    #[arg(long, default_value_t = 5)]
    seconds: u64,

    #[arg(long, default_value_t = 500)]
    frequency_hz: u32,

    /// none, madgwick or simple
    #[arg(long, default_value = "madgwick")]
    ahrs: AhrsKind,

    /// Where to write the JSON results
    #[arg(long, default_value = "target/gyre_tick_report.json")]
    out: PathBuf,
}

#[derive(serde::Serialize)]
struct Report {
    frequency_hz: u32,
    ahrs: String,
    publisher_stages: Vec<BenchResult>,
    subscriber_stages: Vec<BenchResult>,
    arrival_interval: Option<Stats>,
    ticks: u64,
    overruns: u64,
    samples: u64,
    discarded: u64,
    rusage_start: ResourceSnapshot,
    rusage_end: ResourceSnapshot,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let rusage_start = capture_rusage();

    let path = temp_socket_path("tick_report");
    let params = Parameters {
        socket_path: path.into(),
        frequency_hz: args.frequency_hz,
        timeout_ms: 1_000,
        ahrs: args.ahrs,
        ..Parameters::default()
    };
    let period = params.tick_period()?;

    section_header(&format!(
        "GYRE TICK REPORT  ({} Hz, ahrs={}, {} s)",
        args.frequency_hz, args.ahrs, args.seconds
    ));

    let source = SyntheticSource::new(period).with_gyro_bias([250.0, -150.0, 100.0]);
    let publisher = Publisher::initialise(&params, source).context("publisher startup")?;
    let mut pub_handle = publisher.start()?;

    let (tx, rx) = crossbeam::channel::unbounded();
    let shutdown = ShutdownSignal::new();
    let subscriber = Subscriber::initialise(&params, ChannelSink::new(tx), shutdown.clone())
        .context("subscriber startup")?;
    let mut sub_handle = subscriber.start()?;

    let deadline = Instant::now() + Duration::from_secs(args.seconds);
    let mut arrivals = Vec::with_capacity((args.seconds * args.frequency_hz as u64) as usize);
    while Instant::now() < deadline && !shutdown.is_triggered() {
        if let Ok(sample) = rx.recv_timeout(Duration::from_millis(100)) {
            arrivals.push(sample.received_at);
        }
    }

    let subscriber = sub_handle.stop().context("subscriber loop panicked")?;
    let mut publisher = pub_handle.stop().context("publisher loop panicked")?;
    publisher.close();

    print_publisher_report(publisher.perf());
    print_budget(publisher.perf(), period.as_nanos() as u64);
    print_subscriber_report(subscriber.perf());

    let arrival_interval = compute_stats(&mut intervals_ns(&arrivals));
    if let Some(stats) = &arrival_interval {
        println!("\n  Arrival Interval (period {}):\n", format_ns(period.as_nanos() as f64));
        print_table_header();
        print_result_row(&BenchResult {
            name: "sample arrival".into(),
            unit: "ns".into(),
            stats: stats.clone(),
        });
    }

    let pub_stats = publisher.stats();
    let sub_stats = subscriber.stats();
    let rusage_end = capture_rusage();
    println!("\n  Counters:\n");
    println!("    ticks {}  overruns {}", pub_stats.ticks, pub_stats.overruns);
    println!("    samples {}  discarded {}", sub_stats.samples, sub_stats.discarded);
    println!(
        "    ctx switches vol {}  invol {}  major faults {}",
        rusage_end.vol_ctx_switches - rusage_start.vol_ctx_switches,
        rusage_end.invol_ctx_switches - rusage_start.invol_ctx_switches,
        rusage_end.major_faults - rusage_start.major_faults,
    );

    let report = Report {
        frequency_hz: args.frequency_hz,
        ahrs: args.ahrs.to_string(),
        publisher_stages: stage_results(publisher.perf()),
        subscriber_stages: stage_results(subscriber.perf()),
        arrival_interval,
        ticks: pub_stats.ticks,
        overruns: pub_stats.overruns,
        samples: sub_stats.samples,
        discarded: sub_stats.discarded,
        rusage_start,
        rusage_end,
    };
    if let Some(dir) = args.out.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(&args.out, serde_json::to_string_pretty(&report)?)
        .with_context(|| format!("writing {}", args.out.display()))?;
    println!("\n  results written to {}", args.out.display());
    Ok(())
}
