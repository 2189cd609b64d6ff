use crate::{BenchResult, compute_stats, format_ns};
use gyre_perf_recorder::{PerfRecorder, PerfStage};

/// Publisher loop stages, total last.
pub const PUBLISHER_STAGES: [PerfStage; 4] = [
    PerfStage::DrainRegistrations,
    PerfStage::ReadSample,
    PerfStage::Broadcast,
    PerfStage::PublisherTick,
];

/// Subscriber loop stages, total last. `Receive` includes the wait for the
/// next tick, so it dominates the total by construction.
pub const SUBSCRIBER_STAGES: [PerfStage; 4] = [
    PerfStage::Receive,
    PerfStage::FilterUpdate,
    PerfStage::Emit,
    PerfStage::SubscriberTotal,
];

/// Every non-empty stage of `recorder` as a result row.
pub fn stage_results(recorder: &PerfRecorder) -> Vec<BenchResult> {
    PerfStage::ALL
        .iter()
        .filter_map(|&stage| {
            let mut samples = recorder.samples(stage).to_vec();
            let stats = compute_stats(&mut samples)?;
            Some(BenchResult {
                name: stage.label().to_string(),
                unit: "ns".to_string(),
                stats,
            })
        })
        .collect()
}

fn p50_of(recorder: &PerfRecorder, stage: PerfStage) -> u64 {
    let mut v = recorder.samples(stage).to_vec();
    compute_stats(&mut v).map_or(0, |s| s.p50)
}

pub fn print_stage_table(recorder: &PerfRecorder, stages: &[PerfStage], total_stage: PerfStage) {
    println!(
        "  {:<22} {:>10} {:>10} {:>10} {:>10} {:>10} {:>8}  {:>6}",
        "Stage", "p50", "p90", "p99", "p99.9", "max", "count", "% tot"
    );
    println!("  {}", "\u{2500}".repeat(96));

    let total_p50 = p50_of(recorder, total_stage);

    for &stage in stages {
        let mut v = recorder.samples(stage).to_vec();
        let Some(stats) = compute_stats(&mut v) else {
            continue;
        };
        let pct = if stage == total_stage {
            "100%".to_string()
        } else if total_p50 > 0 {
            format!("{:.0}%", stats.p50 as f64 / total_p50 as f64 * 100.0)
        } else {
            "-".to_string()
        };
        println!(
            "  {:<22} {:>10} {:>10} {:>10} {:>10} {:>10} {:>8}  {:>6}",
            stage.label(),
            format_ns(stats.p50 as f64),
            format_ns(stats.p90 as f64),
            format_ns(stats.p99 as f64),
            format_ns(stats.p999 as f64),
            format_ns(stats.max as f64),
            stats.count,
            pct
        );
    }
}

pub fn print_publisher_report(recorder: &PerfRecorder) {
    println!("\n  Publisher Per-Stage Timing:\n");
    print_stage_table(recorder, &PUBLISHER_STAGES, PerfStage::PublisherTick);
}

pub fn print_subscriber_report(recorder: &PerfRecorder) {
    println!("\n  Subscriber Per-Stage Timing:\n");
    print_stage_table(recorder, &SUBSCRIBER_STAGES, PerfStage::SubscriberTotal);
}

/// Headroom left in each tick: the period minus the publisher's p99 work.
pub fn print_budget(recorder: &PerfRecorder, period_ns: u64) {
    let mut v = recorder.samples(PerfStage::PublisherTick).to_vec();
    let Some(stats) = compute_stats(&mut v) else {
        return;
    };
    println!("\n  Tick Budget:\n");
    println!("    period:        {}", format_ns(period_ns as f64));
    println!("    tick p99:      {}", format_ns(stats.p99 as f64));
    println!(
        "    headroom p99:  {:.1}%",
        (period_ns as f64 - stats.p99 as f64) / period_ns as f64 * 100.0
    );
    let over = recorder
        .samples(PerfStage::PublisherTick)
        .iter()
        .filter(|&&ns| ns >= period_ns)
        .count();
    println!("    over budget:   {over} of {}", stats.count);
}
