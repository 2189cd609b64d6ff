pub mod report;

use gyre_events::ImuPayload;
use std::time::Instant;

// ─── Statistics ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Stats {
    pub min: u64,
    pub max: u64,
    pub mean: f64,
    pub stddev: f64,
    pub p50: u64,
    pub p90: u64,
    pub p99: u64,
    pub p999: u64,
    pub count: usize,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct BenchResult {
    pub name: String,
    pub unit: String,
    pub stats: Stats,
}

/// Sorts `samples` in place and summarizes them. `None` for an empty set.
pub fn compute_stats(samples: &mut [u64]) -> Option<Stats> {
    if samples.is_empty() {
        return None;
    }
    samples.sort_unstable();

    let count = samples.len();
    let sum: u128 = samples.iter().map(|&x| x as u128).sum();
    let mean = sum as f64 / count as f64;

    let variance = samples
        .iter()
        .map(|&x| {
            let diff = x as f64 - mean;
            diff * diff
        })
        .sum::<f64>()
        / count as f64;

    Some(Stats {
        min: samples[0],
        max: samples[count - 1],
        mean,
        stddev: variance.sqrt(),
        p50: percentile_sorted(samples, 50.0),
        p90: percentile_sorted(samples, 90.0),
        p99: percentile_sorted(samples, 99.0),
        p999: percentile_sorted(samples, 99.9),
        count,
    })
}

/// Nearest-rank percentile of an already sorted, non-empty slice.
pub fn percentile_sorted(sorted: &[u64], pct: f64) -> u64 {
    let len = sorted.len();
    if len == 1 {
        return sorted[0];
    }
    let rank = (pct / 100.0 * len as f64).ceil() as usize;
    let idx = rank.saturating_sub(1).min(len - 1);
    sorted[idx]
}

/// Differences between consecutive instants, in nanoseconds.
pub fn intervals_ns(instants: &[Instant]) -> Vec<u64> {
    instants
        .windows(2)
        .map(|w| w[1].duration_since(w[0]).as_nanos() as u64)
        .collect()
}

// ─── Resource Usage ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ResourceSnapshot {
    pub max_rss_bytes: i64,
    pub minor_faults: i64,
    pub major_faults: i64,
    pub vol_ctx_switches: i64,
    pub invol_ctx_switches: i64,
}

pub fn capture_rusage() -> ResourceSnapshot {
    // SAFETY: rusage is plain old data, zero is a valid bit pattern
    let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
    // SAFETY: usage is a valid out-pointer for the duration of the call
    if unsafe { libc::getrusage(libc::RUSAGE_SELF, &mut usage) } != 0 {
        return ResourceSnapshot::default();
    }
    ResourceSnapshot {
        max_rss_bytes: usage.ru_maxrss * 1024,
        minor_faults: usage.ru_minflt,
        major_faults: usage.ru_majflt,
        vol_ctx_switches: usage.ru_nvcsw,
        invol_ctx_switches: usage.ru_nivcsw,
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────────

pub fn temp_socket_path(label: &str) -> String {
    let pid = std::process::id();
    format!("/tmp/gyre_bench_{label}_{pid}")
}

/// A level, stationary reading with a little rotation on every axis.
pub fn make_test_payload() -> ImuPayload {
    ImuPayload {
        acc_x: 12.0,
        acc_y: -8.0,
        acc_z: 998.0,
        acc_timestamp_ms: 1_000,
        gyro_x: 1_500.0,
        gyro_y: -700.0,
        gyro_z: 300.0,
        gyro_timestamp_ms: 1_000,
        mag_x: 410.0,
        mag_y: 15.0,
        mag_z: -290.0,
        mag_timestamp_ms: 1_000,
    }
}

pub fn format_ns(ns: f64) -> String {
    let abs = ns.abs();
    if abs >= 1_000_000.0 {
        format!("{:.2} ms", ns / 1_000_000.0)
    } else if abs >= 1_000.0 {
        format!("{:.1} us", ns / 1_000.0)
    } else {
        format!("{:.0} ns", ns)
    }
}

pub fn print_result_row(r: &BenchResult) {
    println!(
        "  {:<30} {:>10} {:>10} {:>10} {:>10} {:>10} {:>8}",
        r.name,
        format_ns(r.stats.min as f64),
        format_ns(r.stats.p50 as f64),
        format_ns(r.stats.p90 as f64),
        format_ns(r.stats.p99 as f64),
        format_ns(r.stats.max as f64),
        r.stats.count,
    );
}

pub fn print_table_header() {
    println!(
        "  {:<30} {:>10} {:>10} {:>10} {:>10} {:>10} {:>8}",
        "Measurement", "min", "p50", "p90", "p99", "max", "count",
    );
    println!("  {}", "─".repeat(94));
}

pub fn section_header(title: &str) {
    println!("\n{}", "─".repeat(90));
    println!("  {title}");
    println!("{}\n", "─".repeat(90));
}
