use anyhow::{Context, Result};
use clap::Parser;
use gyre_config::{AhrsKind, Parameters, SchedPolicy};
use gyre_icc::{ShutdownReason, ShutdownSignal, install_interrupt_handler};
use std::path::PathBuf;
use std::process::ExitCode;
use subscriber_engine::{ConsoleSink, Subscriber};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "gyre-sub")]
#[command(about = "Receive IMU samples from a gyre publisher and print attitude", long_about = None)]
struct Args {
    /// TOML file with base parameters; flags below override it
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Publisher's well-known socket path
    #[arg(short, long)]
    socket_path: Option<PathBuf>,

    /// Expected sample rate in Hz, used by the orientation filter
    #[arg(short, long)]
    frequency_hz: Option<u32>,

    /// Give up when no sample arrives within this many milliseconds (0 waits forever)
    #[arg(short, long)]
    timeout_ms: Option<u64>,

    /// Orientation filter: none, madgwick or simple
    #[arg(short, long)]
    ahrs: Option<AhrsKind>,

    /// Log filter when RUST_LOG is unset (e.g. "info", "subscriber_engine=debug")
    #[arg(long)]
    log_level: Option<String>,

    /// Lock memory and run the loop under a real-time policy
    #[arg(long)]
    real_time: bool,

    /// Real-time priority
    #[arg(long)]
    priority: Option<i32>,

    /// Scheduling policy: fifo, rr or other
    #[arg(long)]
    policy: Option<SchedPolicy>,
}

impl Args {
    fn parameters(&self) -> Result<Parameters> {
        let mut params = match &self.config {
            Some(path) => Parameters::load(path.display().to_string())
                .with_context(|| format!("loading {}", path.display()))?,
            None => Parameters::default(),
        };
        if let Some(path) = &self.socket_path {
            params.socket_path = path.clone();
        }
        if let Some(hz) = self.frequency_hz {
            params.frequency_hz = hz;
        }
        if let Some(ms) = self.timeout_ms {
            params.timeout_ms = ms;
        }
        if let Some(kind) = self.ahrs {
            params.ahrs = kind;
        }
        if let Some(level) = &self.log_level {
            params.log_level = level.clone();
        }
        if self.real_time {
            params.thread.real_time = true;
        }
        if let Some(priority) = self.priority {
            params.thread.priority = priority;
        }
        if let Some(policy) = self.policy {
            params.thread.policy = policy;
        }
        params.validate().context("invalid parameters")?;
        Ok(params)
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_thread_names(true)
        .init();
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    let params = args.parameters()?;
    init_tracing(&params.log_level);

    let shutdown = ShutdownSignal::new();
    install_interrupt_handler(&shutdown).context("installing interrupt handler")?;

    let subscriber = Subscriber::initialise(&params, ConsoleSink::new(), shutdown.clone())
        .context("subscriber startup failed")?;
    info!(
        path = %subscriber.local_path().display(),
        publisher = %params.socket_path.display(),
        ahrs = %params.ahrs,
        timeout_ms = params.timeout_ms,
        "subscriber ready"
    );

    let mut handle = subscriber.start().context("starting subscriber loop")?;
    let reason = shutdown.wait();
    info!(%reason, "shutting down");

    if let Some(mut subscriber) = handle.stop() {
        subscriber.close();
    }

    Ok(match reason {
        ShutdownReason::Interrupted => ExitCode::SUCCESS,
        ShutdownReason::PublisherTimeout => {
            error!(timeout_ms = params.timeout_ms, "no data from publisher");
            ExitCode::FAILURE
        }
    })
}
