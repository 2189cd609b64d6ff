use anyhow::{Context, Result, bail, ensure};
use clap::{Parser, ValueEnum};
use gyre_config::{Parameters, SchedPolicy};
use gyre_icc::{ShutdownSignal, install_interrupt_handler};
use publisher_core::{DataSource, RandomSource, SyntheticSource};
use publisher_engine::Publisher;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const STATUS_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SourceKind {
    /// Uniformly random readings
    Random,
    /// Level, stationary device with an optional gyro bias
    Synthetic,
}

#[derive(Parser, Debug)]
#[command(name = "gyre-pub")]
#[command(about = "Broadcast IMU samples to local subscribers at a fixed rate", long_about = None)]
struct Args {
    /// TOML file with base parameters; flags below override it
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Well-known socket path subscribers register with
    #[arg(short, long)]
    socket_path: Option<PathBuf>,

    /// Broadcast rate in Hz
    #[arg(short, long)]
    frequency_hz: Option<u32>,

    /// Sample source
    #[arg(long, value_enum, default_value_t = SourceKind::Random)]
    source: SourceKind,

    /// Synthetic source gyro bias in milli-degrees/s, as x,y,z
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
    gyro_bias: Vec<f32>,

    /// Log filter when RUST_LOG is unset (e.g. "info", "gyre_icc=debug")
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

    fn source(&self, params: &Parameters) -> Result<Box<dyn DataSource>> {
        match self.source {
            SourceKind::Random => Ok(Box::new(RandomSource::new())),
            SourceKind::Synthetic => {
                let mut source = SyntheticSource::new(params.tick_period()?);
                if !self.gyro_bias.is_empty() {
                    ensure!(self.gyro_bias.len() == 3, "--gyro-bias takes exactly three values");
                    source = source.with_gyro_bias([self.gyro_bias[0], self.gyro_bias[1], self.gyro_bias[2]]);
                }
                Ok(Box::new(source))
            }
        }
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    let params = args.parameters()?;
    init_tracing(&params.log_level);

    let shutdown = ShutdownSignal::new();
    install_interrupt_handler(&shutdown).context("installing interrupt handler")?;

    let source = args.source(&params)?;
    let publisher = Publisher::initialise(&params, source).context("publisher startup failed")?;
    info!(
        path = %publisher.local_path().display(),
        frequency_hz = params.frequency_hz,
        source = ?args.source,
        real_time = params.thread.real_time,
        "publisher ready"
    );

    let mut handle = publisher.start().context("starting publisher loop")?;

    let reason = loop {
        if let Some(reason) = shutdown.wait_timeout(STATUS_INTERVAL) {
            break reason;
        }
        if !handle.is_running() {
            bail!("publisher loop exited unexpectedly");
        }
        info!(subscribers = handle.subscriber_count(), "status");
    };
    info!(%reason, "shutting down");

    match handle.stop() {
        Some(mut publisher) => publisher.close(),
        None => {
            warn!("publisher loop did not return cleanly");
            bail!("publisher loop panicked");
        }
    }
    Ok(())
}
