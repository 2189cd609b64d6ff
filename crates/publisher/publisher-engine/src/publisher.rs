use crate::error::PublisherError;
use crate::pacing::sleep_budget;
use gyre_config::{Parameters, ThreadParams};
use gyre_events::{REGISTRATION_TOKEN, is_registration};
use gyre_icc::{BroadcastReport, DatagramEndpoint, LoopThread, RunFlag, SubscriberRegistry, spawn_loop};
use gyre_perf_recorder::{PerfRecorder, PerfStage};
use publisher_core::DataSource;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Upper bound on registration datagrams consumed in one tick, so a flood of
/// registrations cannot starve the broadcast.
pub const MAX_REGISTRATIONS_PER_TICK: usize = 32;

// Large enough to tell a token from a longer datagram that merely starts with it.
const REGISTRATION_BUF: usize = REGISTRATION_TOKEN.len() * 2;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublisherStats {
    pub ticks: u64,
    pub overruns: u64,
    pub registrations: u64,
    pub evictions: u64,
    pub short_sends: u64,
    pub failed_sends: u64,
}

/// What one tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub registrations: usize,
    pub broadcast: BroadcastReport,
    pub elapsed: Duration,
    /// Time left in the period, `None` on overrun.
    pub sleep: Option<Duration>,
}

/// Fixed-rate sample broadcaster.
///
/// Owns the well-known endpoint, the subscriber registry and the data
/// source. Built by [`Publisher::initialise`], then either driven tick by
/// tick or moved onto its loop thread with [`Publisher::start`].
pub struct Publisher<S: DataSource> {
    endpoint: DatagramEndpoint,
    registry: Arc<SubscriberRegistry>,
    source: S,
    period: Duration,
    thread: ThreadParams,
    stats: PublisherStats,
    perf: PerfRecorder,
}

impl<S: DataSource> Publisher<S> {
    /// Validates `params`, binds the well-known socket and initializes the
    /// data source. Nothing is bound if the configuration is invalid.
    pub fn initialise(params: &Parameters, mut source: S) -> Result<Self, PublisherError> {
        params.validate()?;
        let period = params.tick_period()?;

        let endpoint = DatagramEndpoint::bind(&params.socket_path)?;
        endpoint.set_nonblocking(true)?;

        source.initialize().map_err(|e| PublisherError::ProviderInit {
            name: source.name(),
            source: e,
        })?;

        info!(
            path = %params.socket_path.display(),
            frequency_hz = params.frequency_hz,
            period_us = period.as_micros() as u64,
            source = source.name(),
            "publisher initialised"
        );

        Ok(Self {
            endpoint,
            registry: Arc::new(SubscriberRegistry::new()),
            source,
            period,
            thread: params.thread,
            stats: PublisherStats::default(),
            perf: PerfRecorder::new(),
        })
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn local_path(&self) -> &Path {
        self.endpoint.local_path()
    }

    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    pub fn stats(&self) -> PublisherStats {
        self.stats
    }

    pub fn perf(&self) -> &PerfRecorder {
        &self.perf
    }

    /// Registers every pending token sender, up to
    /// [`MAX_REGISTRATIONS_PER_TICK`] datagrams. Returns how many new
    /// subscribers were added.
    pub fn drain_registrations(&mut self) -> usize {
        let mut buf = [0u8; REGISTRATION_BUF];
        let mut added = 0;

        for _ in 0..MAX_REGISTRATIONS_PER_TICK {
            match self.endpoint.recv_from(&mut buf) {
                Ok((n, Some(peer))) if is_registration(&buf[..n]) => {
                    if self.registry.register(&peer) {
                        added += 1;
                    }
                }
                Ok((n, Some(peer))) => {
                    warn!(peer = %peer.display(), len = n, "unexpected datagram discarded");
                }
                Ok((n, None)) => {
                    warn!(len = n, "datagram from unnamed socket discarded");
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    error!(error = %e, "registration receive failed");
                    break;
                }
            }
        }

        self.stats.registrations += added as u64;
        added
    }

    /// One iteration of the loop without the trailing sleep.
    pub fn tick(&mut self) -> TickReport {
        let start = Instant::now();
        self.perf.begin(PerfStage::PublisherTick);

        self.perf.begin(PerfStage::DrainRegistrations);
        let registrations = self.drain_registrations();
        self.perf.end(PerfStage::DrainRegistrations);

        self.perf.begin(PerfStage::ReadSample);
        let sample = self.source.sample();
        self.perf.end(PerfStage::ReadSample);

        self.perf.begin(PerfStage::Broadcast);
        let bytes = sample.to_bytes();
        let endpoint = &self.endpoint;
        let broadcast = self.registry.broadcast(|peer| endpoint.send_to(&bytes, peer));
        self.perf.end(PerfStage::Broadcast);

        self.perf.end(PerfStage::PublisherTick);
        let elapsed = start.elapsed();
        let sleep = sleep_budget(self.period, elapsed);

        self.stats.ticks += 1;
        self.stats.evictions += broadcast.evicted.len() as u64;
        self.stats.short_sends += broadcast.short as u64;
        self.stats.failed_sends += broadcast.transient as u64;
        if sleep.is_none() {
            self.stats.overruns += 1;
            let over = elapsed.saturating_sub(self.period);
            warn!(over_us = over.as_micros() as u64, "tick exceeded its period");
        }

        TickReport {
            registrations,
            broadcast,
            elapsed,
            sleep,
        }
    }

    /// Ticks at the configured rate until `flag` is cleared.
    pub fn run(&mut self, flag: &RunFlag) {
        debug!("publisher loop entered");
        while flag.is_running() {
            if let Some(left) = self.tick().sleep {
                thread::sleep(left);
            }
        }
        debug!(ticks = self.stats.ticks, "publisher loop exited");
    }

    /// Moves the publisher onto its own loop thread.
    pub fn start(self) -> Result<PublisherHandle<S>, PublisherError>
    where
        S: 'static,
    {
        let registry = self.registry.clone();
        let thread = self.thread;
        let worker = spawn_loop("gyre-pub", &thread, move |flag| {
            let mut publisher = self;
            publisher.run(&flag);
            publisher
        })?;
        Ok(PublisherHandle { worker, registry })
    }

    /// Closes the socket and unlinks the well-known path.
    pub fn close(&mut self) {
        self.endpoint.close();
    }
}

/// Running publisher. Dropping it stops the loop.
pub struct PublisherHandle<S: DataSource + 'static> {
    worker: LoopThread<Publisher<S>>,
    registry: Arc<SubscriberRegistry>,
}

impl<S: DataSource + 'static> PublisherHandle<S> {
    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_running()
    }

    /// Stops the loop and returns the publisher, still bound, for inspection
    /// or a clean [`Publisher::close`]. `None` if already stopped or the
    /// loop panicked.
    pub fn stop(&mut self) -> Option<Publisher<S>> {
        let publisher = self.worker.stop()?;
        let s = publisher.stats;
        info!(
            ticks = s.ticks,
            overruns = s.overruns,
            registrations = s.registrations,
            evictions = s.evictions,
            short_sends = s.short_sends,
            failed_sends = s.failed_sends,
            "publisher stopped"
        );
        Some(publisher)
    }
}
