use crate::error::SubscriberError;
use crate::sample::{Orientation, OrientedSample};
use crate::sink::SampleSink;
use gyre_ahrs::OrientationFilter;
use gyre_config::{Parameters, ThreadParams, check_socket_path};
use gyre_events::{ImuPayload, REGISTRATION_TOKEN, WIRE_SIZE};
use gyre_icc::{
    DatagramEndpoint, EndpointWaker, LoopThread, ReceiveOutcome, RunFlag, SendOutcome, ShutdownReason,
    ShutdownSignal, classify_receive, spawn_loop,
};
use gyre_perf_recorder::{PerfRecorder, PerfStage};
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Private address of a subscriber: the publisher's path plus `_client<pid>`.
pub fn client_path(publisher_path: &Path, pid: u32) -> PathBuf {
    let mut s = OsString::from(publisher_path.as_os_str());
    s.push(format!("_client{pid}"));
    PathBuf::from(s)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SubscriberStats {
    pub samples: u64,
    pub discarded: u64,
    pub timeouts: u64,
    pub failures: u64,
}

/// Receives samples from one publisher, optionally fuses them into an
/// orientation, and hands each result to a [`SampleSink`].
pub struct Subscriber<K: SampleSink> {
    endpoint: DatagramEndpoint,
    publisher_path: PathBuf,
    filter: Option<OrientationFilter>,
    sink: K,
    shutdown: ShutdownSignal,
    timeout: Option<Duration>,
    thread: ThreadParams,
    stats: SubscriberStats,
    perf: PerfRecorder,
    // room for one record past the wire size to detect oversized datagrams
    buf: [u8; WIRE_SIZE * 2],
}

impl<K: SampleSink> Subscriber<K> {
    /// Binds the private address, builds the configured filter, announces
    /// itself to the publisher and applies the receive timeout.
    ///
    /// A publisher that is not running yet is not an error here: the
    /// registration is lost, and the receive timeout reports the absence.
    pub fn initialise(params: &Parameters, sink: K, shutdown: ShutdownSignal) -> Result<Self, SubscriberError> {
        params.validate()?;

        let own_path = client_path(&params.socket_path, std::process::id());
        check_socket_path(&own_path)?;

        let endpoint = DatagramEndpoint::bind(&own_path)?;
        let timeout = params.receive_timeout();
        endpoint.set_read_timeout(timeout)?;

        let filter = OrientationFilter::from_kind(params.ahrs, params.frequency_hz);

        let subscriber = Self {
            endpoint,
            publisher_path: params.socket_path.clone(),
            filter,
            sink,
            shutdown,
            timeout,
            thread: params.thread,
            stats: SubscriberStats::default(),
            perf: PerfRecorder::new(),
            buf: [0u8; WIRE_SIZE * 2],
        };
        subscriber.register();

        info!(
            path = %own_path.display(),
            publisher = %params.socket_path.display(),
            ahrs = %params.ahrs,
            timeout_ms = params.timeout_ms,
            "subscriber initialised"
        );
        Ok(subscriber)
    }

    fn register(&self) {
        match self.endpoint.send_to(&REGISTRATION_TOKEN, &self.publisher_path) {
            SendOutcome::Delivered => {
                info!(publisher = %self.publisher_path.display(), "registration sent");
            }
            SendOutcome::Short { sent, expected } => {
                warn!(sent, expected, "registration truncated");
            }
            SendOutcome::PeerGone(e) | SendOutcome::Transient(e) => {
                warn!(publisher = %self.publisher_path.display(), error = %e, "registration failed, publisher may be down");
            }
        }
    }

    pub fn local_path(&self) -> &Path {
        self.endpoint.local_path()
    }

    pub fn filter(&self) -> Option<&OrientationFilter> {
        self.filter.as_ref()
    }

    pub fn stats(&self) -> SubscriberStats {
        self.stats
    }

    pub fn perf(&self) -> &PerfRecorder {
        &self.perf
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    /// Waits for one datagram, up to the configured timeout.
    pub fn receive_once(&mut self) -> ReceiveOutcome {
        self.perf.begin(PerfStage::Receive);
        let result = self.endpoint.recv(&mut self.buf);
        self.perf.end(PerfStage::Receive);
        classify_receive(result, WIRE_SIZE)
    }

    /// Acts on one receive outcome: emit, discard, or escalate a timeout.
    pub fn handle(&mut self, outcome: &ReceiveOutcome) {
        match outcome {
            ReceiveOutcome::Record => self.process_record(),
            ReceiveOutcome::Empty => {
                warn!("zero-length datagram");
                self.stats.discarded += 1;
            }
            ReceiveOutcome::Short(n) => {
                warn!(len = n, expected = WIRE_SIZE, "incomplete sample discarded");
                self.stats.discarded += 1;
            }
            ReceiveOutcome::Oversized(n) => {
                warn!(len = n, expected = WIRE_SIZE, "oversized datagram discarded");
                self.stats.discarded += 1;
            }
            ReceiveOutcome::TimedOut => {
                self.stats.timeouts += 1;
                if self.shutdown.trigger(ShutdownReason::PublisherTimeout) {
                    error!(
                        timeout_ms = self.timeout.map_or(0, |t| t.as_millis() as u64),
                        "no sample within timeout, publisher might be down"
                    );
                } else {
                    debug!("receive timed out after shutdown was raised");
                }
            }
            ReceiveOutcome::Failed(e) if e.kind() == io::ErrorKind::Interrupted => {
                debug!("receive interrupted");
            }
            ReceiveOutcome::Failed(e) => {
                error!(error = %e, "receive failed");
                self.stats.failures += 1;
            }
        }
    }

    /// One receive plus its handling.
    pub fn step(&mut self) -> ReceiveOutcome {
        let outcome = self.receive_once();
        self.handle(&outcome);
        outcome
    }

    fn process_record(&mut self) {
        let Some(payload) = ImuPayload::decode(&self.buf[..WIRE_SIZE]) else {
            return;
        };

        self.perf.begin(PerfStage::FilterUpdate);
        let orientation = self.filter.as_mut().map(|filter| {
            filter.update(&payload);
            Orientation::from_filter(filter)
        });
        self.perf.end(PerfStage::FilterUpdate);

        let sample = OrientedSample {
            payload,
            orientation,
            received_at: Instant::now(),
        };

        self.perf.begin(PerfStage::Emit);
        self.sink.emit(&sample);
        self.perf.end(PerfStage::Emit);
        self.stats.samples += 1;
    }

    /// Receives until `flag` is cleared. An outcome that arrives after the
    /// flag was cleared (the wake-up from [`SubscriberHandle::stop`]) is
    /// dropped unhandled.
    pub fn run(&mut self, flag: &RunFlag) {
        debug!("subscriber loop entered");
        while flag.is_running() {
            self.perf.begin(PerfStage::SubscriberTotal);
            let outcome = self.receive_once();
            if !flag.is_running() {
                break;
            }
            self.handle(&outcome);
            self.perf.end(PerfStage::SubscriberTotal);
        }
        debug!(samples = self.stats.samples, "subscriber loop exited");
    }

    /// Moves the subscriber onto its own loop thread.
    pub fn start(self) -> Result<SubscriberHandle<K>, SubscriberError>
    where
        K: 'static,
    {
        let waker = self.endpoint.waker()?;
        let thread = self.thread;
        let worker = spawn_loop("gyre-sub", &thread, move |flag| {
            let mut subscriber = self;
            subscriber.run(&flag);
            subscriber
        })?;
        Ok(SubscriberHandle { worker, waker })
    }

    pub fn close(&mut self) {
        self.endpoint.close();
    }
}

/// Running subscriber. Dropping it stops the loop.
pub struct SubscriberHandle<K: SampleSink + 'static> {
    worker: LoopThread<Subscriber<K>>,
    waker: EndpointWaker,
}

impl<K: SampleSink + 'static> SubscriberHandle<K> {
    pub fn is_running(&self) -> bool {
        self.worker.is_running()
    }

    /// Stops the loop without waiting for the receive timeout and returns
    /// the subscriber. `None` if already stopped or the loop panicked.
    pub fn stop(&mut self) -> Option<Subscriber<K>> {
        self.worker.run_flag().stop();
        self.waker.wake();
        let subscriber = self.worker.stop()?;
        let s = subscriber.stats;
        info!(
            samples = s.samples,
            discarded = s.discarded,
            timeouts = s.timeouts,
            failures = s.failures,
            "subscriber stopped"
        );
        Some(subscriber)
    }
}

impl<K: SampleSink + 'static> Drop for SubscriberHandle<K> {
    fn drop(&mut self) {
        self.stop();
    }
}
