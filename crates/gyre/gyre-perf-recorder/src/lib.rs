//! Per-stage timing recorder for the publisher and subscriber loops.
//!
//! With the `record` feature **off** (the default) `PerfRecorder` is a
//! zero-sized type and every method is an `#[inline(always)]` no-op.
//!
//! With `record` **on**, each stage owns a pre-allocated buffer of
//! `MAX_SAMPLES` nanosecond durations taken from `CLOCK_MONOTONIC`. Samples
//! past the capacity are dropped, never reallocated on the hot path.

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PerfStage {
    DrainRegistrations = 0,
    ReadSample = 1,
    Broadcast = 2,
    PublisherTick = 3,
    Receive = 4,
    FilterUpdate = 5,
    Emit = 6,
    SubscriberTotal = 7,
}

pub const NUM_STAGES: usize = 8;
pub const MAX_SAMPLES: usize = 65_536;

impl PerfStage {
    pub const ALL: [PerfStage; NUM_STAGES] = [
        PerfStage::DrainRegistrations,
        PerfStage::ReadSample,
        PerfStage::Broadcast,
        PerfStage::PublisherTick,
        PerfStage::Receive,
        PerfStage::FilterUpdate,
        PerfStage::Emit,
        PerfStage::SubscriberTotal,
    ];

    pub fn label(self) -> &'static str {
        match self {
            PerfStage::DrainRegistrations => "drain_registrations",
            PerfStage::ReadSample => "read_sample",
            PerfStage::Broadcast => "broadcast",
            PerfStage::PublisherTick => "publisher_tick",
            PerfStage::Receive => "receive",
            PerfStage::FilterUpdate => "filter_update",
            PerfStage::Emit => "emit",
            PerfStage::SubscriberTotal => "subscriber_total",
        }
    }
}

// ─── Feature: record ON ─────────────────────────────────────────────────────

#[cfg(feature = "record")]
mod inner {
    use super::*;

    #[inline(always)]
    pub fn now_ns() -> u64 {
        let mut ts = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        // SAFETY: ts is a valid out-pointer for the duration of the call
        unsafe {
            libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts);
        }
        (ts.tv_sec as u64) * 1_000_000_000 + ts.tv_nsec as u64
    }

    struct StageBuf {
        samples: Box<[u64]>,
        count: usize,
        pending: u64,
    }

    impl StageBuf {
        fn new() -> Self {
            Self {
                samples: vec![0u64; MAX_SAMPLES].into_boxed_slice(),
                count: 0,
                pending: 0,
            }
        }

        #[inline(always)]
        fn push(&mut self, ns: u64) {
            if self.count < MAX_SAMPLES {
                self.samples[self.count] = ns;
                self.count += 1;
            }
        }
    }

    pub struct PerfRecorder {
        stages: [StageBuf; NUM_STAGES],
    }

    impl PerfRecorder {
        pub fn new() -> Self {
            Self {
                stages: std::array::from_fn(|_| StageBuf::new()),
            }
        }

        #[inline(always)]
        pub fn begin(&mut self, stage: PerfStage) {
            self.stages[stage as usize].pending = now_ns();
        }

        #[inline(always)]
        pub fn end(&mut self, stage: PerfStage) {
            let buf = &mut self.stages[stage as usize];
            let elapsed = now_ns().saturating_sub(buf.pending);
            buf.push(elapsed);
        }

        #[inline(always)]
        pub fn record(&mut self, stage: PerfStage, duration_ns: u64) {
            self.stages[stage as usize].push(duration_ns);
        }

        pub fn samples(&self, stage: PerfStage) -> &[u64] {
            let buf = &self.stages[stage as usize];
            &buf.samples[..buf.count]
        }

        pub fn count(&self, stage: PerfStage) -> usize {
            self.stages[stage as usize].count
        }

        pub fn reset(&mut self) {
            for buf in self.stages.iter_mut() {
                buf.count = 0;
            }
        }
    }

    impl Default for PerfRecorder {
        fn default() -> Self {
            Self::new()
        }
    }
}

// ─── Feature: record OFF (zero-cost stubs) ──────────────────────────────────

#[cfg(not(feature = "record"))]
mod inner {
    use super::*;

    #[inline(always)]
    pub fn now_ns() -> u64 {
        0
    }

    pub struct PerfRecorder;

    impl PerfRecorder {
        #[inline(always)]
        pub fn new() -> Self {
            Self
        }
        #[inline(always)]
        pub fn begin(&mut self, _stage: PerfStage) {}
        #[inline(always)]
        pub fn end(&mut self, _stage: PerfStage) {}
        #[inline(always)]
        pub fn record(&mut self, _stage: PerfStage, _duration_ns: u64) {}
        #[inline(always)]
        pub fn samples(&self, _stage: PerfStage) -> &[u64] {
            &[]
        }
        #[inline(always)]
        pub fn count(&self, _stage: PerfStage) -> usize {
            0
        }
        #[inline(always)]
        pub fn reset(&mut self) {}
    }

    impl Default for PerfRecorder {
        fn default() -> Self {
            Self
        }
    }
}

pub use inner::{PerfRecorder, now_ns};
