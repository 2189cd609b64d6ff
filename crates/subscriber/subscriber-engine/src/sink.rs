use crate::sample::OrientedSample;
use crossbeam::channel::Sender;
use std::io::{self, Write};
use tracing::debug;

/// Destination for every fully received sample.
pub trait SampleSink: Send {
    fn emit(&mut self, sample: &OrientedSample);
}

/// Prints each sample as a human-readable block.
pub struct ConsoleSink<W: Write + Send = io::Stdout> {
    out: W,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self { out: io::stdout() }
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write + Send> ConsoleSink<W> {
    pub fn with_writer(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> SampleSink for ConsoleSink<W> {
    fn emit(&mut self, sample: &OrientedSample) {
        if let Err(e) = writeln!(self.out, "{sample}") {
            debug!(error = %e, "console write failed");
        }
    }
}

/// Forwards samples to another thread.
pub struct ChannelSink {
    tx: Sender<OrientedSample>,
}

impl ChannelSink {
    pub fn new(tx: Sender<OrientedSample>) -> Self {
        Self { tx }
    }
}

impl SampleSink for ChannelSink {
    fn emit(&mut self, sample: &OrientedSample) {
        if self.tx.send(*sample).is_err() {
            debug!("sample receiver dropped");
        }
    }
}
