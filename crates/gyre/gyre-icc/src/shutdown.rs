use crossbeam::channel::{Receiver, Sender, bounded};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::info;

/// Why a process is shutting down.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShutdownReason {
    /// SIGINT / SIGTERM.
    Interrupted,
    /// A subscriber heard nothing from its publisher within the timeout.
    PublisherTimeout,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShutdownReason::Interrupted => "interrupted",
            ShutdownReason::PublisherTimeout => "publisher timeout",
        })
    }
}

/// Process-wide termination condition. Clones share state; the first
/// reason raised wins and later ones are dropped.
#[derive(Clone)]
pub struct ShutdownSignal {
    tx: Sender<ShutdownReason>,
    rx: Receiver<ShutdownReason>,
    raised: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (tx, rx) = bounded(1);
        Self {
            tx,
            rx,
            raised: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns `true` if this call was the one that raised the signal.
    pub fn trigger(&self, reason: ShutdownReason) -> bool {
        if self.raised.swap(true, Ordering::AcqRel) {
            return false;
        }
        info!(%reason, "shutdown requested");
        let _ = self.tx.try_send(reason);
        true
    }

    pub fn is_triggered(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }

    /// Blocks until the signal is raised. Meant for a single waiter.
    pub fn wait(&self) -> ShutdownReason {
        // self holds a sender, so the channel never disconnects
        self.rx.recv().unwrap_or(ShutdownReason::Interrupted)
    }

    pub fn wait_timeout(&self, timeout: Duration) -> Option<ShutdownReason> {
        self.rx.recv_timeout(timeout).ok()
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Routes SIGINT and SIGTERM into `signal`. May be installed once per process.
pub fn install_interrupt_handler(signal: &ShutdownSignal) -> Result<(), ctrlc::Error> {
    let signal = signal.clone();
    ctrlc::set_handler(move || {
        signal.trigger(ShutdownReason::Interrupted);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn first_reason_wins() {
        let signal = ShutdownSignal::new();
        assert!(!signal.is_triggered());
        assert!(signal.trigger(ShutdownReason::PublisherTimeout));
        assert!(!signal.trigger(ShutdownReason::Interrupted));
        assert!(signal.is_triggered());
        assert_eq!(signal.wait(), ShutdownReason::PublisherTimeout);
    }

    #[test]
    fn clones_share_state() {
        let signal = ShutdownSignal::new();
        let remote = signal.clone();
        let t = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            remote.trigger(ShutdownReason::Interrupted)
        });
        let start = Instant::now();
        assert_eq!(signal.wait(), ShutdownReason::Interrupted);
        assert!(start.elapsed() < Duration::from_secs(2));
        assert!(t.join().unwrap());
    }

    #[test]
    fn wait_timeout_expires_when_nothing_is_raised() {
        let signal = ShutdownSignal::new();
        assert_eq!(signal.wait_timeout(Duration::from_millis(5)), None);
    }
}
