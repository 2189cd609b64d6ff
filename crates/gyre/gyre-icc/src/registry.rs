use crate::endpoint::SendOutcome;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, error, info, trace, warn};

/// Set of subscriber addresses known to a publisher, unique by path.
///
/// Entries are added on the first registration from an address and removed
/// only when a send to that address reports the peer as gone. The loop thread
/// mutates the set; the controlling thread may read its size concurrently.
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    peers: Mutex<Vec<PathBuf>>,
}

/// Per-tick tally of one broadcast pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub short: usize,
    pub transient: usize,
    pub evicted: Vec<PathBuf>,
}

impl BroadcastReport {
    pub fn attempted(&self) -> usize {
        self.delivered + self.short + self.transient + self.evicted.len()
    }
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock leaves the Vec intact; keep using it.
    fn lock(&self) -> MutexGuard<'_, Vec<PathBuf>> {
        self.peers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Adds `peer` unless it is already present. Returns whether it was new.
    pub fn register(&self, peer: &Path) -> bool {
        let mut peers = self.lock();
        if peers.iter().any(|known| known == peer) {
            debug!(peer = %peer.display(), "duplicate registration ignored");
            return false;
        }
        peers.push(peer.to_path_buf());
        info!(peer = %peer.display(), subscribers = peers.len(), "subscriber registered");
        true
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn contains(&self, peer: &Path) -> bool {
        self.lock().iter().any(|known| known == peer)
    }

    pub fn snapshot(&self) -> Vec<PathBuf> {
        self.lock().clone()
    }

    /// Calls `send` once per registered peer while holding the lock, evicting
    /// every peer whose outcome is [`SendOutcome::PeerGone`].
    pub fn broadcast<F>(&self, mut send: F) -> BroadcastReport
    where
        F: FnMut(&Path) -> SendOutcome,
    {
        let mut report = BroadcastReport::default();
        let mut peers = self.lock();

        peers.retain(|peer| match send(peer) {
            SendOutcome::Delivered => {
                trace!(peer = %peer.display(), "sample delivered");
                report.delivered += 1;
                true
            }
            SendOutcome::Short { sent, expected } => {
                warn!(peer = %peer.display(), sent, expected, "short send, sample lost for peer");
                report.short += 1;
                true
            }
            SendOutcome::PeerGone(e) => {
                warn!(peer = %peer.display(), error = %e, "subscriber gone, evicting");
                report.evicted.push(peer.clone());
                false
            }
            SendOutcome::Transient(e) => {
                error!(peer = %peer.display(), error = %e, "send failed, keeping subscriber");
                report.transient += 1;
                true
            }
        });

        report
    }
}
