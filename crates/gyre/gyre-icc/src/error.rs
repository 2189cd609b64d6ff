use gyre_config::{ConfigError, SchedPolicy};
use std::io;
use std::path::PathBuf;

/// Errors raised while bringing an endpoint or its loop thread up.
///
/// Steady-state I/O never produces these; per-datagram results are reported
/// as [`SendOutcome`](crate::SendOutcome) / [`ReceiveOutcome`](crate::ReceiveOutcome).
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("'{}' is already bound by a live peer", path.display())]
    AddressInUse { path: PathBuf },

    #[error("failed to bind datagram socket at '{}'", path.display())]
    Bind {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("socket option failed")]
    SocketOption(#[source] io::Error),

    #[error("priority {priority} is outside {min}..={max} for {policy}")]
    InvalidPriority {
        policy: SchedPolicy,
        priority: i32,
        min: i32,
        max: i32,
    },

    #[error("failed to apply {policy} scheduling at priority {priority}")]
    Scheduling {
        policy: SchedPolicy,
        priority: i32,
        #[source]
        source: io::Error,
    },

    #[error("real-time scheduling is not supported on this platform")]
    NotSupported,

    #[error("failed to spawn loop thread")]
    Spawn(#[source] io::Error),
}
