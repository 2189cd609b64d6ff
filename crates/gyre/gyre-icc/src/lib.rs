mod endpoint;
mod error;
mod realtime;
mod registry;
mod shutdown;

pub use endpoint::{
    DatagramEndpoint, EndpointWaker, ReceiveOutcome, SendOutcome, classify_receive, classify_send,
};
pub use error::TransportError;
pub use realtime::{LoopThread, RunFlag, spawn_loop};
pub use registry::{BroadcastReport, SubscriberRegistry};
pub use shutdown::{ShutdownReason, ShutdownSignal, install_interrupt_handler};
