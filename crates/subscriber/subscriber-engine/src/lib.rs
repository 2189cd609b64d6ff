mod error;
mod sample;
mod sink;
mod subscriber;

pub use error::SubscriberError;
pub use sample::{Orientation, OrientedSample};
pub use sink::{ChannelSink, ConsoleSink, SampleSink};
pub use subscriber::{Subscriber, SubscriberHandle, SubscriberStats, client_path};
