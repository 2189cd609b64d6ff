mod error;
mod pacing;
mod publisher;

pub use error::PublisherError;
pub use pacing::sleep_budget;
pub use publisher::{MAX_REGISTRATIONS_PER_TICK, Publisher, PublisherHandle, PublisherStats, TickReport};
