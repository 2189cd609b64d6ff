use gyre_config::ConfigError;
use gyre_icc::TransportError;

#[derive(Debug, thiserror::Error)]
pub enum SubscriberError {
    #[error("invalid subscriber configuration")]
    Config(#[from] ConfigError),

    #[error("subscriber transport setup failed")]
    Transport(#[from] TransportError),
}
