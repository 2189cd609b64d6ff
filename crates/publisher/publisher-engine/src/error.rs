use gyre_config::ConfigError;
use gyre_icc::TransportError;
use publisher_core::SourceError;

/// Startup failures. Once the loop runs, nothing is reported through this type.
#[derive(Debug, thiserror::Error)]
pub enum PublisherError {
    #[error("invalid publisher configuration")]
    Config(#[from] ConfigError),

    #[error("publisher transport setup failed")]
    Transport(#[from] TransportError),

    #[error("failed to initialize data source '{name}'")]
    ProviderInit {
        name: &'static str,
        #[source]
        source: SourceError,
    },
}
