use thiserror::Error;
use tracker::FetchError;

/// Errors that end the CLI with a non-zero status.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("invalid configuration: {0}")]
    Config(#[from] config::ConfigError),
    #[error("could not fetch position: {0}")]
    Fetch(#[from] FetchError),
    #[error("could not serialize output: {0}")]
    Serialization(#[from] serde_json::Error),
}
