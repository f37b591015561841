use thiserror::Error;

/// Error returned when a position could not be obtained from a source.
///
/// Every kind has the same effect on the poller: the displayed position is
/// kept and the connection is reported as down.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    /// The request was rejected or timed out before a response arrived.
    #[error("network failure: {0}")]
    Network(String),
    /// The server answered with a non-2xx status code.
    #[error("unexpected HTTP status {0}")]
    HttpStatus(u16),
    /// The body did not match the expected position schema.
    #[error("malformed response body: {0}")]
    Parse(String),
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Parse(err.to_string())
    }
}
