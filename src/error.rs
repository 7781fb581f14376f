use std::time::Duration;
use thiserror::Error;

/// Errors returned by the client's public operations.
///
/// Transport trouble after a successful connect never shows up here; it is
/// reported as `Disconnected`/`Error` events and retried in the background.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("live channel is not connected")]
    NotConnected,

    #[error("live channel is closing")]
    Closing,

    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    /// A newer connect/disconnect superseded this attempt
    #[error("connection attempt cancelled")]
    Cancelled,

    #[error("failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),
}
