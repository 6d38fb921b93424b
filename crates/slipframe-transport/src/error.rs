use std::path::PathBuf;

use slipframe_driver::DriverError;

/// Errors that can occur in SLIP transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to bind to the specified endpoint.
    #[error("failed to bind to {endpoint}: {source}")]
    Bind {
        endpoint: String,
        source: std::io::Error,
    },

    /// Failed to connect to the specified endpoint.
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The driver rejected a pull: a malformed packet or an expired wait.
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// The socket path is too long for the platform.
    #[error("socket path too long ({len} bytes, max {max}): {path}")]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },

    /// The endpoint string could not be parsed.
    #[error("invalid endpoint {0:?} (expected tcp:HOST:PORT, unix:PATH, HOST:PORT or a path)")]
    InvalidEndpoint(String),

    /// The peer stopped accepting bytes mid-packet.
    #[error("connection closed while sending")]
    Closed,
}

pub type Result<T> = std::result::Result<T, TransportError>;
