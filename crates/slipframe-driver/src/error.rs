use std::time::Duration;

use bytes::Bytes;
use slipframe_codec::ProtocolError;

/// Errors surfaced when pulling a message from a [`Driver`](crate::Driver).
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// The next packet had a malformed escape sequence (strict mode).
    ///
    /// The packet has been consumed; the following call continues with the
    /// next one.
    #[error("protocol error: {source}")]
    Protocol {
        #[source]
        source: ProtocolError,
        /// The raw packet, without delimiters.
        packet: Bytes,
    },

    /// No message arrived before the deadline.
    #[error("no message received within {0:?}")]
    Timeout(Duration),
}

impl DriverError {
    pub fn is_protocol(&self) -> bool {
        matches!(self, DriverError::Protocol { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, DriverError::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, DriverError>;

/// Errors produced by [`SlipCodec`](crate::SlipCodec).
#[cfg(feature = "async")]
#[derive(Debug, thiserror::Error)]
pub enum SlipCodecError {
    /// A packet failed strict decoding.
    #[error("protocol error: {source}")]
    Protocol {
        #[source]
        source: ProtocolError,
        packet: Bytes,
    },

    /// The underlying stream failed.
    #[error("slip codec I/O error: {0}")]
    Io(#[from] std::io::Error),
}
