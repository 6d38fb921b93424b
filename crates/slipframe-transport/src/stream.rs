use std::io::{Read, Write};

use slipframe_driver::{Driver, DriverConfig};

use crate::error::Result;
use crate::io::{read_chunk, write_packet};
use crate::traits::SlipWrapper;

/// Default number of bytes requested per read.
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;

/// Largest read chunk a stream will allocate.
pub const MAX_CHUNK_SIZE: usize = 16 * 1024 * 1024;

/// SLIP messages over any `Read + Write` byte stream.
///
/// Use a small chunk size for slow or bursty links (serial ports) so a
/// message is delivered as soon as its terminator arrives.
pub struct SlipStream<T> {
    inner: T,
    driver: Driver,
    chunk_size: usize,
}

impl<T> SlipStream<T> {
    /// Wrap a stream with the default driver configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, DriverConfig::default())
    }

    /// Wrap a stream with explicit driver configuration.
    pub fn with_config(inner: T, config: DriverConfig) -> Self {
        Self {
            inner,
            driver: Driver::with_config(config),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Set the read chunk size. Zero selects [`DEFAULT_CHUNK_SIZE`]; larger
    /// values are capped at [`MAX_CHUNK_SIZE`].
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = match chunk_size {
            0 => DEFAULT_CHUNK_SIZE,
            n => n.min(MAX_CHUNK_SIZE),
        };
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    ///
    /// Reading from it directly bypasses the driver and desynchronizes framing.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the wrapper and return the inner stream.
    ///
    /// Bytes already buffered by the driver are lost.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Read + Write> SlipWrapper for SlipStream<T> {
    fn driver(&self) -> &Driver {
        &self.driver
    }

    fn send_bytes(&mut self, packet: &[u8]) -> Result<()> {
        write_packet(&mut self.inner, packet)
    }

    fn recv_bytes(&mut self) -> Result<Vec<u8>> {
        read_chunk(&mut self.inner, self.chunk_size)
    }
}

impl<T> std::fmt::Debug for SlipStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlipStream")
            .field("driver", &self.driver)
            .field("chunk_size", &self.chunk_size)
            .finish_non_exhaustive()
    }
}
