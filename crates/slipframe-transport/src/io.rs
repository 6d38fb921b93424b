use std::io::{ErrorKind, Read, Write};

use crate::error::{Result, TransportError};

/// Write a whole packet, retrying interrupted writes.
pub(crate) fn write_packet<W: Write>(inner: &mut W, packet: &[u8]) -> Result<()> {
    let mut offset = 0usize;
    while offset < packet.len() {
        match inner.write(&packet[offset..]) {
            Ok(0) => return Err(TransportError::Closed),
            Ok(n) => offset += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(TransportError::Io(err)),
        }
    }

    loop {
        match inner.flush() {
            Ok(()) => return Ok(()),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(TransportError::Io(err)),
        }
    }
}

/// Read at most `chunk_size` bytes. An empty result means end of stream.
pub(crate) fn read_chunk<R: Read>(inner: &mut R, chunk_size: usize) -> Result<Vec<u8>> {
    let mut chunk = vec![0u8; chunk_size];
    loop {
        match inner.read(&mut chunk) {
            Ok(n) => {
                chunk.truncate(n);
                return Ok(chunk);
            }
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(TransportError::Io(err)),
        }
    }
}
