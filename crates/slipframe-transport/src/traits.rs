use bytes::Bytes;
use slipframe_driver::{Driver, DriverError, Next};

use crate::error::{Result, TransportError};

/// A byte transport combined with a SLIP [`Driver`].
///
/// Implementors only move raw bytes; [`send_msg`](Self::send_msg) and
/// [`recv_msg`](Self::recv_msg) handle framing.
pub trait SlipWrapper {
    /// The driver that frames this transport.
    fn driver(&self) -> &Driver;

    /// Write a complete packet to the transport.
    fn send_bytes(&mut self, packet: &[u8]) -> Result<()>;

    /// Read the next chunk from the transport.
    ///
    /// Must return an empty vector once the transport reaches end of stream.
    fn recv_bytes(&mut self) -> Result<Vec<u8>>;

    /// Encode and send one message.
    fn send_msg(&mut self, message: &[u8]) -> Result<()> {
        let packet = self.driver().send(message);
        self.send_bytes(&packet)
    }

    /// Receive one message, reading from the transport as needed.
    ///
    /// Returns `Ok(None)` at end of stream. A protocol error is reported
    /// once; the next call returns the message from the following packet.
    fn recv_msg(&mut self) -> Result<Option<Bytes>> {
        loop {
            match self.driver().try_get()? {
                Next::Message(msg) => return Ok(Some(msg)),
                Next::Closed => return Ok(None),
                Next::Pending => {
                    let data = self.recv_bytes()?;
                    self.driver().receive(&data);
                }
            }
        }
    }

    /// Iterate over received messages until end of stream.
    fn messages(&mut self) -> Messages<'_, Self>
    where
        Self: Sized,
    {
        Messages {
            wrapper: self,
            done: false,
        }
    }
}

/// Iterator returned by [`SlipWrapper::messages`].
///
/// Protocol errors are yielded and iteration continues; any other error is
/// yielded once and ends the iteration.
pub struct Messages<'a, W> {
    wrapper: &'a mut W,
    done: bool,
}

impl<W: SlipWrapper> Iterator for Messages<'_, W> {
    type Item = Result<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.wrapper.recv_msg() {
            Ok(Some(msg)) => Some(Ok(msg)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err @ TransportError::Driver(DriverError::Protocol { .. })) => Some(Err(err)),
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}
