//! SLIP (RFC 1055) message framing over byte streams and sockets.
//!
//! slipframe splits a continuous byte stream into messages using the SLIP
//! escaping scheme: `END` (0xC0) terminates a packet and `ESC` (0xDB) lets
//! `END` and `ESC` appear inside message content.
//!
//! # Crate Structure
//!
//! - [`codec`]: Stateless encode / decode / validate of single packets
//! - [`driver`]: Incremental, thread-safe framer with blocking and timed pulls
//! - [`transport`]: `SlipWrapper` over `Read + Write` streams, TCP and Unix sockets
//!
//! ```
//! use slipframe::driver::{Driver, Next};
//!
//! let driver = Driver::new();
//! let packet = driver.send(b"hello");
//! driver.receive(&packet[..3]);
//! assert_eq!(driver.try_get().unwrap(), Next::Pending);
//! driver.receive(&packet[3..]);
//! assert_eq!(driver.try_get().unwrap().into_message().unwrap().as_ref(), b"hello");
//! ```

/// Re-export codec types.
pub mod codec {
    pub use slipframe_codec::*;
}

/// Re-export driver types.
pub mod driver {
    pub use slipframe_driver::*;
}

/// Re-export transport types.
pub mod transport {
    pub use slipframe_transport::*;
}

pub use slipframe_codec::{
    decode, encode, is_valid, ErrorMode, ProtocolError, END, ESC, ESC_END, ESC_ESC,
};
pub use slipframe_driver::{Driver, DriverConfig, DriverError, Next};
pub use slipframe_transport::{Endpoint, SlipSocket, SlipStream, SlipWrapper, TransportError};
