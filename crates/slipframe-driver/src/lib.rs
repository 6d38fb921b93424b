//! Incremental SLIP framing over a byte stream.
//!
//! A [`Driver`] accepts inbound bytes in whatever chunks the transport
//! delivers, splits them on `END` into complete packets, and hands decoded
//! messages out one at a time through [`Driver::try_get`], [`Driver::get`]
//! and [`Driver::get_timeout`]. Framing never fails; escape decoding and its
//! error policy happen when a message is pulled.
//!
//! The driver is `Send + Sync`: one thread may feed it while another blocks
//! waiting for the next message.

pub mod config;
pub mod driver;
pub mod error;
#[cfg(feature = "async")]
pub mod framed;

pub use config::DriverConfig;
pub use driver::{Driver, LeadingEndGuard, Next, TryIter};
pub use error::{DriverError, Result};
#[cfg(feature = "async")]
pub use error::SlipCodecError;
#[cfg(feature = "async")]
pub use framed::SlipCodec;

pub use slipframe_codec::{ErrorMode, ProtocolError};
