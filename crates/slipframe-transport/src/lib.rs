//! Message-oriented SLIP wrappers over concrete byte transports.
//!
//! Every wrapper owns a [`Driver`](slipframe_driver::Driver) and implements
//! [`SlipWrapper`]: it only has to move raw bytes, the trait turns them into
//! whole messages.
//! - [`SlipStream`] wraps any `Read + Write` value (files, pipes, serial ports)
//! - [`SlipSocket`] wraps a connected TCP or Unix domain socket
//! - [`SlipListener`] and [`SlipServer`] accept and serve socket peers

pub mod endpoint;
pub mod error;
mod io;
pub mod listener;
pub mod server;
pub mod socket;
pub mod stream;
pub mod traits;

pub use endpoint::Endpoint;
pub use error::{Result, TransportError};
pub use listener::SlipListener;
pub use server::{SlipRequestHandler, SlipServer};
pub use socket::SlipSocket;
pub use stream::{SlipStream, DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE};
pub use traits::{Messages, SlipWrapper};
