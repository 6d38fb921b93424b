//! Stateless SLIP (RFC 1055) packet transforms.
//!
//! This is the leaf layer of slipframe. It turns a message into a packet and
//! a single, already delimited packet back into a message:
//! - `END` (0xC0) terminates a packet
//! - `ESC` (0xDB) introduces a two-byte escape sequence
//! - `ESC END` (0xDB 0xDC) stands for a literal `END` byte
//! - `ESC ESC` (0xDB 0xDD) stands for a literal `ESC` byte
//!
//! Nothing here keeps state between calls; incremental framing of a byte
//! stream lives in `slipframe-driver`.

pub mod codec;
pub mod error;
pub mod mode;

pub use codec::{
    decode, encode, encode_into, encoded_len, is_valid, validate, END, ESC, ESC_END, ESC_ESC,
};
pub use error::{ProtocolError, Result};
pub use mode::{ErrorMode, ParseErrorModeError};
