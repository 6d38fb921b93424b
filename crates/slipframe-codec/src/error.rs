/// A malformed escape sequence (or stray delimiter) inside a SLIP packet.
///
/// Offsets are byte positions within the packet exactly as it was handed to
/// [`decode`](crate::decode) or [`validate`](crate::validate).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// `ESC` followed by a byte other than `ESC_END` or `ESC_ESC`.
    #[error("invalid escape sequence ESC 0x{byte:02x} at offset {offset}")]
    InvalidEscape { offset: usize, byte: u8 },

    /// `ESC` as the last byte of the packet.
    #[error("dangling escape byte at offset {offset}")]
    DanglingEscape { offset: usize },

    /// An unescaped `END` byte inside the packet body.
    #[error("unescaped END byte inside packet at offset {offset}")]
    EmbeddedEnd { offset: usize },
}

impl ProtocolError {
    /// Byte offset of the offending sequence.
    pub fn offset(&self) -> usize {
        match *self {
            ProtocolError::InvalidEscape { offset, .. }
            | ProtocolError::DanglingEscape { offset }
            | ProtocolError::EmbeddedEnd { offset } => offset,
        }
    }
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
