use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{ProtocolError, Result};
use crate::mode::ErrorMode;

/// Packet terminator.
pub const END: u8 = 0xC0;

/// Escape marker.
pub const ESC: u8 = 0xDB;

/// Second byte of the escape sequence standing for a literal `END`.
pub const ESC_END: u8 = 0xDC;

/// Second byte of the escape sequence standing for a literal `ESC`.
pub const ESC_ESC: u8 = 0xDD;

/// Position of the next `END` or `ESC` byte.
#[inline]
fn find_special(data: &[u8]) -> Option<usize> {
    data.iter().position(|&b| b == END || b == ESC)
}

/// Exact size of the packet [`encode`] produces for `message`.
pub fn encoded_len(message: &[u8], leading_end: bool) -> usize {
    let escaped = message.iter().filter(|&&b| b == END || b == ESC).count();
    message.len() + escaped + 1 + usize::from(leading_end)
}

/// Encode a message into a SLIP packet, appending to `dst`.
///
/// Wire format:
/// ```text
/// ┌───────────┬──────────────────────────────┬───────┐
/// │ END (opt) │ message, END → ESC ESC_END,  │ END   │
/// │ 0xC0      │          ESC → ESC ESC_ESC   │ 0xC0  │
/// └───────────┴──────────────────────────────┴───────┘
/// ```
pub fn encode_into(message: &[u8], leading_end: bool, dst: &mut BytesMut) {
    dst.reserve(encoded_len(message, leading_end));
    if leading_end {
        dst.put_u8(END);
    }

    let mut rest = message;
    while let Some(pos) = find_special(rest) {
        dst.put_slice(&rest[..pos]);
        dst.put_u8(ESC);
        dst.put_u8(if rest[pos] == END { ESC_END } else { ESC_ESC });
        rest = &rest[pos + 1..];
    }
    dst.put_slice(rest);
    dst.put_u8(END);
}

/// Encode a message into a freshly allocated SLIP packet.
///
/// Never fails: every byte sequence, including the empty one, is encodable.
pub fn encode(message: &[u8], leading_end: bool) -> Bytes {
    let mut dst = BytesMut::new();
    encode_into(message, leading_end, &mut dst);
    dst.freeze()
}

/// Strip one leading and one trailing `END`; returns the body and its offset
/// within `packet`.
fn strip_delimiters(packet: &[u8]) -> (&[u8], usize) {
    let (body, base) = match packet.split_first() {
        Some((&END, rest)) => (rest, 1),
        _ => (packet, 0),
    };
    let body = match body.split_last() {
        Some((&END, rest)) => rest,
        _ => body,
    };
    (body, base)
}

/// Decode a single SLIP packet into its message.
///
/// The packet must already be delimited: at most one leading and one
/// trailing `END` are accepted and ignored. Under [`ErrorMode::Strict`] any
/// malformed sequence fails the whole packet. Under [`ErrorMode::Relaxed`]
/// malformed sequences are copied through, except that `ESC END` (and a bare
/// `END`) terminates the message.
pub fn decode(packet: &[u8], mode: ErrorMode) -> Result<Bytes> {
    let (body, base) = strip_delimiters(packet);
    let mut out = BytesMut::with_capacity(body.len());
    let mut i = 0;

    while let Some(pos) = find_special(&body[i..]) {
        let at = i + pos;
        out.put_slice(&body[i..at]);

        if body[at] == END {
            if mode.is_strict() {
                return Err(ProtocolError::EmbeddedEnd { offset: base + at });
            }
            return Ok(out.freeze());
        }

        match body.get(at + 1).copied() {
            Some(ESC_END) => out.put_u8(END),
            Some(ESC_ESC) => out.put_u8(ESC),
            Some(END) => {
                if mode.is_strict() {
                    return Err(ProtocolError::InvalidEscape {
                        offset: base + at,
                        byte: END,
                    });
                }
                out.put_u8(ESC);
                return Ok(out.freeze());
            }
            Some(byte) => {
                if mode.is_strict() {
                    return Err(ProtocolError::InvalidEscape {
                        offset: base + at,
                        byte,
                    });
                }
                out.put_u8(ESC);
                out.put_u8(byte);
            }
            None => {
                if mode.is_strict() {
                    return Err(ProtocolError::DanglingEscape { offset: base + at });
                }
                out.put_u8(ESC);
                return Ok(out.freeze());
            }
        }
        i = at + 2;
    }

    out.put_slice(&body[i..]);
    Ok(out.freeze())
}

/// Check a packet against strict decoding rules without building the message.
pub fn validate(packet: &[u8]) -> Result<()> {
    let (body, base) = strip_delimiters(packet);
    let mut i = 0;

    while let Some(pos) = find_special(&body[i..]) {
        let at = i + pos;
        if body[at] == END {
            return Err(ProtocolError::EmbeddedEnd { offset: base + at });
        }
        match body.get(at + 1).copied() {
            Some(ESC_END) | Some(ESC_ESC) => i = at + 2,
            Some(byte) => {
                return Err(ProtocolError::InvalidEscape {
                    offset: base + at,
                    byte,
                })
            }
            None => return Err(ProtocolError::DanglingEscape { offset: base + at }),
        }
    }
    Ok(())
}

/// True iff strict [`decode`] would succeed.
pub fn is_valid(packet: &[u8]) -> bool {
    validate(packet).is_ok()
}
