//! `tokio_util::codec` adapter for async transports.
//!
//! Applies the same framing rules as [`Driver`](crate::Driver) to a
//! `FramedRead`/`FramedWrite` buffer: empty packets are dropped, a packet is
//! decoded under the configured [`ErrorMode`], and unterminated bytes at EOF
//! form a final packet.

use bytes::{Buf, Bytes, BytesMut};
use slipframe_codec::{decode, encode_into, ErrorMode, END};
use tokio_util::codec::{Decoder, Encoder};

use crate::config::DriverConfig;
use crate::error::SlipCodecError;

/// SLIP codec for `tokio_util::codec::Framed*`.
#[derive(Debug, Clone, Default)]
pub struct SlipCodec {
    config: DriverConfig,
    /// Bytes of the source buffer already known to hold no `END`.
    scanned: usize,
}

impl SlipCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: DriverConfig) -> Self {
        Self { config, scanned: 0 }
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn set_error_mode(&mut self, mode: ErrorMode) {
        self.config.error_mode = mode;
    }

    pub fn set_leading_end(&mut self, leading_end: bool) {
        self.config.leading_end = leading_end;
    }

    fn decode_packet(&self, packet: BytesMut) -> Result<Option<Bytes>, SlipCodecError> {
        decode(&packet, self.config.error_mode)
            .map(Some)
            .map_err(|source| SlipCodecError::Protocol {
                source,
                packet: packet.freeze(),
            })
    }
}

impl Decoder for SlipCodec {
    type Item = Bytes;
    type Error = SlipCodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>, Self::Error> {
        loop {
            let Some(pos) = src[self.scanned..].iter().position(|&b| b == END) else {
                self.scanned = src.len();
                return Ok(None);
            };

            let packet = src.split_to(self.scanned + pos);
            src.advance(1);
            self.scanned = 0;

            if !packet.is_empty() {
                return self.decode_packet(packet);
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>, Self::Error> {
        if let Some(msg) = self.decode(src)? {
            return Ok(Some(msg));
        }
        if src.is_empty() {
            return Ok(None);
        }
        self.scanned = 0;
        let packet = src.split();
        self.decode_packet(packet)
    }
}

impl Encoder<Bytes> for SlipCodec {
    type Error = SlipCodecError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_into(&item, self.config.leading_end, dst);
        Ok(())
    }
}

impl Encoder<&[u8]> for SlipCodec {
    type Error = SlipCodecError;

    fn encode(&mut self, item: &[u8], dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_into(item, self.config.leading_end, dst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{SinkExt, StreamExt};
    use tokio_util::codec::{FramedRead, FramedWrite};

    use super::*;

    #[test]
    fn decodes_across_partial_buffers() {
        let mut codec = SlipCodec::new();
        let mut buf = BytesMut::from(&b"\xc0hel"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(b"lo\xc0\xc0next");
        let msg = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(msg.as_ref(), b"hello");
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.as_ref(), b"next");
    }

    #[test]
    fn decode_eof_flushes_residue() {
        let mut codec = SlipCodec::new();
        let mut buf = BytesMut::from(&b"tail"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        let msg = codec.decode_eof(&mut buf).unwrap().unwrap();
        assert_eq!(msg.as_ref(), b"tail");
        assert!(codec.decode_eof(&mut buf).unwrap().is_none());
    }

    #[test]
    fn strict_codec_reports_protocol_error() {
        let mut codec = SlipCodec::new();
        let mut buf = BytesMut::from(&b"\xdb\x01\xc0ok\xc0"[..]);
        let err = codec.decode(&mut buf).unwrap_err();
        assert!(matches!(err, SlipCodecError::Protocol { .. }));
        let msg = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(msg.as_ref(), b"ok");
    }

    #[test]
    fn relaxed_codec_passes_bad_escape_through() {
        let mut codec =
            SlipCodec::with_config(DriverConfig::default().with_error_mode(ErrorMode::Relaxed));
        let mut buf = BytesMut::from(&b"\xdb\x01\xc0"[..]);
        let msg = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(msg.as_ref(), b"\xdb\x01");
    }

    #[test]
    fn encoder_honors_leading_end() {
        let mut codec = SlipCodec::with_config(DriverConfig::default().with_leading_end(true));
        let mut dst = BytesMut::new();
        codec.encode(&b"\xc0"[..], &mut dst).unwrap();
        assert_eq!(dst.as_ref(), b"\xc0\xdb\xdc\xc0");
    }

    #[tokio::test]
    async fn framed_roundtrip_over_duplex() {
        let (client, server) = tokio::io::duplex(64);
        let mut writer = FramedWrite::new(client, SlipCodec::new());
        let mut reader = FramedRead::new(server, SlipCodec::new());

        let msgs: [&[u8]; 3] = [b"one", b"\xc0two\xdb", b"three"];
        for msg in msgs {
            writer.send(Bytes::copy_from_slice(msg)).await.unwrap();
        }
        drop(writer);

        for msg in msgs {
            let got = reader.next().await.unwrap().unwrap();
            assert_eq!(got.as_ref(), msg);
        }
        assert!(reader.next().await.is_none());
    }
}
