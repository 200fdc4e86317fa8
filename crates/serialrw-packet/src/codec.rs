use bytes::{BufMut, Bytes, BytesMut};
use tracing::debug;

use crate::error::{PacketError, Result};
use crate::kind::PacketKind;
use crate::packet::Packet;

/// Frame header: length (1) + id (1) + kind tag (1) = 3 bytes.
pub const HEADER_SIZE: usize = 3;

/// Largest frame the single length byte can describe.
pub const MAX_FRAME_LEN: usize = u8::MAX as usize;

/// Largest payload that fits in one frame.
pub const MAX_PAYLOAD: usize = MAX_FRAME_LEN - HEADER_SIZE;

/// Encode one frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌────────────┬──────────┬────────────┬─────────────────────┐
/// │ Length (1) │ Id (1)   │ Kind (1)   │ Payload (Length-3)  │
/// └────────────┴──────────┴────────────┴─────────────────────┘
/// ```
/// `Length` counts the whole frame, header included.
pub fn encode_packet(id: u8, kind: PacketKind, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.len() > MAX_PAYLOAD {
        return Err(PacketError::EncodingTooLarge {
            size: payload.len(),
            max: MAX_PAYLOAD,
        });
    }
    let length = HEADER_SIZE + payload.len();
    dst.reserve(length);
    dst.put_u8(length as u8);
    dst.put_u8(id);
    dst.put_u8(kind.tag());
    dst.put_slice(payload);
    Ok(())
}

/// Decode the next frame from a buffer.
///
/// Returns `Ok(None)` if the buffer does not hold a complete frame yet.
/// Complete frames are consumed from the buffer, including frames rejected
/// with [`PacketError::UnsupportedKind`], so decoding can continue after them.
/// A [`PacketError::MalformedFrame`] leaves the buffer untouched: without a
/// valid length there is no way to find the next frame boundary.
pub fn decode_packet(src: &mut BytesMut) -> Result<Option<Packet>> {
    let Some(&length) = src.first() else {
        return Ok(None);
    };
    let frame_len = length as usize;
    if frame_len < HEADER_SIZE {
        return Err(PacketError::MalformedFrame { length });
    }
    if src.len() < frame_len {
        return Ok(None);
    }

    let frame = src.split_to(frame_len).freeze();
    let id = frame[1];
    let tag = frame[2];
    let kind = PacketKind::from_tag(tag).ok_or(PacketError::UnsupportedKind { id, tag })?;
    let payload: Bytes = frame.slice(HEADER_SIZE..);

    Ok(Some(Packet::new(id, kind, payload)))
}

/// Incremental framer over a byte stream.
///
/// Bytes from successive transport reads are appended with [`extend`];
/// [`next_packet`] then yields frames in arrival order. A trailing partial
/// frame stays buffered until the rest of it arrives.
///
/// [`extend`]: PacketDecoder::extend
/// [`next_packet`]: PacketDecoder::next_packet
#[derive(Debug, Default)]
pub struct PacketDecoder {
    buf: BytesMut,
}

impl PacketDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append freshly read bytes.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Decode the next buffered frame.
    ///
    /// On a malformed length byte the whole buffer is discarded before the
    /// error is returned.
    pub fn next_packet(&mut self) -> Result<Option<Packet>> {
        match decode_packet(&mut self.buf) {
            Err(err @ PacketError::MalformedFrame { .. }) => {
                debug!(discarded = self.buf.len(), "dropping buffered bytes after malformed frame");
                self.buf.clear();
                Err(err)
            }
            other => other,
        }
    }

    /// Number of bytes waiting for a complete frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_layout() {
        let mut buf = BytesMut::new();
        encode_packet(7, PacketKind::RequestPosition, b"hi", &mut buf).unwrap();
        assert_eq!(buf.as_ref(), &[5, 7, 2, b'h', b'i']);
    }

    #[test]
    fn encode_decode_roundtrip() {
        let mut buf = BytesMut::new();
        encode_packet(42, PacketKind::Response, b"x=10;y=20", &mut buf).unwrap();

        let packet = decode_packet(&mut buf).unwrap().unwrap();
        assert_eq!(packet.id(), 42);
        assert_eq!(packet.kind(), PacketKind::Response);
        assert_eq!(packet.payload().as_ref(), b"x=10;y=20");
        assert!(buf.is_empty());
    }

    #[test]
    fn largest_payload_fits() {
        let payload = vec![0xA5; MAX_PAYLOAD];
        let mut buf = BytesMut::new();
        encode_packet(255, PacketKind::RequestPosition, &payload, &mut buf).unwrap();
        assert_eq!(buf.len(), MAX_FRAME_LEN);
        assert_eq!(buf[0], 255);

        let packet = decode_packet(&mut buf).unwrap().unwrap();
        assert_eq!(packet.id(), 255);
        assert_eq!(packet.payload().len(), MAX_PAYLOAD);
    }

    #[test]
    fn oversized_payload_rejected() {
        let payload = vec![0u8; MAX_PAYLOAD + 1];
        let mut buf = BytesMut::new();
        let err = encode_packet(0, PacketKind::RequestPosition, &payload, &mut buf).unwrap_err();
        assert_eq!(
            err,
            PacketError::EncodingTooLarge {
                size: 253,
                max: 252
            }
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn empty_payload() {
        let mut buf = BytesMut::new();
        encode_packet(1, PacketKind::Acknowledgement, b"", &mut buf).unwrap();
        assert_eq!(buf.as_ref(), &[3, 1, 0]);

        let packet = decode_packet(&mut buf).unwrap().unwrap();
        assert!(packet.payload().is_empty());
    }

    #[test]
    fn decode_incomplete_frame() {
        let mut buf = BytesMut::from(&[6u8, 1, 1, b'a'][..]);
        assert!(decode_packet(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 4);

        let mut empty = BytesMut::new();
        assert!(decode_packet(&mut empty).unwrap().is_none());
    }

    #[test]
    fn unknown_kind_is_consumed() {
        let mut buf = BytesMut::from(&[4u8, 9, 77, b'z', 3, 1, 0][..]);
        let err = decode_packet(&mut buf).unwrap_err();
        assert_eq!(err, PacketError::UnsupportedKind { id: 9, tag: 77 });

        let next = decode_packet(&mut buf).unwrap().unwrap();
        assert_eq!(next.id(), 1);
        assert_eq!(next.kind(), PacketKind::Acknowledgement);
    }

    #[test]
    fn short_length_is_malformed() {
        let mut buf = BytesMut::from(&[2u8, 0, 0, 3, 1, 0][..]);
        let err = decode_packet(&mut buf).unwrap_err();
        assert_eq!(err, PacketError::MalformedFrame { length: 2 });
        assert_eq!(buf.len(), 6);
    }

    #[test]
    fn decoder_frames_concatenated_buffer_in_order() {
        let mut wire = BytesMut::new();
        encode_packet(0, PacketKind::Acknowledgement, b"hello1", &mut wire).unwrap();
        encode_packet(0, PacketKind::Response, b"hello2", &mut wire).unwrap();
        encode_packet(1, PacketKind::Acknowledgement, b"hello3", &mut wire).unwrap();
        encode_packet(1, PacketKind::Response, b"hello4", &mut wire).unwrap();

        let mut decoder = PacketDecoder::new();
        decoder.extend(&wire);

        let mut seen = Vec::new();
        while let Some(packet) = decoder.next_packet().unwrap() {
            seen.push((packet.id(), packet.kind(), packet.payload().clone()));
        }

        assert_eq!(
            seen,
            vec![
                (0, PacketKind::Acknowledgement, Bytes::from_static(b"hello1")),
                (0, PacketKind::Response, Bytes::from_static(b"hello2")),
                (1, PacketKind::Acknowledgement, Bytes::from_static(b"hello3")),
                (1, PacketKind::Response, Bytes::from_static(b"hello4")),
            ]
        );
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn decoder_completes_split_frame() {
        let mut wire = BytesMut::new();
        encode_packet(3, PacketKind::Response, b"split", &mut wire).unwrap();

        let mut decoder = PacketDecoder::new();
        decoder.extend(&wire[..4]);
        assert!(decoder.next_packet().unwrap().is_none());
        assert_eq!(decoder.buffered(), 4);

        decoder.extend(&wire[4..]);
        let packet = decoder.next_packet().unwrap().unwrap();
        assert_eq!(packet.payload().as_ref(), b"split");
    }

    #[test]
    fn decoder_discards_after_malformed_length() {
        let mut decoder = PacketDecoder::new();
        decoder.extend(&[0, 5, 5, 3, 1, 0]);

        assert!(matches!(
            decoder.next_packet(),
            Err(PacketError::MalformedFrame { length: 0 })
        ));
        assert_eq!(decoder.buffered(), 0);

        decoder.extend(&[3, 1, 0]);
        assert_eq!(decoder.next_packet().unwrap().unwrap().id(), 1);
    }
}
