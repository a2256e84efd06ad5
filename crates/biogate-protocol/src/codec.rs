//! Tokio codec for sensor packets.
//!
//! `SensorCodec` frames the byte stream coming from the UART into [`Packet`]s
//! and writes packets back with header, length and checksum. It is used both
//! by the blocking serial driver (fed manually from `read` calls) and by
//! `Framed` streams in tests.
//!
//! # Resynchronisation
//!
//! Bytes preceding a header are discarded. A packet whose checksum does not
//! match is consumed before the error is returned, so a caller that keeps
//! decoding starts again at the next header.

use crate::packet::{CHECKSUM_LEN, HEADER, MAX_PAYLOAD_LEN, PREFIX_LEN, Packet, PacketKind};
use biogate_core::{Error, Result, constants::DEFAULT_SENSOR_ADDRESS};
use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

/// Default maximum frame size in bytes.
const DEFAULT_MAX_FRAME_SIZE: usize = PREFIX_LEN + MAX_PAYLOAD_LEN + CHECKSUM_LEN;

#[derive(Debug, Clone)]
pub struct SensorCodec {
    /// Module address every received packet must carry.
    address: u32,

    /// Maximum allowed frame size in bytes.
    max_frame_size: usize,
}

impl SensorCodec {
    #[must_use]
    pub fn new(address: u32) -> Self {
        Self {
            address,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    #[must_use]
    pub fn with_max_frame_size(address: u32, max_frame_size: usize) -> Self {
        Self {
            address,
            max_frame_size,
        }
    }

    #[must_use]
    pub fn address(&self) -> u32 {
        self.address
    }

    #[must_use]
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Drop everything before the first header. Keeps a trailing `0xEF` that
    /// may be the first half of a header split across reads.
    fn skip_to_header(src: &mut BytesMut) {
        if let Some(pos) = src.windows(2).position(|w| w == HEADER) {
            if pos > 0 {
                trace!(discarded = pos, "Skipping bytes before packet header");
                src.advance(pos);
            }
        } else {
            let keep = usize::from(src.last() == Some(&HEADER[0]));
            let discard = src.len() - keep;
            if discard > 0 {
                trace!(discarded = discard, "No packet header in buffer");
                src.advance(discard);
            }
        }
    }
}

impl Default for SensorCodec {
    fn default() -> Self {
        Self::new(DEFAULT_SENSOR_ADDRESS)
    }
}

impl Decoder for SensorCodec {
    type Item = Packet;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Packet>> {
        Self::skip_to_header(src);
        if src.len() < PREFIX_LEN {
            return Ok(None);
        }

        let length = usize::from(u16::from_be_bytes([src[7], src[8]]));
        if length < CHECKSUM_LEN {
            // Drop the bogus header so the next call can resync.
            src.advance(HEADER.len());
            return Err(Error::InvalidPacket(format!(
                "length field {length} shorter than checksum"
            )));
        }

        let size = PREFIX_LEN + length;
        if size > self.max_frame_size {
            src.advance(HEADER.len());
            return Err(Error::FrameTooLarge {
                size,
                max_size: self.max_frame_size,
            });
        }

        if src.len() < size {
            src.reserve(size - src.len());
            return Ok(None);
        }

        let mut frame = src.split_to(size);
        frame.advance(HEADER.len());
        let address = frame.get_u32();
        let kind_byte = frame.get_u8();
        let length_field = frame.get_u16();
        let payload = frame.split_to(length - CHECKSUM_LEN);
        let received = frame.get_u16();

        let expected = crate::packet::checksum(kind_byte, length_field, &payload);
        if received != expected {
            return Err(Error::ChecksumMismatch {
                expected,
                actual: received,
            });
        }

        if address != self.address {
            return Err(Error::AddressMismatch {
                expected: self.address,
                actual: address,
            });
        }

        let kind = PacketKind::from_u8(kind_byte)?;
        trace!(%kind, len = payload.len(), "Decoded sensor packet");
        Ok(Some(Packet {
            address,
            kind,
            payload: payload.freeze(),
        }))
    }
}

impl Encoder<Packet> for SensorCodec {
    type Error = Error;

    fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<()> {
        let size = item.encoded_len();
        if size > self.max_frame_size {
            return Err(Error::FrameTooLarge {
                size,
                max_size: self.max_frame_size,
            });
        }
        item.write_to(dst);
        Ok(())
    }
}
