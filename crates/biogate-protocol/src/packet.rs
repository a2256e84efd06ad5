use biogate_core::{Error, Result};
use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

/// Start-of-packet marker.
pub const HEADER: [u8; 2] = [0xEF, 0x01];

/// Bytes before the payload: header, address, identifier and length.
pub const PREFIX_LEN: usize = 9;

/// Trailing checksum size.
pub const CHECKSUM_LEN: usize = 2;

/// Largest payload a sensor emits in one packet (data packets carry up to 256).
pub const MAX_PAYLOAD_LEN: usize = 256;

/// Packet identifier byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketKind {
    Command = 0x01,
    Data = 0x02,
    Ack = 0x07,
    EndOfData = 0x08,
}

impl PacketKind {
    /// # Errors
    /// Returns `Error::InvalidPacket` for unknown identifiers.
    #[inline]
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0x01 => Ok(PacketKind::Command),
            0x02 => Ok(PacketKind::Data),
            0x07 => Ok(PacketKind::Ack),
            0x08 => Ok(PacketKind::EndOfData),
            other => Err(Error::InvalidPacket(format!(
                "unknown packet identifier {other:#04x}"
            ))),
        }
    }

    #[inline]
    #[must_use]
    pub fn to_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PacketKind::Command => write!(f, "command"),
            PacketKind::Data => write!(f, "data"),
            PacketKind::Ack => write!(f, "ack"),
            PacketKind::EndOfData => write!(f, "end_of_data"),
        }
    }
}

/// 16-bit wrapping sum of identifier, length bytes and payload.
#[must_use]
pub fn checksum(kind: u8, length: u16, payload: &[u8]) -> u16 {
    let [len_hi, len_lo] = length.to_be_bytes();
    payload.iter().fold(
        u16::from(kind)
            .wrapping_add(u16::from(len_hi))
            .wrapping_add(u16::from(len_lo)),
        |sum, &b| sum.wrapping_add(u16::from(b)),
    )
}

/// One decoded or to-be-encoded sensor packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub address: u32,
    pub kind: PacketKind,
    pub payload: Bytes,
}

impl Packet {
    #[must_use]
    pub fn new(address: u32, kind: PacketKind, payload: impl Into<Bytes>) -> Self {
        Self {
            address,
            kind,
            payload: payload.into(),
        }
    }

    /// Value of the length field: payload plus checksum.
    #[must_use]
    pub fn length_field(&self) -> u16 {
        (self.payload.len() + CHECKSUM_LEN) as u16
    }

    #[must_use]
    pub fn checksum(&self) -> u16 {
        checksum(self.kind.to_u8(), self.length_field(), &self.payload)
    }

    /// Total bytes on the wire.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        PREFIX_LEN + self.payload.len() + CHECKSUM_LEN
    }

    /// Append the wire representation to `dst`.
    pub fn write_to(&self, dst: &mut BytesMut) {
        dst.reserve(self.encoded_len());
        dst.put_slice(&HEADER);
        dst.put_u32(self.address);
        dst.put_u8(self.kind.to_u8());
        dst.put_u16(self.length_field());
        dst.put_slice(&self.payload);
        dst.put_u16(self.checksum());
    }

    #[must_use]
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.write_to(&mut buf);
        buf.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gen_img_wire_format() {
        // Reference bytes from the sensor datasheet: GenImg on the broadcast address.
        let packet = Packet::new(0xFFFF_FFFF, PacketKind::Command, vec![0x01]);
        assert_eq!(
            packet.to_bytes().as_ref(),
            &[0xEF, 0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0x01, 0x00, 0x03, 0x01, 0x00, 0x05]
        );
    }

    #[test]
    fn test_checksum_wraps() {
        let payload = vec![0xFF; 300];
        let sum = checksum(0x02, 302, &payload);
        let expected = (0x02u32 + 0x01 + 0x2E + 0xFF * 300) as u16;
        assert_eq!(sum, expected);
    }

    #[test]
    fn test_packet_kind_roundtrip() {
        for kind in [
            PacketKind::Command,
            PacketKind::Data,
            PacketKind::Ack,
            PacketKind::EndOfData,
        ] {
            assert_eq!(PacketKind::from_u8(kind.to_u8()).unwrap(), kind);
        }
        assert!(PacketKind::from_u8(0x05).is_err());
    }

    #[test]
    fn test_encoded_len() {
        let packet = Packet::new(1, PacketKind::Ack, vec![0x00, 0x00, 0x07, 0x00, 0x50]);
        assert_eq!(packet.encoded_len(), 16);
        assert_eq!(packet.to_bytes().len(), 16);
        assert_eq!(packet.length_field(), 7);
    }
}
