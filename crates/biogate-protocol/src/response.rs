//! Sensor acknowledge packets and the data they carry.

use crate::packet::{Packet, PacketKind};
use biogate_core::{Error, FingerprintStatus, Result};
use bytes::{Buf, Bytes};
use std::fmt;

/// First payload byte of every acknowledge packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConfirmationCode(pub u8);

impl ConfirmationCode {
    pub const OK: Self = Self(0x00);
    pub const PACKET_RECEIVE_ERROR: Self = Self(0x01);
    pub const NO_FINGER: Self = Self(0x02);
    pub const IMAGE_FAIL: Self = Self(0x03);
    pub const IMAGE_MESSY: Self = Self(0x06);
    pub const FEATURE_FAIL: Self = Self(0x07);
    pub const NO_MATCH: Self = Self(0x08);
    pub const NOT_FOUND: Self = Self(0x09);
    pub const ENROLL_MISMATCH: Self = Self(0x0A);
    pub const BAD_LOCATION: Self = Self(0x0B);
    pub const WRONG_PASSWORD: Self = Self(0x13);
    pub const INVALID_IMAGE: Self = Self(0x15);
    pub const FLASH_ERROR: Self = Self(0x18);

    /// Map onto the host-side status. Unknown codes count as communication
    /// errors.
    #[must_use]
    pub fn status(self) -> FingerprintStatus {
        match self.0 {
            0x00 => FingerprintStatus::Ok,
            0x02 => FingerprintStatus::NoFinger,
            0x03 => FingerprintStatus::ImageFail,
            0x06 | 0x07 | 0x15 => FingerprintStatus::ConvertFail,
            0x08 | 0x09 | 0x0A => FingerprintStatus::NoMatch,
            0x0B | 0x18 => FingerprintStatus::StoreFail,
            _ => FingerprintStatus::CommError,
        }
    }

    #[must_use]
    pub fn is_ok(self) -> bool {
        self == Self::OK
    }

    #[must_use]
    pub fn is_wrong_password(self) -> bool {
        self == Self::WRONG_PASSWORD
    }
}

impl fmt::Display for ConfirmationCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#04x}", self.0)
    }
}

/// Decoded acknowledge packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub code: ConfirmationCode,
    /// Payload after the confirmation code.
    pub data: Bytes,
}

impl Ack {
    /// # Errors
    /// `Error::UnexpectedPacket` if the packet is not an acknowledge, and
    /// `Error::InvalidPacket` if it carries no confirmation code.
    pub fn from_packet(packet: Packet) -> Result<Self> {
        if packet.kind != PacketKind::Ack {
            return Err(Error::UnexpectedPacket {
                expected: PacketKind::Ack.to_string(),
                actual: packet.kind.to_string(),
            });
        }
        let mut payload = packet.payload;
        if payload.is_empty() {
            return Err(Error::InvalidPacket(
                "acknowledge without confirmation code".to_string(),
            ));
        }
        let code = ConfirmationCode(payload.get_u8());
        Ok(Self {
            code,
            data: payload,
        })
    }

    #[must_use]
    pub fn status(&self) -> FingerprintStatus {
        self.code.status()
    }

    fn require(&self, len: usize, what: &str) -> Result<()> {
        if self.data.len() < len {
            return Err(Error::InvalidPacket(format!(
                "{what} needs {len} bytes, got {}",
                self.data.len()
            )));
        }
        Ok(())
    }

    /// Page id and score of a successful search.
    ///
    /// # Errors
    /// `Error::InvalidPacket` if the data is shorter than four bytes.
    pub fn search_hit(&self) -> Result<SearchHit> {
        self.require(4, "search result")?;
        let mut data = self.data.clone();
        Ok(SearchHit {
            page_id: data.get_u16(),
            score: data.get_u16(),
        })
    }

    /// # Errors
    /// `Error::InvalidPacket` if the data is shorter than two bytes.
    pub fn template_count(&self) -> Result<u16> {
        self.require(2, "template count")?;
        Ok(self.data.clone().get_u16())
    }

    /// # Errors
    /// `Error::InvalidPacket` if the data is shorter than sixteen bytes.
    pub fn system_parameters(&self) -> Result<SystemParameters> {
        self.require(SystemParameters::LEN, "system parameters")?;
        let mut data = self.data.clone();
        Ok(SystemParameters {
            status_register: data.get_u16(),
            system_id: data.get_u16(),
            library_size: data.get_u16(),
            security_level: data.get_u16(),
            device_address: data.get_u32(),
            packet_size_code: data.get_u16(),
            baud_multiplier: data.get_u16(),
        })
    }
}

/// Best library match for a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchHit {
    pub page_id: u16,
    pub score: u16,
}

/// Contents of the sensor's system parameter block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemParameters {
    pub status_register: u16,
    pub system_id: u16,
    pub library_size: u16,
    pub security_level: u16,
    pub device_address: u32,
    pub packet_size_code: u16,
    pub baud_multiplier: u16,
}

impl SystemParameters {
    pub const LEN: usize = 16;

    /// Data packet length in bytes (32 << code).
    #[must_use]
    pub fn packet_size(&self) -> usize {
        32usize << self.packet_size_code.min(3)
    }

    /// UART speed (multiplier * 9600).
    #[must_use]
    pub fn baud_rate(&self) -> u32 {
        u32::from(self.baud_multiplier) * 9600
    }
}
