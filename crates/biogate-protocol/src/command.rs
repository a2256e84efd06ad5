//! Host-to-sensor instructions.

use crate::packet::{Packet, PacketKind};
use biogate_core::{BufferId, SlotId};
use bytes::{BufMut, BytesMut};
use std::fmt;

/// Instruction codes used by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Instruction {
    /// Capture one image into the image buffer.
    GenImg = 0x01,
    /// Extract features from the image buffer into a char buffer.
    Img2Tz = 0x02,
    /// Search the library with the features of a char buffer.
    Search = 0x04,
    /// Merge both char buffers into one template.
    RegModel = 0x05,
    /// Store a char buffer into a library page.
    Store = 0x06,
    DeleteChar = 0x0C,
    ReadSysPara = 0x0F,
    VerifyPassword = 0x13,
    TemplateNum = 0x1D,
}

impl Instruction {
    #[inline]
    #[must_use]
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Instruction::GenImg => "GenImg",
            Instruction::Img2Tz => "Img2Tz",
            Instruction::Search => "Search",
            Instruction::RegModel => "RegModel",
            Instruction::Store => "Store",
            Instruction::DeleteChar => "DeleteChar",
            Instruction::ReadSysPara => "ReadSysPara",
            Instruction::VerifyPassword => "VerifyPassword",
            Instruction::TemplateNum => "TemplateNum",
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An instruction with its parameters, ready to be addressed and framed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub instruction: Instruction,
    params: BytesMut,
}

impl Command {
    fn bare(instruction: Instruction) -> Self {
        Self {
            instruction,
            params: BytesMut::new(),
        }
    }

    #[must_use]
    pub fn gen_image() -> Self {
        Self::bare(Instruction::GenImg)
    }

    #[must_use]
    pub fn image_to_tz(buffer: BufferId) -> Self {
        let mut cmd = Self::bare(Instruction::Img2Tz);
        cmd.params.put_u8(buffer.to_u8());
        cmd
    }

    /// Search pages `start..start + count` with the features in `buffer`.
    #[must_use]
    pub fn search(buffer: BufferId, start: u16, count: u16) -> Self {
        let mut cmd = Self::bare(Instruction::Search);
        cmd.params.put_u8(buffer.to_u8());
        cmd.params.put_u16(start);
        cmd.params.put_u16(count);
        cmd
    }

    #[must_use]
    pub fn reg_model() -> Self {
        Self::bare(Instruction::RegModel)
    }

    #[must_use]
    pub fn store(buffer: BufferId, slot: SlotId) -> Self {
        let mut cmd = Self::bare(Instruction::Store);
        cmd.params.put_u8(buffer.to_u8());
        cmd.params.put_u16(slot.as_u16());
        cmd
    }

    #[must_use]
    pub fn delete_char(slot: SlotId, count: u16) -> Self {
        let mut cmd = Self::bare(Instruction::DeleteChar);
        cmd.params.put_u16(slot.as_u16());
        cmd.params.put_u16(count);
        cmd
    }

    #[must_use]
    pub fn read_sys_para() -> Self {
        Self::bare(Instruction::ReadSysPara)
    }

    #[must_use]
    pub fn verify_password(password: u32) -> Self {
        let mut cmd = Self::bare(Instruction::VerifyPassword);
        cmd.params.put_u32(password);
        cmd
    }

    #[must_use]
    pub fn template_num() -> Self {
        Self::bare(Instruction::TemplateNum)
    }

    #[must_use]
    pub fn params(&self) -> &[u8] {
        &self.params
    }

    /// Wrap into a command packet for `address`.
    #[must_use]
    pub fn into_packet(self, address: u32) -> Packet {
        let mut payload = BytesMut::with_capacity(1 + self.params.len());
        payload.put_u8(self.instruction.to_u8());
        payload.extend_from_slice(&self.params);
        Packet::new(address, PacketKind::Command, payload.freeze())
    }
}
