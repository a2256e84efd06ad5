//! Packet protocol spoken by ZFM/R30x/AS608-class fingerprint sensors.
//!
//! ```text
//! EF 01 | AA AA AA AA | PID | LEN_H LEN_L | payload ... | SUM_H SUM_L
//! header  address       kind  payload + 2               checksum
//! ```
//!
//! The checksum is the 16-bit wrapping sum of the packet identifier, both
//! length bytes and the payload.

pub mod codec;
pub mod command;
pub mod packet;
pub mod response;

pub use codec::SensorCodec;
pub use command::{Command, Instruction};
pub use packet::{Packet, PacketKind, checksum};
pub use response::{Ack, ConfirmationCode, SearchHit, SystemParameters};
