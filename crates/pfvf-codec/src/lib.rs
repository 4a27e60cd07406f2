//! Register message codec for the PF/VF mailbox.
//!
//! A mailbox message is a `{type, data}` pair packed into part of a 32-bit
//! CSR. The bit positions of both fields depend on the device generation and
//! are described by a [`MessageFormat`]. The doorbell, origin and in-use bits
//! around the message belong to the transport layer, not to this crate.
//!
//! Also provides the message type table shared by both sides and the CRC8
//! used by block messages.

pub mod codec;
pub mod crc8;
pub mod error;
pub mod msgtype;

pub use codec::{decode, encode, Field, Message, MessageFormat};
pub use crc8::{blkmsg_crc, crc8, CRC8_SEED, CRC8_TABLE};
pub use error::{CodecError, Result};
