//! Block request and response encoding.
//!
//! Request data (10 bits), split per class:
//! ```text
//!    9     8                        0
//! ┌─────┬──────────────┬──────────────┐
//! │ crc │ byte index   │ type-in-class│
//! └─────┴──────────────┴──────────────┘
//!        small:  5 bits │ 4 bits
//!        medium: 6 bits │ 3 bits
//!        large:  7 bits │ 2 bits
//! ```
//!
//! Response data (10 bits): kind in bits 0..1, byte in bits 2..9.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use pfvf_codec::{msgtype, Message};

use crate::error::{BlockError, Result};

/// Highest block type any class can carry.
pub const MAX_BLOCK_TYPE: u8 = 27;

/// Version and length bytes in front of the payload.
pub const HEADER_LEN: usize = 2;

const REQ_CRC: u32 = 1 << 9;
const REQ_INDEX_END: u32 = 9;

const RESP_KIND_MASK: u32 = 0x3;
const RESP_BYTE_SHIFT: u32 = 2;
const RESP_BYTE_MASK: u32 = 0xFF;

const RESP_KIND_DATA: u32 = 0;
const RESP_KIND_CRC: u32 = 1;
const RESP_KIND_ERROR: u32 = 2;

/// Size class of a block type. Determines the request message type and how
/// many bits the byte index gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockClass {
    Small,
    Medium,
    Large,
}

impl BlockClass {
    /// Class of `block_type`, or `None` above [`MAX_BLOCK_TYPE`].
    pub fn of(block_type: u8) -> Option<Self> {
        match block_type {
            0..=15 => Some(BlockClass::Small),
            16..=23 => Some(BlockClass::Medium),
            24..=MAX_BLOCK_TYPE => Some(BlockClass::Large),
            _ => None,
        }
    }

    /// Class served by a VF→PF request message type.
    pub fn from_msg_type(msg_type: u8) -> Option<Self> {
        match msg_type {
            msgtype::VF2PF_SMALL_BLOCK_REQ => Some(BlockClass::Small),
            msgtype::VF2PF_MEDIUM_BLOCK_REQ => Some(BlockClass::Medium),
            msgtype::VF2PF_LARGE_BLOCK_REQ => Some(BlockClass::Large),
            _ => None,
        }
    }

    pub fn msg_type(self) -> u8 {
        match self {
            BlockClass::Small => msgtype::VF2PF_SMALL_BLOCK_REQ,
            BlockClass::Medium => msgtype::VF2PF_MEDIUM_BLOCK_REQ,
            BlockClass::Large => msgtype::VF2PF_LARGE_BLOCK_REQ,
        }
    }

    /// First block type of the class.
    pub fn first_type(self) -> u8 {
        match self {
            BlockClass::Small => 0,
            BlockClass::Medium => 16,
            BlockClass::Large => 24,
        }
    }

    /// Width of the type-in-class field.
    pub fn type_bits(self) -> u32 {
        match self {
            BlockClass::Small => 4,
            BlockClass::Medium => 3,
            BlockClass::Large => 2,
        }
    }

    /// Largest byte index the request field can address.
    pub fn max_index(self) -> usize {
        (1 << (REQ_INDEX_END - self.type_bits())) - 1
    }

    /// Largest payload a block of this class can carry.
    pub fn max_payload(self) -> usize {
        self.max_index() + 1 - HEADER_LEN
    }
}

/// VF→PF request for one byte of a block, or for its CRC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRequest {
    pub block_type: u8,
    /// Byte to return, or for CRC requests the number of bytes to cover
    /// minus one.
    pub byte_index: u8,
    pub crc: bool,
}

impl BlockRequest {
    pub fn byte(block_type: u8, byte_index: u8) -> Self {
        Self {
            block_type,
            byte_index,
            crc: false,
        }
    }

    /// CRC request covering the first `count` bytes.
    pub fn crc_of(block_type: u8, count: usize) -> Result<Self> {
        let byte_index = count
            .checked_sub(1)
            .and_then(|index| u8::try_from(index).ok())
            .ok_or(BlockError::IndexOutOfRange {
                block_type,
                index: count,
                max: usize::from(u8::MAX),
            })?;
        Ok(Self {
            block_type,
            byte_index,
            crc: true,
        })
    }

    /// Pack into a block request message of the right class.
    pub fn to_message(&self) -> Result<Message> {
        let class = BlockClass::of(self.block_type).ok_or(BlockError::InvalidType {
            block_type: self.block_type,
        })?;
        let index = usize::from(self.byte_index);
        if index > class.max_index() {
            return Err(BlockError::IndexOutOfRange {
                block_type: self.block_type,
                index,
                max: class.max_index(),
            });
        }

        let mut data = u32::from(self.block_type - class.first_type());
        data |= u32::from(self.byte_index) << class.type_bits();
        if self.crc {
            data |= REQ_CRC;
        }
        Ok(Message::new(class.msg_type(), data))
    }

    /// Unpack a block request message. `None` if `msg` is not one.
    pub fn from_message(msg: &Message) -> Option<Self> {
        let class = BlockClass::from_msg_type(msg.msg_type)?;
        let type_bits = class.type_bits();
        let type_mask = (1u32 << type_bits) - 1;
        let index_mask = (1u32 << (REQ_INDEX_END - type_bits)) - 1;

        Some(Self {
            block_type: class.first_type() + (msg.data & type_mask) as u8,
            byte_index: ((msg.data >> type_bits) & index_mask) as u8,
            crc: msg.data & REQ_CRC != 0,
        })
    }
}

/// Error codes a provider can answer with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockErrorCode {
    InvalidBlockType = 0,
    InvalidByteNumber = 1,
    PayloadTruncated = 2,
    UnspecifiedError = 3,
}

impl BlockErrorCode {
    /// Decode a wire error code. Unknown codes read as unspecified.
    pub fn from_wire(code: u8) -> Self {
        match code {
            0 => BlockErrorCode::InvalidBlockType,
            1 => BlockErrorCode::InvalidByteNumber,
            2 => BlockErrorCode::PayloadTruncated,
            _ => BlockErrorCode::UnspecifiedError,
        }
    }
}

impl fmt::Display for BlockErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BlockErrorCode::InvalidBlockType => "invalid block type",
            BlockErrorCode::InvalidByteNumber => "invalid byte number",
            BlockErrorCode::PayloadTruncated => "payload truncated",
            BlockErrorCode::UnspecifiedError => "unspecified error",
        };
        f.write_str(name)
    }
}

/// PF→VF answer to a [`BlockRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockResponse {
    Data(u8),
    Crc(u8),
    Error(BlockErrorCode),
}

impl BlockResponse {
    pub fn to_message(&self) -> Message {
        let (kind, byte) = match *self {
            BlockResponse::Data(byte) => (RESP_KIND_DATA, byte),
            BlockResponse::Crc(crc) => (RESP_KIND_CRC, crc),
            BlockResponse::Error(code) => (RESP_KIND_ERROR, code as u8),
        };
        Message::new(
            msgtype::PF2VF_BLKMSG_RESP,
            kind | u32::from(byte) << RESP_BYTE_SHIFT,
        )
    }

    /// Decode the data field of a block response. `None` for an unknown kind.
    pub fn from_data(data: u32) -> Option<Self> {
        let byte = ((data >> RESP_BYTE_SHIFT) & RESP_BYTE_MASK) as u8;
        match data & RESP_KIND_MASK {
            RESP_KIND_DATA => Some(BlockResponse::Data(byte)),
            RESP_KIND_CRC => Some(BlockResponse::Crc(byte)),
            RESP_KIND_ERROR => Some(BlockResponse::Error(BlockErrorCode::from_wire(byte))),
            _ => None,
        }
    }
}

/// A block as produced by a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub version: u8,
    pub payload: Bytes,
}

impl Block {
    pub fn new(version: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            version,
            payload: payload.into(),
        }
    }

    /// `version ‖ length ‖ payload`, as served byte by byte.
    ///
    /// The length byte saturates; callers check the class limit first.
    pub fn to_wire(&self) -> Bytes {
        let mut wire = BytesMut::with_capacity(HEADER_LEN + self.payload.len());
        wire.put_u8(self.version);
        wire.put_u8(u8::try_from(self.payload.len()).unwrap_or(u8::MAX));
        wire.put_slice(&self.payload);
        wire.freeze()
    }
}
