use crate::block::BlockErrorCode;

/// Errors that can occur while encoding, serving or fetching a block.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BlockError {
    /// Block type is above the large class.
    #[error("invalid block type {block_type} (max 27)")]
    InvalidType { block_type: u8 },

    /// The caller's buffer cannot hold the version and length bytes.
    #[error("buffer too small ({size} bytes, need at least 2)")]
    BufferTooSmall { size: usize },

    /// Byte index does not fit the request field of the block's class.
    #[error("byte index {index} out of range for block type {block_type} (max {max})")]
    IndexOutOfRange { block_type: u8, index: usize, max: usize },

    /// The provider returned version 0.
    #[error("block {block_type}: zero version")]
    ZeroVersion { block_type: u8 },

    /// The provider returned length 0.
    #[error("block {block_type}: zero length")]
    ZeroLength { block_type: u8 },

    /// The advertised length does not fit the block's class.
    #[error("block {block_type}: length {length} exceeds class maximum {max}")]
    LengthOutOfRange { block_type: u8, length: u8, max: usize },

    /// Local and remote CRC8 disagree.
    #[error("block {block_type}: crc mismatch (local {local:#04x}, remote {remote:#04x})")]
    CrcMismatch { block_type: u8, local: u8, remote: u8 },

    /// The provider answered with an error code.
    #[error("block {block_type}: remote error {code}")]
    Remote { block_type: u8, code: BlockErrorCode },

    /// A data byte arrived where a CRC was expected, or the reverse.
    #[error("block {block_type}: unexpected response kind")]
    UnexpectedResponse { block_type: u8 },

    /// A typed block is shorter than its declared version requires.
    #[error("block {block_type} v{version}: truncated ({len} bytes, need {need})")]
    Truncated { block_type: u8, version: u8, len: usize, need: usize },
}

impl BlockError {
    /// True for integrity failures. These are never retried.
    pub fn is_fault(&self) -> bool {
        matches!(
            self,
            BlockError::ZeroVersion { .. }
                | BlockError::ZeroLength { .. }
                | BlockError::LengthOutOfRange { .. }
                | BlockError::CrcMismatch { .. }
                | BlockError::Remote { .. }
                | BlockError::UnexpectedResponse { .. }
                | BlockError::Truncated { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, BlockError>;
