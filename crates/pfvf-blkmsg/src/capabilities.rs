//! Typed blocks the VF fetches during attach.
//!
//! Both are little endian. A newer version than the decoder knows is
//! accepted and only its known prefix is read.

use bytes::{Buf, BufMut, BytesMut};

use crate::block::{Block, HEADER_LEN};
use crate::error::{BlockError, Result};

/// Block type of the capability summary.
pub const CAPABILITIES_BLOCK: u8 = 2;

/// Block type of the ring-to-service map.
pub const RING_TO_SVC_BLOCK: u8 = 3;

/// Device capability summary.
///
/// | version | fields |
/// |---|---|
/// | 1 | `ext_dc_caps` |
/// | 2 | + `capabilities` |
/// | 3 | + `frequency` |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub version: u8,
    pub ext_dc_caps: u32,
    pub capabilities: Option<u32>,
    pub frequency: Option<u32>,
}

impl Capabilities {
    /// Newest layout this crate knows.
    pub const LATEST_VERSION: u8 = 3;

    /// Decode from a fetched block (`version ‖ length ‖ payload`).
    pub fn decode(block: &[u8]) -> Result<Self> {
        let (version, mut payload) = split(CAPABILITIES_BLOCK, block)?;
        let known = version.min(Self::LATEST_VERSION);
        let need = 4 * usize::from(known);
        if payload.len() < need {
            return Err(BlockError::Truncated {
                block_type: CAPABILITIES_BLOCK,
                version,
                len: payload.len(),
                need,
            });
        }

        let ext_dc_caps = payload.get_u32_le();
        let capabilities = (known >= 2).then(|| payload.get_u32_le());
        let frequency = (known >= 3).then(|| payload.get_u32_le());
        Ok(Self {
            version,
            ext_dc_caps,
            capabilities,
            frequency,
        })
    }

    /// Build the provider block. Fields beyond `version` are not emitted.
    pub fn to_block(&self) -> Block {
        let mut payload = BytesMut::with_capacity(12);
        payload.put_u32_le(self.ext_dc_caps);
        if self.version >= 2 {
            payload.put_u32_le(self.capabilities.unwrap_or(0));
        }
        if self.version >= 3 {
            payload.put_u32_le(self.frequency.unwrap_or(0));
        }
        Block::new(self.version, payload.freeze())
    }

    /// Same summary, cut down to what a VF at `compat_version` understands.
    ///
    /// VFs below compat version 3 only know the first two layouts.
    pub fn for_compat(&self, compat_version: u8) -> Self {
        let version = if compat_version < 3 {
            self.version.min(2)
        } else {
            self.version
        };
        Self {
            version,
            ext_dc_caps: self.ext_dc_caps,
            capabilities: self.capabilities.filter(|_| version >= 2),
            frequency: self.frequency.filter(|_| version >= 3),
        }
    }
}

/// Which accelerator service each ring pair serves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RingToServiceMap {
    pub map: u16,
}

impl RingToServiceMap {
    pub const VERSION: u8 = 1;

    pub fn decode(block: &[u8]) -> Result<Self> {
        let (version, mut payload) = split(RING_TO_SVC_BLOCK, block)?;
        if payload.len() < 2 {
            return Err(BlockError::Truncated {
                block_type: RING_TO_SVC_BLOCK,
                version,
                len: payload.len(),
                need: 2,
            });
        }
        Ok(Self {
            map: payload.get_u16_le(),
        })
    }

    pub fn to_block(&self) -> Block {
        Block::new(Self::VERSION, self.map.to_le_bytes().to_vec())
    }
}

/// Split a fetched block into its version and the payload bytes that were
/// actually read.
fn split(block_type: u8, block: &[u8]) -> Result<(u8, &[u8])> {
    if block.len() < HEADER_LEN {
        return Err(BlockError::BufferTooSmall { size: block.len() });
    }
    let version = block[0];
    if version == 0 {
        return Err(BlockError::ZeroVersion { block_type });
    }
    let length = usize::from(block[1]);
    let payload = &block[HEADER_LEN..];
    Ok((version, &payload[..payload.len().min(length)]))
}
