use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use pfvf_codec::blkmsg_crc;
use tracing::{debug, warn};

use crate::block::{Block, BlockClass, BlockErrorCode, BlockRequest, BlockResponse, MAX_BLOCK_TYPE};
use crate::error::{BlockError, Result};

/// Error a provider may fail with. Reported to the VF as unspecified.
pub type ProviderError = Box<dyn std::error::Error + Send + Sync>;

/// Produces the current content of one block type.
///
/// Called on every byte request, so the content may change between
/// transfers; the CRC check on the VF side catches a change mid-transfer.
pub trait BlockProvider: Send + Sync {
    /// Build the block for a VF that negotiated `compat_version`.
    fn provide(&self, block_type: u8, compat_version: u8) -> std::result::Result<Block, ProviderError>;
}

impl<F> BlockProvider for F
where
    F: Fn(u8, u8) -> std::result::Result<Block, ProviderError> + Send + Sync,
{
    fn provide(&self, block_type: u8, compat_version: u8) -> std::result::Result<Block, ProviderError> {
        self(block_type, compat_version)
    }
}

/// Block-type-keyed table of providers, owned by the PF protocol context.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: RwLock<HashMap<u8, Arc<dyn BlockProvider>>>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider, replacing any previous one for `block_type`.
    pub fn register(&self, block_type: u8, provider: Arc<dyn BlockProvider>) -> Result<()> {
        if block_type > MAX_BLOCK_TYPE {
            return Err(BlockError::InvalidType { block_type });
        }
        self.providers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(block_type, provider);
        debug!(block_type, "block provider registered");
        Ok(())
    }

    /// Remove the provider for `block_type`. Returns true if one was present.
    pub fn unregister(&self, block_type: u8) -> bool {
        self.providers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&block_type)
            .is_some()
    }

    /// Remove every provider.
    pub fn clear(&self) {
        self.providers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    /// True if a provider is registered for `block_type`.
    pub fn contains(&self, block_type: u8) -> bool {
        self.providers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(&block_type)
    }

    /// Registered block types, ascending.
    pub fn block_types(&self) -> Vec<u8> {
        let mut types: Vec<u8> = self
            .providers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .copied()
            .collect();
        types.sort_unstable();
        types
    }

    /// Answer one block request for a VF at `compat_version`.
    pub fn respond(&self, request: BlockRequest, compat_version: u8) -> BlockResponse {
        match self.serve(request, compat_version) {
            Ok(response) => response,
            Err(code) => {
                warn!(
                    block_type = request.block_type,
                    byte_index = request.byte_index,
                    crc = request.crc,
                    %code,
                    "block request rejected"
                );
                BlockResponse::Error(code)
            }
        }
    }

    fn serve(
        &self,
        request: BlockRequest,
        compat_version: u8,
    ) -> std::result::Result<BlockResponse, BlockErrorCode> {
        let class = BlockClass::of(request.block_type).ok_or(BlockErrorCode::InvalidBlockType)?;

        // Do not hold the table lock while the provider runs.
        let provider = self
            .providers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&request.block_type)
            .cloned()
            .ok_or(BlockErrorCode::InvalidBlockType)?;

        let block = provider
            .provide(request.block_type, compat_version)
            .map_err(|err| {
                warn!(block_type = request.block_type, error = %err, "block provider failed");
                BlockErrorCode::UnspecifiedError
            })?;

        if block.payload.len() > class.max_payload() {
            return Err(BlockErrorCode::PayloadTruncated);
        }

        let wire = block.to_wire();
        let index = usize::from(request.byte_index);
        if request.crc {
            let covered = wire.get(..=index).ok_or(BlockErrorCode::InvalidByteNumber)?;
            Ok(BlockResponse::Crc(blkmsg_crc(covered)))
        } else {
            let byte = wire.get(index).ok_or(BlockErrorCode::InvalidByteNumber)?;
            Ok(BlockResponse::Data(*byte))
        }
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("block_types", &self.block_types())
            .finish()
    }
}
