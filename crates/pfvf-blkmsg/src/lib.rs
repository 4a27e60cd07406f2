//! Block messages: configuration blobs larger than one mailbox register.
//!
//! A block is served one byte per request. The requester reads the version
//! byte, then the length byte, then each payload byte, and finally asks the
//! provider for the CRC8 over everything it read:
//! ```text
//! ┌─────────┬────────┬──────────────────────┐
//! │ version │ length │ payload (length)     │
//! │ 1 byte  │ 1 byte │ ≤ 126 bytes          │
//! └─────────┴────────┴──────────────────────┘
//! ```
//! - [`ProviderRegistry`] answers requests on the PF side
//! - [`fetch_block`] drives a full transfer on the VF side
//! - [`capabilities`] decodes the typed blocks the VF asks for at attach

pub mod block;
pub mod capabilities;
pub mod error;
pub mod fetch;
pub mod registry;

pub use block::{
    Block, BlockClass, BlockErrorCode, BlockRequest, BlockResponse, HEADER_LEN, MAX_BLOCK_TYPE,
};
pub use capabilities::{Capabilities, RingToServiceMap, CAPABILITIES_BLOCK, RING_TO_SVC_BLOCK};
pub use error::{BlockError, Result};
pub use fetch::{fetch_block, ByteSource};
pub use registry::{BlockProvider, ProviderError, ProviderRegistry};
