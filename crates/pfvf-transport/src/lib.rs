//! Single-register PF/VF mailbox transport.
//!
//! One "put message, wait for ack" exchange per direction over a 32-bit
//! CSR that both functions can write:
//! - shared registers (GEN2) split the CSR into two 16-bit halves and use
//!   an in-use pattern for collision detection
//! - dedicated registers (GEN4) use one CSR per direction
//!
//! This is the lowest protocol layer. Register access itself is provided by
//! the caller through the [`Csr`] trait.

pub mod clock;
pub mod csr;
pub mod error;
pub mod layout;
pub mod memory;
pub mod stats;
pub mod traits;

pub use clock::{SystemClock, VirtualClock};
pub use csr::{CsrTransport, Received, TransportConfig};
pub use error::{Result, TransportError};
pub use layout::{Direction, Lane, Layout, Sentinel, DOORBELL, IN_USE_MASK, IN_USE_PATTERN, ORIGIN_SYSTEM};
pub use memory::{MemoryCsr, WriteHook};
pub use stats::{TransportStats, TransportStatsSnapshot};
pub use traits::{Clock, Csr};
