//! PF↔VF register mailbox protocol for SR-IOV accelerators.
//!
//! A physical function and its virtual functions exchange bootstrap
//! configuration and lifecycle events over one 32-bit register per VF.
//!
//! # Crate Structure
//!
//! - [`codec`]: message packing, message types and CRC8
//! - [`transport`]: collision-avoiding single-register send and receive
//! - [`blkmsg`]: byte-at-a-time block transfer with CRC check
//! - [`proto`]: PF and VF dispatchers, request correlation, negotiation

/// Re-export codec types.
pub mod codec {
    pub use pfvf_codec::*;
}

/// Re-export transport types.
pub mod transport {
    pub use pfvf_transport::*;
}

/// Re-export block message types.
pub mod blkmsg {
    pub use pfvf_blkmsg::*;
}

/// Re-export protocol types.
pub mod proto {
    pub use pfvf_proto::*;
}
