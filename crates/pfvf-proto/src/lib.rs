//! PF and VF protocol contexts for the register mailbox.
//!
//! Built on [`pfvf_transport`] for single-message delivery and
//! [`pfvf_blkmsg`] for block transfers:
//! - [`PfProtocol`] answers version and block requests from every VF and
//!   broadcasts reset notifications
//! - [`VfProtocol`] negotiates a version, fetches configuration blocks and
//!   reports its lifecycle to the PF
//! - [`Loopback`] wires both to one in-memory register file

pub mod compat;
pub mod completion;
pub mod config;
pub mod correlator;
pub mod error;
pub mod events;
pub mod function;
pub mod loopback;
pub mod pf;
pub mod stats;
pub mod vf;

pub use compat::{
    pf_verdict, vf_accept, CompatChecker, CompatVerdict, VersionResponse, COMPAT_CAPABILITIES,
    COMPAT_FAST_ACK, COMPAT_RING_TO_SVC_MAP, COMPAT_VERSION, LEGACY_VERSION,
};
pub use completion::Completion;
pub use config::ProtocolConfig;
pub use correlator::{CompletionWaiter, Correlator, PollingWaiter, Waiter};
pub use error::{ProtoError, Result};
pub use events::{NoEvents, PfEvents, VfEvents};
pub use function::Function;
pub use loopback::{mailbox_offsets, Loopback, LoopbackConfig, MAILBOX_BASE};
pub use pf::{PfProtocol, VfState};
pub use stats::{ProtoStats, ProtoStatsSnapshot};
pub use vf::{PfStatus, VfProtocol, VfSession};
