use std::time::Duration;

use pfvf_blkmsg::BlockError;
use pfvf_transport::TransportError;

use crate::compat::CompatVerdict;

/// Errors surfaced by the PF and VF protocol layers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtoError {
    /// The message could not be delivered to the remote function.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A block transfer failed.
    #[error("block transfer error: {0}")]
    Block(#[from] BlockError),

    /// No response arrived after every retry.
    #[error("no response after {attempts} attempts ({timeout:?} each)")]
    Timeout { attempts: u32, timeout: Duration },

    /// The PF refused, or could not vouch for, our protocol version.
    #[error("incompatible protocol version (local {local}, remote {remote}, verdict {verdict:?})")]
    Incompatible {
        local: u8,
        remote: u8,
        verdict: Option<CompatVerdict>,
    },

    /// The response type does not match the outstanding request.
    #[error("unexpected response type {msg_type:#x} (data {data:#x})")]
    UnexpectedResponse { msg_type: u8, data: u32 },

    /// No endpoint exists for this VF index.
    #[error("unknown VF {0}")]
    UnknownVf(usize),
}

impl ProtoError {
    /// True for integrity failures that must not be retried.
    pub fn is_fault(&self) -> bool {
        match self {
            ProtoError::Block(err) => err.is_fault(),
            ProtoError::UnexpectedResponse { .. } => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ProtoError>;
