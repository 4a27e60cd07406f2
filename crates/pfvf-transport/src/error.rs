use std::time::Duration;

use pfvf_codec::CodecError;

/// Errors that can occur while sending a mailbox message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The remote function still owns the register.
    #[error("mailbox busy: remote in-use pattern present")]
    Busy,

    /// A notification's in-use pattern was overwritten by the remote.
    #[error("mailbox collision: notification overwritten by remote")]
    Collision,

    /// The remote never cleared the doorbell.
    #[error("no ack from remote after {waited:?}")]
    NoAck { waited: Duration },

    /// The message does not fit the register format.
    #[error("invalid message: {0}")]
    Codec(#[from] CodecError),
}

impl TransportError {
    /// True for conditions that are retried inside [`crate::CsrTransport::send`].
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransportError::Busy | TransportError::Collision)
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
