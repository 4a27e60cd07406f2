/// Errors that can occur while encoding a message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Message type 0 is reserved for "no message".
    #[error("message type 0 is reserved")]
    ZeroType,

    /// The message type does not fit the format's type field.
    #[error("message type {msg_type:#x} out of range (max {max:#x})")]
    TypeOutOfRange { msg_type: u8, max: u32 },

    /// The payload does not fit the format's data field.
    #[error("message data {data:#x} out of range (max {max:#x})")]
    DataOutOfRange { data: u32, max: u32 },
}

pub type Result<T> = std::result::Result<T, CodecError>;
