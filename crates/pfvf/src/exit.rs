use std::fmt;
use std::io;

use pfvf_blkmsg::BlockError;
use pfvf_proto::ProtoError;
use pfvf_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(USAGE, message)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::NotFound | io::ErrorKind::InvalidInput => USAGE,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Codec(_) => CliError::new(USAGE, format!("{context}: {err}")),
        TransportError::NoAck { .. } => CliError::new(TIMEOUT, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn block_error(context: &str, err: BlockError) -> CliError {
    match err {
        BlockError::InvalidType { .. }
        | BlockError::BufferTooSmall { .. }
        | BlockError::IndexOutOfRange { .. } => CliError::new(USAGE, format!("{context}: {err}")),
        BlockError::Remote { .. } => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn proto_error(context: &str, err: ProtoError) -> CliError {
    match err {
        ProtoError::Transport(err) => transport_error(context, err),
        ProtoError::Block(err) => block_error(context, err),
        ProtoError::Timeout { .. } => CliError::new(TIMEOUT, format!("{context}: {err}")),
        ProtoError::Incompatible { .. } => CliError::new(FAILURE, format!("{context}: {err}")),
        ProtoError::UnexpectedResponse { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        ProtoError::UnknownVf(_) => CliError::new(USAGE, format!("{context}: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pfvf_blkmsg::BlockErrorCode;

    use super::*;

    #[test]
    fn protocol_errors_map_to_stable_codes() {
        let timeout = ProtoError::Timeout {
            attempts: 5,
            timeout: Duration::from_millis(100),
        };
        assert_eq!(proto_error("attach", timeout).code, TIMEOUT);

        let incompatible = ProtoError::Incompatible {
            local: 4,
            remote: 2,
            verdict: None,
        };
        assert_eq!(proto_error("attach", incompatible).code, FAILURE);

        let busy = ProtoError::Transport(TransportError::Busy);
        assert_eq!(proto_error("attach", busy).code, TRANSPORT_ERROR);
    }

    #[test]
    fn block_faults_are_data_invalid() {
        let crc = BlockError::CrcMismatch {
            block_type: 2,
            local: 0x10,
            remote: 0x11,
        };
        let err = proto_error("block", ProtoError::Block(crc));
        assert_eq!(err.code, DATA_INVALID);
        assert!(err.message.starts_with("block: "));

        let remote = BlockError::Remote {
            block_type: 9,
            code: BlockErrorCode::InvalidBlockType,
        };
        assert_eq!(block_error("block", remote).code, FAILURE);
        assert_eq!(
            block_error("block", BlockError::InvalidType { block_type: 28 }).code,
            USAGE
        );
    }
}
