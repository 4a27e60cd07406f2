//! Mailbox message types.
//!
//! Types are per direction: the same numeric value means different things
//! VF→PF and PF→VF. Type 0 is reserved for "no message".

/// VF→PF: VF driver is up.
pub const VF2PF_INIT: u8 = 0x03;
/// VF→PF: VF driver is going down.
pub const VF2PF_SHUTDOWN: u8 = 0x04;
/// VF→PF: version request from a pre-compat-version VF driver.
pub const VF2PF_VERSION_REQ: u8 = 0x05;
/// VF→PF: compatibility version request.
pub const VF2PF_COMPAT_VER_REQ: u8 = 0x06;
/// VF→PF: get one byte of a large block.
pub const VF2PF_LARGE_BLOCK_REQ: u8 = 0x07;
/// VF→PF: get one byte of a medium block.
pub const VF2PF_MEDIUM_BLOCK_REQ: u8 = 0x08;
/// VF→PF: get one byte of a small block.
pub const VF2PF_SMALL_BLOCK_REQ: u8 = 0x09;
/// VF→PF: generic notification with opaque data.
pub const VF2PF_NOTIFY: u8 = 0x0A;

/// PF→VF: PF is restarting; the VF must quiesce.
pub const PF2VF_RESTARTING: u8 = 0x01;
/// PF→VF: answer to a (compat) version request.
pub const PF2VF_VERSION_RESP: u8 = 0x02;
/// PF→VF: answer to a block request.
pub const PF2VF_BLKMSG_RESP: u8 = 0x03;
/// PF→VF: the device hit a fatal error.
pub const PF2VF_FATAL_ERROR: u8 = 0x04;

/// Returns true for VF→PF fire-and-forget notifications.
///
/// The receiver leaves the sender's in-use pattern in place for these.
pub fn is_vf2pf_notification(msg_type: u8) -> bool {
    matches!(msg_type, VF2PF_INIT | VF2PF_SHUTDOWN | VF2PF_NOTIFY)
}

/// Returns true for PF→VF fire-and-forget notifications.
pub fn is_pf2vf_notification(msg_type: u8) -> bool {
    matches!(msg_type, PF2VF_RESTARTING | PF2VF_FATAL_ERROR)
}

/// Returns true for PF→VF messages that answer a pending VF request.
pub fn is_pf2vf_response(msg_type: u8) -> bool {
    matches!(msg_type, PF2VF_VERSION_RESP | PF2VF_BLKMSG_RESP)
}

/// Returns true for VF→PF block requests of any size class.
pub fn is_vf2pf_block_request(msg_type: u8) -> bool {
    matches!(
        msg_type,
        VF2PF_LARGE_BLOCK_REQ | VF2PF_MEDIUM_BLOCK_REQ | VF2PF_SMALL_BLOCK_REQ
    )
}

/// Returns a human-readable name for a VF→PF message type.
pub fn vf2pf_name(msg_type: u8) -> &'static str {
    match msg_type {
        VF2PF_INIT => "INIT",
        VF2PF_SHUTDOWN => "SHUTDOWN",
        VF2PF_VERSION_REQ => "VERSION_REQ",
        VF2PF_COMPAT_VER_REQ => "COMPAT_VER_REQ",
        VF2PF_LARGE_BLOCK_REQ => "LARGE_BLOCK_REQ",
        VF2PF_MEDIUM_BLOCK_REQ => "MEDIUM_BLOCK_REQ",
        VF2PF_SMALL_BLOCK_REQ => "SMALL_BLOCK_REQ",
        VF2PF_NOTIFY => "NOTIFY",
        _ => "UNKNOWN",
    }
}

/// Returns a human-readable name for a PF→VF message type.
pub fn pf2vf_name(msg_type: u8) -> &'static str {
    match msg_type {
        PF2VF_RESTARTING => "RESTARTING",
        PF2VF_VERSION_RESP => "VERSION_RESP",
        PF2VF_BLKMSG_RESP => "BLKMSG_RESP",
        PF2VF_FATAL_ERROR => "FATAL_ERROR",
        _ => "UNKNOWN",
    }
}
