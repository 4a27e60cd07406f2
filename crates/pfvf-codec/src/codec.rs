use crate::error::{CodecError, Result};

/// A mailbox message.
///
/// `msg_type == 0` means "no message" and is never sent on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Message {
    /// Message type; see [`crate::msgtype`].
    pub msg_type: u8,
    /// Type-specific payload.
    pub data: u32,
}

impl Message {
    /// Create a new message.
    pub const fn new(msg_type: u8, data: u32) -> Self {
        Self { msg_type, data }
    }

    /// True for the "no message" value.
    pub fn is_empty(&self) -> bool {
        self.msg_type == 0
    }
}

/// A bit field inside a register value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    /// Position of the least significant bit.
    pub shift: u32,
    /// Width in bits.
    pub width: u32,
}

impl Field {
    pub const fn new(shift: u32, width: u32) -> Self {
        Self { shift, width }
    }

    /// Largest value the field can hold.
    pub const fn max(&self) -> u32 {
        if self.width >= 32 {
            u32::MAX
        } else {
            (1u32 << self.width) - 1
        }
    }

    /// Mask of the field at its position.
    pub const fn mask(&self) -> u32 {
        self.max() << self.shift
    }

    /// Extract the field from `raw`.
    pub const fn get(&self, raw: u32) -> u32 {
        (raw >> self.shift) & self.max()
    }

    /// Place `value` into the field, truncating bits that don't fit.
    pub const fn prep(&self, value: u32) -> u32 {
        (value & self.max()) << self.shift
    }

    /// True if `value` fits without truncation.
    pub const fn fits(&self, value: u32) -> bool {
        value <= self.max()
    }
}

/// Generation-specific placement of the `type` and `data` fields.
///
/// Offsets are relative to the start of the message area of one direction
/// (bit 0 of the 16-bit half on shared registers).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageFormat {
    pub msg_type: Field,
    pub data: Field,
}

impl MessageFormat {
    /// Shared-register devices: 4-bit type, 10-bit data.
    ///
    /// ```text
    /// 15             6 5      2  1      0
    /// ┌───────────────┬────────┬────────┬──────────┐
    /// │ data (10b)    │ type   │ origin │ doorbell │
    /// └───────────────┴────────┴────────┴──────────┘
    /// ```
    pub const GEN2: Self = Self {
        msg_type: Field::new(2, 4),
        data: Field::new(6, 10),
    };

    /// Dedicated-register devices: 6-bit type, 24-bit data.
    ///
    /// ```text
    /// 31             8 7      2  1      0
    /// ┌───────────────┬────────┬────────┬──────────┐
    /// │ data (24b)    │ type   │ origin │ doorbell │
    /// └───────────────┴────────┴────────┴──────────┘
    /// ```
    pub const GEN4: Self = Self {
        msg_type: Field::new(2, 6),
        data: Field::new(8, 24),
    };
}

/// Pack a message into its register bits.
///
/// Fails if either field overflows its width, or for the reserved type 0.
pub fn encode(msg: &Message, format: &MessageFormat) -> Result<u32> {
    if msg.msg_type == 0 {
        return Err(CodecError::ZeroType);
    }
    if !format.msg_type.fits(u32::from(msg.msg_type)) {
        return Err(CodecError::TypeOutOfRange {
            msg_type: msg.msg_type,
            max: format.msg_type.max(),
        });
    }
    if !format.data.fits(msg.data) {
        return Err(CodecError::DataOutOfRange {
            data: msg.data,
            max: format.data.max(),
        });
    }

    Ok(format.msg_type.prep(u32::from(msg.msg_type)) | format.data.prep(msg.data))
}

/// Unpack a message from register bits.
///
/// Bits outside the two fields are ignored.
pub fn decode(raw: u32, format: &MessageFormat) -> Message {
    Message {
        msg_type: format.msg_type.get(raw) as u8,
        data: format.data.get(raw),
    }
}
