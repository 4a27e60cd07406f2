//! Register bit layout per device generation and direction.
//!
//! Shared register (GEN2), one per VF:
//! ```text
//!  31                      17   16 15                       1    0
//! ┌──────────────────────┬────┬────┬──────────────────────┬────┬────┐
//! │ VF→PF message        │ org│ db │ PF→VF message        │ org│ db │
//! └──────────────────────┴────┴────┴──────────────────────┴────┴────┘
//! ```
//! A sender writes its message into its own half and its in-use pattern
//! into the other half. The pattern is compared under [`IN_USE_MASK`], which
//! leaves the doorbell bit alone, and decodes as message type 0, so it is
//! never mistaken for a real message.
//!
//! Dedicated registers (GEN4) carry one direction each: doorbell bit 0,
//! origin bit 1, message above. There is no in-use pattern.

use pfvf_codec::{msgtype, MessageFormat};

/// Doorbell ("unread message") bit, relative to the message half.
pub const DOORBELL: u32 = 1 << 0;

/// Origin bit: set for protocol messages, clear for legacy messages.
pub const ORIGIN_SYSTEM: u32 = 1 << 1;

/// In-use pattern written into the other half by the current owner.
pub const IN_USE_PATTERN: u32 = 0x6AC2;

/// Mask used when matching [`IN_USE_PATTERN`].
pub const IN_USE_MASK: u32 = 0xFFFE;

const HALF_MASK: u32 = 0xFFFF;

/// Direction a message travels in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    PfToVf,
    VfToPf,
}

impl Direction {
    /// The opposite direction.
    pub fn reverse(self) -> Self {
        match self {
            Direction::PfToVf => Direction::VfToPf,
            Direction::VfToPf => Direction::PfToVf,
        }
    }

    /// True if `msg_type` is a fire-and-forget notification in this direction.
    pub fn is_notification(self, msg_type: u8) -> bool {
        match self {
            Direction::PfToVf => msgtype::is_pf2vf_notification(msg_type),
            Direction::VfToPf => msgtype::is_vf2pf_notification(msg_type),
        }
    }

    /// Human-readable name of `msg_type` in this direction.
    pub fn type_name(self, msg_type: u8) -> &'static str {
        match self {
            Direction::PfToVf => msgtype::pf2vf_name(msg_type),
            Direction::VfToPf => msgtype::vf2pf_name(msg_type),
        }
    }
}

/// Register organisation of a device generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layout {
    /// One register per VF shared by both directions (GEN2).
    Shared,
    /// One register per direction per VF (GEN4).
    Dedicated,
}

impl Layout {
    /// Message format used on this layout.
    pub fn format(self) -> MessageFormat {
        match self {
            Layout::Shared => MessageFormat::GEN2,
            Layout::Dedicated => MessageFormat::GEN4,
        }
    }
}

/// A pattern/mask pair located somewhere in the register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sentinel {
    pub pattern: u32,
    pub mask: u32,
}

impl Sentinel {
    /// True if `csr_val` carries this sentinel.
    pub fn matches(&self, csr_val: u32) -> bool {
        csr_val & self.mask == self.pattern
    }
}

/// Absolute bit positions one direction uses in its register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lane {
    /// Shift of the message area.
    pub msg_shift: u32,
    /// Mask of the message area (doorbell and origin included).
    pub msg_mask: u32,
    /// Doorbell bit.
    pub doorbell: u32,
    /// Origin bit.
    pub origin: u32,
    /// In-use pattern the sender of this direction writes, if any.
    pub in_use: Option<Sentinel>,
}

impl Lane {
    /// Bit positions used by messages travelling in `direction`.
    pub fn of(layout: Layout, direction: Direction) -> Self {
        match layout {
            Layout::Dedicated => Self {
                msg_shift: 0,
                msg_mask: u32::MAX,
                doorbell: DOORBELL,
                origin: ORIGIN_SYSTEM,
                in_use: None,
            },
            Layout::Shared => {
                let (msg_shift, pattern_shift) = match direction {
                    Direction::PfToVf => (0, 16),
                    Direction::VfToPf => (16, 0),
                };
                Self {
                    msg_shift,
                    msg_mask: HALF_MASK << msg_shift,
                    doorbell: DOORBELL << msg_shift,
                    origin: ORIGIN_SYSTEM << msg_shift,
                    in_use: Some(Sentinel {
                        pattern: IN_USE_PATTERN << pattern_shift,
                        mask: IN_USE_MASK << pattern_shift,
                    }),
                }
            }
        }
    }

    /// Message bits of this lane, shifted down to bit 0.
    pub fn extract(&self, csr_val: u32) -> u32 {
        (csr_val & self.msg_mask) >> self.msg_shift
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_lanes_mirror_each_other() {
        let pf = Lane::of(Layout::Shared, Direction::PfToVf);
        let vf = Lane::of(Layout::Shared, Direction::VfToPf);

        assert_eq!(pf.doorbell, 1 << 0);
        assert_eq!(vf.doorbell, 1 << 16);
        assert_eq!(pf.origin, 1 << 1);
        assert_eq!(vf.origin, 1 << 17);
        assert_eq!(pf.in_use.unwrap().pattern, 0x6AC2_0000);
        assert_eq!(vf.in_use.unwrap().pattern, 0x0000_6AC2);
        assert_eq!(pf.msg_mask & vf.msg_mask, 0);
    }

    #[test]
    fn in_use_pattern_never_touches_a_doorbell() {
        for direction in [Direction::PfToVf, Direction::VfToPf] {
            let lane = Lane::of(Layout::Shared, direction);
            let sentinel = lane.in_use.unwrap();
            assert_eq!(sentinel.pattern & (DOORBELL | DOORBELL << 16), 0);
        }
    }

    #[test]
    fn in_use_pattern_decodes_as_no_message() {
        let decoded = pfvf_codec::decode(IN_USE_PATTERN, &MessageFormat::GEN2);
        assert!(decoded.is_empty());
    }

    #[test]
    fn dedicated_lane_has_no_sentinel() {
        let lane = Lane::of(Layout::Dedicated, Direction::VfToPf);
        assert_eq!(lane.doorbell, DOORBELL);
        assert!(lane.in_use.is_none());
        assert_eq!(lane.extract(0xDEAD_BEEF), 0xDEAD_BEEF);
    }

    #[test]
    fn extract_shifts_down() {
        let lane = Lane::of(Layout::Shared, Direction::VfToPf);
        assert_eq!(lane.extract(0x1234_6AC2), 0x1234);
    }

    #[test]
    fn notification_classification_per_direction() {
        assert!(Direction::PfToVf.is_notification(msgtype::PF2VF_RESTARTING));
        assert!(!Direction::VfToPf.is_notification(msgtype::PF2VF_RESTARTING));
        assert!(Direction::VfToPf.is_notification(msgtype::VF2PF_INIT));
        assert_eq!(Direction::PfToVf.reverse(), Direction::VfToPf);
    }
}
