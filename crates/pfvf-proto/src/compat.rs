//! Protocol version negotiation.
//!
//! The VF sends its compat version; the PF answers with its own version and
//! a verdict. Version response data:
//! ```text
//!  9     8 7                 0
//! ┌────────┬──────────────────┐
//! │verdict │ PF version       │
//! └────────┴──────────────────┘
//! ```

use std::sync::Arc;

use serde::Serialize;

use crate::error::{ProtoError, Result};

/// Compat version spoken by this implementation.
pub const COMPAT_VERSION: u8 = 4;

/// First version with the capability summary block.
pub const COMPAT_CAPABILITIES: u8 = 2;

/// First version where the receiver clears the sender's in-use pattern.
pub const COMPAT_FAST_ACK: u8 = 3;

/// First version with the ring-to-service map block.
pub const COMPAT_RING_TO_SVC_MAP: u8 = 4;

/// Version reported in answer to a legacy version request.
pub const LEGACY_VERSION: u8 = 0x11;

const VERSION_MASK: u32 = 0xFF;
const VERDICT_SHIFT: u32 = 8;
const VERDICT_MASK: u32 = 0x3;

/// PF's opinion of a VF's compat version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompatVerdict {
    Compatible = 1,
    Incompatible = 2,
    /// The VF is newer than the PF; the VF decides.
    Unknown = 3,
}

impl CompatVerdict {
    pub fn from_wire(raw: u32) -> Option<Self> {
        match raw {
            1 => Some(CompatVerdict::Compatible),
            2 => Some(CompatVerdict::Incompatible),
            3 => Some(CompatVerdict::Unknown),
            _ => None,
        }
    }
}

/// Data of a version response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionResponse {
    pub version: u8,
    /// `None` if the verdict bits hold no known value.
    pub verdict: Option<CompatVerdict>,
}

impl VersionResponse {
    pub fn new(version: u8, verdict: CompatVerdict) -> Self {
        Self {
            version,
            verdict: Some(verdict),
        }
    }

    pub fn to_data(&self) -> u32 {
        let verdict = self.verdict.map(|v| v as u32).unwrap_or(0);
        u32::from(self.version) | verdict << VERDICT_SHIFT
    }

    pub fn from_data(data: u32) -> Self {
        Self {
            version: (data & VERSION_MASK) as u8,
            verdict: CompatVerdict::from_wire((data >> VERDICT_SHIFT) & VERDICT_MASK),
        }
    }
}

/// Extra PF-side veto on a VF's version, on top of the version rules.
pub trait CompatChecker: Send + Sync {
    fn accepts(&self, vf: usize, vf_version: u8) -> bool;
}

impl<F> CompatChecker for F
where
    F: Fn(usize, u8) -> bool + Send + Sync,
{
    fn accepts(&self, vf: usize, vf_version: u8) -> bool {
        self(vf, vf_version)
    }
}

/// PF verdict for `vf_version`.
pub fn pf_verdict(
    local: u8,
    vf: usize,
    vf_version: u8,
    checkers: &[Arc<dyn CompatChecker>],
) -> CompatVerdict {
    if vf_version == 0 {
        return CompatVerdict::Incompatible;
    }
    if vf_version > local {
        return CompatVerdict::Unknown;
    }
    if checkers.iter().all(|checker| checker.accepts(vf, vf_version)) {
        CompatVerdict::Compatible
    } else {
        CompatVerdict::Incompatible
    }
}

/// VF decision on a PF response. Returns the negotiated version.
pub fn vf_accept(local: u8, min_version: u8, response: VersionResponse) -> Result<u8> {
    let accepted = match response.verdict {
        Some(CompatVerdict::Compatible) => true,
        Some(CompatVerdict::Unknown) => response.version >= min_version,
        Some(CompatVerdict::Incompatible) | None => false,
    };
    if !accepted {
        return Err(ProtoError::Incompatible {
            local,
            remote: response.version,
            verdict: response.verdict,
        });
    }
    Ok(local.min(response.version))
}
