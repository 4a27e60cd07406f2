use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Protocol-level counters of one PF or VF context.
///
/// Register-level events are counted by the transport.
#[derive(Debug, Default)]
pub struct ProtoStats {
    requests: AtomicU64,
    responses: AtomicU64,
    orphan_responses: AtomicU64,
    timeouts: AtomicU64,
    notifications: AtomicU64,
    unknown: AtomicU64,
    rejected: AtomicU64,
}

/// Point-in-time copy of [`ProtoStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProtoStatsSnapshot {
    pub requests: u64,
    pub responses: u64,
    pub orphan_responses: u64,
    pub timeouts: u64,
    pub notifications: u64,
    pub unknown: u64,
    /// Block requests answered with an error (PF) or failed transfers and
    /// mismatched responses (VF).
    pub rejected: u64,
}

impl ProtoStats {
    pub(crate) fn inc_requests(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_responses(&self) {
        self.responses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_orphan_responses(&self) {
        self.orphan_responses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_timeouts(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_notifications(&self) {
        self.notifications.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_unknown(&self) {
        self.unknown.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ProtoStatsSnapshot {
        ProtoStatsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            responses: self.responses.load(Ordering::Relaxed),
            orphan_responses: self.orphan_responses.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            notifications: self.notifications.load(Ordering::Relaxed),
            unknown: self.unknown.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}
