use std::sync::atomic::{AtomicU64, Ordering};

/// Per-endpoint transport counters.
///
/// Observability only; control flow never depends on these values.
#[derive(Debug, Default)]
pub struct TransportStats {
    sent: AtomicU64,
    busy: AtomicU64,
    collisions: AtomicU64,
    no_ack: AtomicU64,
    received: AtomicU64,
    spurious: AtomicU64,
    legacy: AtomicU64,
}

/// Point-in-time copy of [`TransportStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportStatsSnapshot {
    pub sent: u64,
    pub busy: u64,
    pub collisions: u64,
    pub no_ack: u64,
    pub received: u64,
    pub spurious: u64,
    pub legacy: u64,
}

impl TransportStats {
    pub(crate) fn inc_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_busy(&self) {
        self.busy.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_collisions(&self) {
        self.collisions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_no_ack(&self) {
        self.no_ack.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_spurious(&self) {
        self.spurious.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_legacy(&self) {
        self.legacy.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TransportStatsSnapshot {
        TransportStatsSnapshot {
            sent: self.sent.load(Ordering::Relaxed),
            busy: self.busy.load(Ordering::Relaxed),
            collisions: self.collisions.load(Ordering::Relaxed),
            no_ack: self.no_ack.load(Ordering::Relaxed),
            received: self.received.load(Ordering::Relaxed),
            spurious: self.spurious.load(Ordering::Relaxed),
            legacy: self.legacy.load(Ordering::Relaxed),
        }
    }
}
