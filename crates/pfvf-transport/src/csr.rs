use std::sync::{Arc, Mutex};
use std::time::Duration;

use pfvf_codec::{decode, encode, Message};
use tracing::{debug, warn};

use crate::clock::SystemClock;
use crate::error::{Result, TransportError};
use crate::layout::{Direction, Lane, Layout};
use crate::stats::{TransportStats, TransportStatsSnapshot};
use crate::traits::{Clock, Csr};

/// Timing parameters of the send state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// First delay between ack polls.
    pub ack_delay_min: Duration,
    /// Poll delay cap; polling continues at this interval.
    pub ack_delay_max: Duration,
    /// Give up waiting for the doorbell to clear after this long.
    pub ack_timeout: Duration,
    /// First backoff after `Busy` or `Collision`. Doubles per attempt.
    pub retry_delay: Duration,
    /// Total send attempts on `Busy` / `Collision`.
    pub max_attempts: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ack_delay_min: Duration::from_micros(5),
            ack_delay_max: Duration::from_millis(5),
            ack_timeout: Duration::from_secs(2),
            retry_delay: Duration::from_millis(5),
            max_attempts: 10,
        }
    }
}

/// Outcome of reading the receive side of a mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Received {
    /// Doorbell not set; nothing to read.
    Spurious(u32),
    /// Non-protocol message; drained and ignored.
    Legacy(u32),
    /// A protocol message, already acknowledged.
    Message(Message),
}

/// One end of a PF/VF mailbox.
///
/// Sends in one direction and receives in the other. The send mutex covers
/// the busy check, the write and the wait for the ack, so two local senders
/// never interleave on the register.
pub struct CsrTransport {
    csr: Arc<dyn Csr>,
    clock: Arc<dyn Clock>,
    layout: Layout,
    direction: Direction,
    tx_offset: u32,
    rx_offset: u32,
    config: TransportConfig,
    lock: Mutex<()>,
    stats: TransportStats,
}

impl CsrTransport {
    /// Create a transport sending in `direction`.
    ///
    /// On [`Layout::Shared`] both offsets name the same register.
    pub fn new(
        csr: Arc<dyn Csr>,
        layout: Layout,
        direction: Direction,
        tx_offset: u32,
        rx_offset: u32,
    ) -> Self {
        Self {
            csr,
            clock: Arc::new(SystemClock::new()),
            layout,
            direction,
            tx_offset,
            rx_offset,
            config: TransportConfig::default(),
            lock: Mutex::new(()),
            stats: TransportStats::default(),
        }
    }

    /// Override the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Override timing parameters.
    pub fn with_config(mut self, config: TransportConfig) -> Self {
        self.config = config;
        self
    }

    /// Send a message, retrying on `Busy` / `Collision`.
    ///
    /// `NoAck` is returned immediately; the caller decides whether to retry.
    pub fn send(&self, msg: Message) -> Result<()> {
        let payload = encode(&msg, &self.layout.format())?;
        let notification = self.direction.is_notification(msg.msg_type);
        let name = self.direction.type_name(msg.msg_type);

        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut backoff = self.config.retry_delay;
        let mut attempt = 1u32;
        loop {
            match self.attempt(payload, notification) {
                Ok(()) => {
                    self.stats.inc_sent();
                    debug!(
                        direction = ?self.direction,
                        msg_type = name,
                        data = msg.data,
                        attempt,
                        "mailbox message sent"
                    );
                    return Ok(());
                }
                Err(err) if err.is_retryable() && attempt < self.config.max_attempts => {
                    debug!(
                        direction = ?self.direction,
                        msg_type = name,
                        attempt,
                        error = %err,
                        "mailbox send retry"
                    );
                    self.clock.sleep(backoff);
                    backoff = backoff.saturating_mul(2);
                    attempt += 1;
                }
                Err(err) => {
                    warn!(
                        direction = ?self.direction,
                        msg_type = name,
                        attempt,
                        error = %err,
                        "mailbox send failed"
                    );
                    return Err(err);
                }
            }
        }
    }

    fn attempt(&self, payload: u32, notification: bool) -> Result<()> {
        let lane = Lane::of(self.layout, self.direction);
        let local = lane.in_use;
        let remote = Lane::of(self.layout, self.direction.reverse()).in_use;

        if let Some(remote) = remote {
            let csr_val = self.csr.read(self.tx_offset);
            if remote.matches(csr_val) {
                self.stats.inc_busy();
                return Err(TransportError::Busy);
            }
        }

        let msg_val = (payload << lane.msg_shift)
            | lane.origin
            | local.map(|sentinel| sentinel.pattern).unwrap_or(0);
        self.csr.write(self.tx_offset, msg_val | lane.doorbell);

        let csr_val = match self.wait_for_ack(lane.doorbell) {
            Ok(csr_val) => csr_val,
            Err(csr_val) => {
                let mut withdrawn = csr_val & !lane.doorbell;
                if let Some(local) = local.filter(|sentinel| sentinel.matches(withdrawn)) {
                    withdrawn &= !local.mask;
                }
                self.csr.write(self.tx_offset, withdrawn);
                self.stats.inc_no_ack();
                return Err(TransportError::NoAck {
                    waited: self.config.ack_timeout,
                });
            }
        };

        if notification && local.is_some() && csr_val != msg_val {
            self.stats.inc_collisions();
            return Err(TransportError::Collision);
        }

        // Notifications, and receivers without fast-ack, leave our pattern
        // behind; release the register ourselves.
        if let Some(local) = local.filter(|sentinel| sentinel.matches(csr_val)) {
            self.csr.write(self.tx_offset, csr_val & !local.mask);
        }

        Ok(())
    }

    /// Poll until `doorbell` clears. `Err` carries the last value read.
    fn wait_for_ack(&self, doorbell: u32) -> std::result::Result<u32, u32> {
        let start = self.clock.now();
        let mut delay = self.config.ack_delay_min;
        loop {
            let csr_val = self.csr.read(self.tx_offset);
            if csr_val & doorbell == 0 {
                return Ok(csr_val);
            }
            if self.clock.now().saturating_sub(start) >= self.config.ack_timeout {
                return Err(csr_val);
            }
            self.clock.sleep(delay);
            delay = delay.saturating_mul(2).min(self.config.ack_delay_max);
        }
    }

    /// Read and acknowledge the message sent by the remote, if any.
    ///
    /// Never blocks. Intended for the interrupt handler.
    pub fn recv(&self) -> Received {
        let rx_direction = self.direction.reverse();
        let lane = Lane::of(self.layout, rx_direction);
        let csr_val = self.csr.read(self.rx_offset);

        if csr_val & lane.doorbell == 0 {
            self.stats.inc_spurious();
            debug!(
                direction = ?rx_direction,
                csr = format_args!("{csr_val:#010x}"),
                "spurious mailbox interrupt"
            );
            return Received::Spurious(csr_val);
        }

        if csr_val & lane.origin == 0 {
            // The legacy sender releases its own in-use pattern.
            self.csr.write(self.rx_offset, csr_val & !lane.doorbell);
            self.stats.inc_legacy();
            warn!(
                direction = ?rx_direction,
                csr = format_args!("{csr_val:#010x}"),
                "ignored non-system mailbox message"
            );
            return Received::Legacy(csr_val);
        }

        let msg = decode(lane.extract(csr_val), &self.layout.format());

        let mut ack = csr_val & !lane.doorbell;
        if !rx_direction.is_notification(msg.msg_type) {
            if let Some(remote) = lane.in_use.filter(|sentinel| sentinel.matches(ack)) {
                ack &= !remote.mask;
            }
        }
        self.csr.write(self.rx_offset, ack);
        self.stats.inc_received();

        debug!(
            direction = ?rx_direction,
            msg_type = rx_direction.type_name(msg.msg_type),
            data = msg.data,
            "mailbox message received"
        );
        Received::Message(msg)
    }

    /// Device generation layout.
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Direction this transport sends in.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Current timing configuration.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Time source used for polling and backoff.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Counter snapshot.
    pub fn stats(&self) -> TransportStatsSnapshot {
        self.stats.snapshot()
    }
}

impl std::fmt::Debug for CsrTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsrTransport")
            .field("layout", &self.layout)
            .field("direction", &self.direction)
            .field("tx_offset", &format_args!("{:#x}", self.tx_offset))
            .field("rx_offset", &format_args!("{:#x}", self.rx_offset))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use pfvf_codec::{msgtype, CodecError};

    use super::*;
    use crate::clock::VirtualClock;
    use crate::layout::{DOORBELL, IN_USE_MASK, IN_USE_PATTERN, ORIGIN_SYSTEM};
    use crate::memory::MemoryCsr;

    const OFFSET: u32 = 0x3A280;
    const VF_DOORBELL: u32 = DOORBELL << 16;
    const VF_PATTERN: u32 = IN_USE_PATTERN;
    const PF_PATTERN: u32 = IN_USE_PATTERN << 16;

    fn vf_transport(csr: Arc<dyn Csr>, clock: Arc<VirtualClock>) -> CsrTransport {
        CsrTransport::new(csr, Layout::Shared, Direction::VfToPf, OFFSET, OFFSET).with_clock(clock)
    }

    fn pf_transport(csr: Arc<dyn Csr>, clock: Arc<VirtualClock>) -> CsrTransport {
        CsrTransport::new(csr, Layout::Shared, Direction::PfToVf, OFFSET, OFFSET).with_clock(clock)
    }

    /// Remote that acks VF→PF messages by clearing the doorbell and, when
    /// `fast_ack` is set, the VF's in-use pattern.
    fn pf_acker(fast_ack: bool) -> crate::memory::WriteHook {
        Arc::new(move |regs, offset, old, new| {
            if new & VF_DOORBELL != 0 && old & VF_DOORBELL == 0 {
                let mut ack = new & !VF_DOORBELL;
                if fast_ack {
                    ack &= !IN_USE_MASK;
                }
                regs.poke(offset, ack);
            }
        })
    }

    #[test]
    fn request_acked_with_fast_ack() {
        let csr = Arc::new(MemoryCsr::new());
        csr.set_write_hook(pf_acker(true));
        let clock = Arc::new(VirtualClock::new());
        let transport = vf_transport(csr.clone(), clock);

        transport
            .send(Message::new(msgtype::VF2PF_COMPAT_VER_REQ, 4))
            .unwrap();

        let csr_val = csr.peek(OFFSET);
        assert_eq!(csr_val & VF_DOORBELL, 0);
        assert_eq!(csr_val & IN_USE_MASK, 0);
        assert_eq!(csr.write_count(), 1);
        assert_eq!(transport.stats().sent, 1);
    }

    #[test]
    fn sender_releases_pattern_for_old_receivers() {
        let csr = Arc::new(MemoryCsr::new());
        csr.set_write_hook(pf_acker(false));
        let clock = Arc::new(VirtualClock::new());
        let transport = vf_transport(csr.clone(), clock);

        transport
            .send(Message::new(msgtype::VF2PF_COMPAT_VER_REQ, 4))
            .unwrap();

        assert_eq!(csr.peek(OFFSET) & IN_USE_MASK, 0);
        assert_eq!(csr.write_count(), 2);
    }

    #[test]
    fn written_value_carries_message_origin_pattern_and_doorbell() {
        let csr = Arc::new(MemoryCsr::new());
        let first = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&first);
        csr.set_write_hook(Arc::new(move |regs, offset, _, new| {
            if seen.load(Ordering::Relaxed) == 0 {
                seen.store(new, Ordering::Relaxed);
                regs.poke(offset, new & !DOORBELL);
            }
        }));
        let transport = pf_transport(csr, Arc::new(VirtualClock::new()));

        transport
            .send(Message::new(msgtype::PF2VF_VERSION_RESP, 0x104))
            .unwrap();

        let expected = PF_PATTERN
            | (0x104 << 6)
            | (u32::from(msgtype::PF2VF_VERSION_RESP) << 2)
            | ORIGIN_SYSTEM
            | DOORBELL;
        assert_eq!(first.load(Ordering::Relaxed), expected);
    }

    #[test]
    fn busy_register_is_never_written() {
        let csr = Arc::new(MemoryCsr::new());
        csr.poke(OFFSET, PF_PATTERN);
        let clock = Arc::new(VirtualClock::new());
        let transport = vf_transport(csr.clone(), clock.clone());

        let err = transport
            .send(Message::new(msgtype::VF2PF_INIT, 0))
            .unwrap_err();

        assert_eq!(err, TransportError::Busy);
        assert_eq!(csr.write_count(), 0);
        assert_eq!(csr.peek(OFFSET), PF_PATTERN);
        assert_eq!(transport.stats().busy, 10);
        assert_eq!(clock.sleep_count(), 9);
        // 5ms doubling over nine backoffs.
        assert_eq!(clock.now(), Duration::from_millis(5 * 511));
    }

    struct BusyThenFree {
        inner: MemoryCsr,
        busy_reads: AtomicU32,
    }

    impl Csr for BusyThenFree {
        fn read(&self, offset: u32) -> u32 {
            if self
                .busy_reads
                .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
                .is_ok()
            {
                return PF_PATTERN;
            }
            self.inner.read(offset)
        }

        fn write(&self, offset: u32, value: u32) {
            self.inner.write(offset, value)
        }
    }

    #[test]
    fn busy_then_free_succeeds_within_attempt_budget() {
        let inner = MemoryCsr::new();
        inner.set_write_hook(pf_acker(true));
        let csr = Arc::new(BusyThenFree {
            inner,
            busy_reads: AtomicU32::new(3),
        });
        let clock = Arc::new(VirtualClock::new());
        let transport = vf_transport(csr.clone(), clock.clone());

        transport
            .send(Message::new(msgtype::VF2PF_COMPAT_VER_REQ, 4))
            .unwrap();

        let stats = transport.stats();
        assert_eq!(stats.busy, 3);
        assert_eq!(stats.sent, 1);
        assert_eq!(csr.inner.write_count(), 1);
        assert_eq!(clock.now(), Duration::from_millis(5 + 10 + 20));
    }

    #[test]
    fn no_ack_after_ceiling_and_message_withdrawn() {
        let csr = Arc::new(MemoryCsr::new());
        let clock = Arc::new(VirtualClock::new());
        let transport = vf_transport(csr.clone(), clock.clone());

        let err = transport
            .send(Message::new(msgtype::VF2PF_COMPAT_VER_REQ, 4))
            .unwrap_err();

        assert_eq!(
            err,
            TransportError::NoAck {
                waited: Duration::from_secs(2)
            }
        );
        let elapsed = clock.now();
        assert!(elapsed >= Duration::from_secs(2));
        assert!(elapsed < Duration::from_secs(2) + Duration::from_millis(5));
        assert_eq!(csr.write_count(), 2);
        assert_eq!(csr.peek(OFFSET) & VF_DOORBELL, 0);
        assert_eq!(csr.peek(OFFSET) & IN_USE_MASK, 0);
        assert_eq!(transport.stats().no_ack, 1);
    }

    #[test]
    fn no_ack_is_not_retried() {
        let csr = Arc::new(MemoryCsr::new());
        let clock = Arc::new(VirtualClock::new());
        let transport = vf_transport(csr.clone(), clock).with_config(TransportConfig {
            ack_timeout: Duration::from_millis(1),
            ..TransportConfig::default()
        });

        assert!(matches!(
            transport.send(Message::new(msgtype::VF2PF_INIT, 0)),
            Err(TransportError::NoAck { .. })
        ));
        assert_eq!(transport.stats().no_ack, 1);
        assert_eq!(transport.stats().busy, 0);
    }

    #[test]
    fn notification_overwritten_is_collision_then_resent() {
        let csr = Arc::new(MemoryCsr::new());
        let writes = Arc::new(AtomicU32::new(0));
        let count = Arc::clone(&writes);
        csr.set_write_hook(Arc::new(move |regs, offset, _, new| {
            if new & DOORBELL == 0 {
                return;
            }
            match count.fetch_add(1, Ordering::Relaxed) {
                // VF wrote a request over our notification; the PF receive
                // path already consumed it and released the VF pattern.
                0 => regs.poke(offset, (0x0018 | ORIGIN_SYSTEM) << 16),
                // VF acks the resent notification and leaves our pattern.
                _ => regs.poke(offset, new & !DOORBELL),
            }
        }));
        let clock = Arc::new(VirtualClock::new());
        let transport = pf_transport(csr.clone(), clock);

        transport
            .send(Message::new(msgtype::PF2VF_RESTARTING, 0))
            .unwrap();

        let stats = transport.stats();
        assert_eq!(stats.collisions, 1);
        assert_eq!(stats.sent, 1);
        assert_eq!(csr.peek(OFFSET) & (IN_USE_MASK << 16), 0);
    }

    #[test]
    fn single_attempt_surfaces_collision() {
        let csr = Arc::new(MemoryCsr::new());
        csr.set_write_hook(Arc::new(|regs, offset, _, new| {
            if new & DOORBELL != 0 {
                regs.poke(offset, 0);
            }
        }));
        let transport =
            pf_transport(csr, Arc::new(VirtualClock::new())).with_config(TransportConfig {
                max_attempts: 1,
                ..TransportConfig::default()
            });

        assert_eq!(
            transport.send(Message::new(msgtype::PF2VF_FATAL_ERROR, 0)),
            Err(TransportError::Collision)
        );
    }

    #[test]
    fn oversized_message_is_rejected_before_any_access() {
        let csr = Arc::new(MemoryCsr::new());
        let transport = vf_transport(csr.clone(), Arc::new(VirtualClock::new()));

        let err = transport
            .send(Message::new(msgtype::VF2PF_NOTIFY, 0x400))
            .unwrap_err();
        assert!(matches!(
            err,
            TransportError::Codec(CodecError::DataOutOfRange { .. })
        ));
        assert_eq!(csr.write_count(), 0);
    }

    #[test]
    fn recv_spurious_when_doorbell_clear() {
        let csr = Arc::new(MemoryCsr::new());
        csr.poke(OFFSET, 0x0000_0024);
        let transport = pf_transport(csr.clone(), Arc::new(VirtualClock::new()));

        assert_eq!(transport.recv(), Received::Spurious(0x24));
        assert_eq!(csr.write_count(), 0);
        assert_eq!(transport.stats().spurious, 1);
    }

    #[test]
    fn recv_drains_legacy_message() {
        let csr = Arc::new(MemoryCsr::new());
        let raw = (0x0014 | DOORBELL) << 16 | VF_PATTERN;
        csr.poke(OFFSET, raw);
        let transport = pf_transport(csr.clone(), Arc::new(VirtualClock::new()));

        assert_eq!(transport.recv(), Received::Legacy(raw));
        assert_eq!(csr.peek(OFFSET), raw & !VF_DOORBELL);
        assert_eq!(transport.stats().legacy, 1);
    }

    #[test]
    fn recv_request_clears_doorbell_and_sender_pattern() {
        let csr = Arc::new(MemoryCsr::new());
        let msg = Message::new(msgtype::VF2PF_COMPAT_VER_REQ, 4);
        let payload = encode(&msg, &Layout::Shared.format()).unwrap();
        csr.poke(OFFSET, (payload | ORIGIN_SYSTEM | DOORBELL) << 16 | VF_PATTERN);
        let transport = pf_transport(csr.clone(), Arc::new(VirtualClock::new()));

        assert_eq!(transport.recv(), Received::Message(msg));
        assert_eq!(csr.peek(OFFSET), (payload | ORIGIN_SYSTEM) << 16);
        assert_eq!(transport.stats().received, 1);
    }

    #[test]
    fn recv_notification_keeps_sender_pattern() {
        let csr = Arc::new(MemoryCsr::new());
        let msg = Message::new(msgtype::VF2PF_INIT, 0);
        let payload = encode(&msg, &Layout::Shared.format()).unwrap();
        csr.poke(OFFSET, (payload | ORIGIN_SYSTEM | DOORBELL) << 16 | VF_PATTERN);
        let transport = pf_transport(csr.clone(), Arc::new(VirtualClock::new()));

        assert_eq!(transport.recv(), Received::Message(msg));
        assert_eq!(csr.peek(OFFSET) & IN_USE_MASK, VF_PATTERN);
        assert_eq!(csr.peek(OFFSET) & VF_DOORBELL, 0);
    }

    #[test]
    fn dedicated_layout_roundtrip() {
        const VF2PF: u32 = 0x1000;
        const PF2VF: u32 = 0x1004;
        let csr = Arc::new(MemoryCsr::new());
        let clock = Arc::new(VirtualClock::new());
        let vf = CsrTransport::new(csr.clone(), Layout::Dedicated, Direction::VfToPf, VF2PF, PF2VF)
            .with_clock(clock.clone());
        let pf = CsrTransport::new(csr.clone(), Layout::Dedicated, Direction::PfToVf, PF2VF, VF2PF)
            .with_clock(clock);

        let received = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&received);
        let pf = Arc::new(pf);
        let handler = Arc::clone(&pf);
        csr.set_write_hook(Arc::new(move |_, offset, old, new| {
            if offset == VF2PF && new & DOORBELL != 0 && old & DOORBELL == 0 {
                *slot.lock().unwrap() = Some(handler.recv());
            }
        }));

        let msg = Message::new(msgtype::VF2PF_NOTIFY, 0xABCDEF);
        vf.send(msg).unwrap();

        assert_eq!(*received.lock().unwrap(), Some(Received::Message(msg)));
        assert_eq!(csr.peek(VF2PF) & DOORBELL, 0);
        assert_eq!(pf.stats().received, 1);
    }

    #[test]
    fn dedicated_layout_never_reports_busy() {
        let csr = Arc::new(MemoryCsr::new());
        csr.poke(0x1000, 0xFFFF_FFFE);
        let transport =
            CsrTransport::new(csr.clone(), Layout::Dedicated, Direction::VfToPf, 0x1000, 0x1004)
                .with_clock(Arc::new(VirtualClock::new()))
                .with_config(TransportConfig {
                    ack_timeout: Duration::from_millis(1),
                    ..TransportConfig::default()
                });

        let err = transport
            .send(Message::new(msgtype::VF2PF_INIT, 0))
            .unwrap_err();
        assert!(matches!(err, TransportError::NoAck { .. }));
        assert_eq!(transport.stats().busy, 0);
    }
}
