use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use pfvf_blkmsg::{
    fetch_block, BlockRequest, BlockResponse, ByteSource, Capabilities, RingToServiceMap,
    CAPABILITIES_BLOCK, HEADER_LEN, RING_TO_SVC_BLOCK,
};
use pfvf_codec::{msgtype, Message};
use pfvf_transport::{CsrTransport, Direction, Received, TransportStatsSnapshot};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::compat::{
    vf_accept, CompatVerdict, VersionResponse, COMPAT_CAPABILITIES, COMPAT_RING_TO_SVC_MAP,
};
use crate::config::ProtocolConfig;
use crate::correlator::{CompletionWaiter, Correlator, PollingWaiter};
use crate::error::{ProtoError, Result};
use crate::events::{NoEvents, VfEvents};
use crate::stats::{ProtoStats, ProtoStatsSnapshot};

/// Capability summary bytes a VF reads; enough for every known layout.
const CAPABILITIES_BUFFER: usize = HEADER_LEN + 12;

/// Ring-to-service map bytes a VF reads.
const RING_TO_SVC_BUFFER: usize = HEADER_LEN + 2;

/// PF state as last reported to the VF.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PfStatus {
    /// No successful version negotiation yet.
    #[default]
    Unknown,
    Up,
    Restarting,
    Failed,
}

/// What the VF learned from the PF.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VfSession {
    pub compat_version: u8,
    pub pf_version: u8,
    pub verdict: Option<CompatVerdict>,
    pub pf_status: PfStatus,
    pub attached: bool,
    pub capabilities: Option<Capabilities>,
    pub ring_to_svc_map: Option<RingToServiceMap>,
}

/// VF side of the mailbox.
pub struct VfProtocol {
    transport: CsrTransport,
    correlator: Correlator,
    config: ProtocolConfig,
    interrupts_ready: AtomicBool,
    events: Arc<dyn VfEvents>,
    session: Mutex<VfSession>,
    stats: ProtoStats,
}

impl VfProtocol {
    /// Create a VF context on its VF→PF transport.
    pub fn new(transport: CsrTransport, config: ProtocolConfig) -> Self {
        debug_assert_eq!(transport.direction(), Direction::VfToPf);
        Self {
            transport,
            correlator: Correlator::new(config.response_timeout, config.response_retries),
            interrupts_ready: AtomicBool::new(config.interrupts_ready),
            config,
            events: Arc::new(NoEvents),
            session: Mutex::new(VfSession::default()),
            stats: ProtoStats::default(),
        }
    }

    /// Route PF lifecycle events to `events`.
    pub fn with_events(mut self, events: Arc<dyn VfEvents>) -> Self {
        self.events = events;
        self
    }

    /// Switch between interrupt-driven and polled response waits.
    pub fn set_interrupts_ready(&self, ready: bool) {
        self.interrupts_ready.store(ready, Ordering::Release);
    }

    pub fn interrupts_ready(&self) -> bool {
        self.interrupts_ready.load(Ordering::Acquire)
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    /// Negotiate the protocol version and fetch the configuration blocks the
    /// negotiated version provides, then announce the VF to the PF.
    pub fn attach(&self) -> Result<VfSession> {
        let version = self.request_version()?;

        if version >= COMPAT_CAPABILITIES {
            let caps = self.get_capabilities()?;
            self.update(|session| session.capabilities = Some(caps));
        }
        if version >= COMPAT_RING_TO_SVC_MAP {
            let map = self.get_ring_to_svc_map()?;
            self.update(|session| session.ring_to_svc_map = Some(map));
        }

        self.send_notification(msgtype::VF2PF_INIT, 0)?;
        self.update(|session| session.attached = true);
        info!(compat_version = version, "VF attached");
        Ok(self.session())
    }

    /// Tell the PF this VF is going away.
    pub fn detach(&self) -> Result<()> {
        self.send_notification(msgtype::VF2PF_SHUTDOWN, 0)?;
        self.update(|session| session.attached = false);
        info!("VF detached");
        Ok(())
    }

    /// Send a generic notification with `data`.
    pub fn notify(&self, data: u32) -> Result<()> {
        self.send_notification(msgtype::VF2PF_NOTIFY, data)
    }

    /// Run version negotiation. Returns the negotiated version.
    pub fn request_version(&self) -> Result<u8> {
        let local = self.config.compat_version;
        let response = self.request(
            Message::new(msgtype::VF2PF_COMPAT_VER_REQ, u32::from(local)),
            msgtype::PF2VF_VERSION_RESP,
        )?;
        let response = VersionResponse::from_data(response.data);
        let negotiated = vf_accept(local, self.config.min_compat_version, response);

        self.update(|session| {
            session.pf_version = response.version;
            session.verdict = response.verdict;
            if let Ok(version) = &negotiated {
                session.compat_version = *version;
                session.pf_status = PfStatus::Up;
            }
        });

        match &negotiated {
            Ok(version) => info!(
                local,
                pf_version = response.version,
                verdict = ?response.verdict,
                negotiated = version,
                "protocol version negotiated"
            ),
            Err(err) => error!(error = %err, "protocol version refused"),
        }
        negotiated
    }

    /// Fetch block `block_type` into at most `buffer_size` bytes.
    pub fn get_block(&self, block_type: u8, buffer_size: usize) -> Result<Bytes> {
        let result = fetch_block(&mut BlockChannel { vf: self }, block_type, buffer_size);
        self.count_fault(result)
    }

    pub fn get_capabilities(&self) -> Result<Capabilities> {
        let block = self.get_block(CAPABILITIES_BLOCK, CAPABILITIES_BUFFER)?;
        self.count_fault(Capabilities::decode(&block).map_err(ProtoError::from))
    }

    pub fn get_ring_to_svc_map(&self) -> Result<RingToServiceMap> {
        let block = self.get_block(RING_TO_SVC_BLOCK, RING_TO_SVC_BUFFER)?;
        self.count_fault(RingToServiceMap::decode(&block).map_err(ProtoError::from))
    }

    /// Count block faults. Mismatched responses are counted where they are
    /// detected.
    fn count_fault<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(ProtoError::Block(err)) = &result {
            if err.is_fault() {
                self.stats.inc_rejected();
            }
        }
        result
    }

    /// Receive path. Runs in the interrupt handler, or from the polling
    /// waiter before interrupts are enabled.
    pub fn handle_pf_interrupt(&self) {
        let msg = match self.transport.recv() {
            Received::Message(msg) => msg,
            Received::Spurious(_) | Received::Legacy(_) => return,
        };

        match msg.msg_type {
            msgtype::PF2VF_VERSION_RESP | msgtype::PF2VF_BLKMSG_RESP => {
                if self.correlator.deliver(msg) {
                    self.stats.inc_responses();
                } else {
                    self.stats.inc_orphan_responses();
                    warn!(
                        msg_type = msgtype::pf2vf_name(msg.msg_type),
                        data = msg.data,
                        "response without pending request"
                    );
                }
            }
            msgtype::PF2VF_RESTARTING => {
                self.stats.inc_notifications();
                self.update(|session| session.pf_status = PfStatus::Restarting);
                warn!("PF restarting");
                self.events.on_pf_restarting();
            }
            msgtype::PF2VF_FATAL_ERROR => {
                self.stats.inc_notifications();
                self.update(|session| session.pf_status = PfStatus::Failed);
                error!("PF reported fatal error");
                self.events.on_pf_fatal_error();
            }
            other => {
                self.stats.inc_unknown();
                warn!(msg_type = other, data = msg.data, "unknown message from PF");
            }
        }
    }

    pub fn session(&self) -> VfSession {
        *self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn stats(&self) -> ProtoStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn transport_stats(&self) -> TransportStatsSnapshot {
        self.transport.stats()
    }

    fn update(&self, f: impl FnOnce(&mut VfSession)) {
        f(&mut self.session.lock().unwrap_or_else(|e| e.into_inner()));
    }

    fn send_notification(&self, msg_type: u8, data: u32) -> Result<()> {
        self.transport.send(Message::new(msg_type, data))?;
        Ok(())
    }

    fn request(&self, msg: Message, expected: u8) -> Result<Message> {
        self.stats.inc_requests();
        let poll = || self.handle_pf_interrupt();
        let result = if self.interrupts_ready() {
            self.correlator
                .send_request(&self.transport, msg, &CompletionWaiter, &poll)
        } else {
            let waiter = PollingWaiter::new(self.transport.clock().clone(), self.config.poll_interval);
            self.correlator
                .send_request(&self.transport, msg, &waiter, &poll)
        };

        let response = match result {
            Ok(response) => response,
            Err(err) => {
                if matches!(err, ProtoError::Timeout { .. }) {
                    self.stats.inc_timeouts();
                }
                return Err(err);
            }
        };
        if response.msg_type != expected {
            self.stats.inc_rejected();
            return Err(ProtoError::UnexpectedResponse {
                msg_type: response.msg_type,
                data: response.data,
            });
        }
        debug!(
            request = msgtype::vf2pf_name(msg.msg_type),
            data = response.data,
            "request completed"
        );
        Ok(response)
    }
}

impl std::fmt::Debug for VfProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VfProtocol")
            .field("transport", &self.transport)
            .field("session", &self.session())
            .finish_non_exhaustive()
    }
}

/// Block exchanges over the VF's request/response path.
struct BlockChannel<'a> {
    vf: &'a VfProtocol,
}

impl ByteSource for BlockChannel<'_> {
    type Error = ProtoError;

    fn exchange(&mut self, request: BlockRequest) -> Result<BlockResponse> {
        let response = self
            .vf
            .request(request.to_message()?, msgtype::PF2VF_BLKMSG_RESP)?;
        BlockResponse::from_data(response.data).ok_or_else(|| {
            self.vf.stats.inc_rejected();
            ProtoError::UnexpectedResponse {
                msg_type: response.msg_type,
                data: response.data,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    use pfvf_codec::{encode, MessageFormat};
    use pfvf_transport::{
        Layout, MemoryCsr, VirtualClock, DOORBELL, IN_USE_MASK, IN_USE_PATTERN, ORIGIN_SYSTEM,
    };

    use super::*;

    const OFFSET: u32 = 0x300;

    fn vf_on(csr: &Arc<MemoryCsr>, config: ProtocolConfig) -> VfProtocol {
        let transport = CsrTransport::new(csr.clone(), Layout::Shared, Direction::VfToPf, OFFSET, OFFSET)
            .with_clock(Arc::new(VirtualClock::new()));
        VfProtocol::new(transport, config)
    }

    /// Place a PF→VF message in the register as the PF would.
    fn pf_writes(csr: &MemoryCsr, msg: Message) {
        let payload = encode(&msg, &MessageFormat::GEN2).unwrap();
        csr.poke(OFFSET, payload | ORIGIN_SYSTEM | DOORBELL | IN_USE_PATTERN << 16);
    }

    /// PF stand-in that acks every VF message and answers requests with
    /// `answer`. Counts the requests it sees.
    fn scripted_pf(
        csr: &Arc<MemoryCsr>,
        answer: impl Fn(Message) -> Option<Message> + Send + Sync + 'static,
    ) -> Arc<AtomicU32> {
        let seen = Arc::new(AtomicU32::new(0));
        let count = Arc::clone(&seen);
        csr.set_write_hook(Arc::new(move |regs, offset, old, new| {
            let doorbell = DOORBELL << 16;
            if new & doorbell == 0 || old & doorbell != 0 {
                return;
            }
            count.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            let msg = pfvf_codec::decode(new >> 16, &MessageFormat::GEN2);
            match answer(msg) {
                // The PF answers with a full register write of its own.
                Some(reply) => {
                    let payload = encode(&reply, &MessageFormat::GEN2).unwrap();
                    regs.poke(
                        offset,
                        payload | ORIGIN_SYSTEM | DOORBELL | IN_USE_PATTERN << 16,
                    );
                }
                None => regs.poke(offset, new & !doorbell),
            }
        }));
        seen
    }

    #[test]
    fn version_negotiation_compatible() {
        let csr = Arc::new(MemoryCsr::new());
        scripted_pf(&csr, |msg| {
            (msg.msg_type == msgtype::VF2PF_COMPAT_VER_REQ).then(|| {
                Message::new(
                    msgtype::PF2VF_VERSION_RESP,
                    VersionResponse::new(4, CompatVerdict::Compatible).to_data(),
                )
            })
        });
        let vf = vf_on(&csr, ProtocolConfig::default());

        assert_eq!(vf.request_version(), Ok(4));
        let session = vf.session();
        assert_eq!(session.pf_version, 4);
        assert_eq!(session.pf_status, PfStatus::Up);
        assert_eq!(vf.stats().responses, 1);
    }

    #[test]
    fn version_negotiation_refused() {
        let csr = Arc::new(MemoryCsr::new());
        scripted_pf(&csr, |_| {
            Some(Message::new(
                msgtype::PF2VF_VERSION_RESP,
                VersionResponse::new(4, CompatVerdict::Incompatible).to_data(),
            ))
        });
        let vf = vf_on(&csr, ProtocolConfig::default());

        assert!(matches!(
            vf.attach(),
            Err(ProtoError::Incompatible { local: 4, remote: 4, .. })
        ));
        assert_eq!(vf.session().pf_status, PfStatus::Unknown);
        assert!(!vf.session().attached);
    }

    #[test]
    fn silent_pf_times_out_after_retries() {
        let csr = Arc::new(MemoryCsr::new());
        let seen = scripted_pf(&csr, |_| None);
        let vf = vf_on(&csr, ProtocolConfig::default());

        let err = vf.request_version().unwrap_err();

        assert_eq!(
            err,
            ProtoError::Timeout {
                attempts: 5,
                timeout: Duration::from_millis(100)
            }
        );
        assert_eq!(seen.load(std::sync::atomic::Ordering::Relaxed), 5);
        assert_eq!(vf.stats().timeouts, 1);
    }

    #[test]
    fn wrong_response_type_is_fault() {
        let csr = Arc::new(MemoryCsr::new());
        scripted_pf(&csr, |_| Some(Message::new(msgtype::PF2VF_BLKMSG_RESP, 0)));
        let vf = vf_on(&csr, ProtocolConfig::default());

        let err = vf.request_version().unwrap_err();
        assert!(err.is_fault());
    }

    #[test]
    fn restart_and_fatal_notifications() {
        #[derive(Default)]
        struct Recorder {
            restarts: AtomicU32,
            fatals: AtomicU32,
        }
        impl VfEvents for Recorder {
            fn on_pf_restarting(&self) {
                self.restarts.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            }
            fn on_pf_fatal_error(&self) {
                self.fatals.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            }
        }

        let csr = Arc::new(MemoryCsr::new());
        let events = Arc::new(Recorder::default());
        let vf = vf_on(&csr, ProtocolConfig::default()).with_events(events.clone());

        pf_writes(&csr, Message::new(msgtype::PF2VF_RESTARTING, 0));
        vf.handle_pf_interrupt();
        assert_eq!(vf.session().pf_status, PfStatus::Restarting);
        // Left for the PF to clear.
        assert_eq!(csr.peek(OFFSET) >> 16 & IN_USE_MASK, IN_USE_PATTERN);

        pf_writes(&csr, Message::new(msgtype::PF2VF_FATAL_ERROR, 0));
        vf.handle_pf_interrupt();
        assert_eq!(vf.session().pf_status, PfStatus::Failed);

        assert_eq!(events.restarts.load(std::sync::atomic::Ordering::Relaxed), 1);
        assert_eq!(events.fatals.load(std::sync::atomic::Ordering::Relaxed), 1);
        assert_eq!(vf.stats().notifications, 2);
    }

    #[test]
    fn orphan_response_is_counted() {
        let csr = Arc::new(MemoryCsr::new());
        let vf = vf_on(&csr, ProtocolConfig::default());

        pf_writes(&csr, Message::new(msgtype::PF2VF_VERSION_RESP, 0x104));
        vf.handle_pf_interrupt();

        assert_eq!(vf.stats().orphan_responses, 1);
        assert_eq!(vf.stats().responses, 0);
        assert_eq!(csr.peek(OFFSET) & DOORBELL, 0);
    }

    #[test]
    fn unknown_pf_message_is_counted() {
        let csr = Arc::new(MemoryCsr::new());
        let vf = vf_on(&csr, ProtocolConfig::default());

        pf_writes(&csr, Message::new(0x0E, 7));
        vf.handle_pf_interrupt();

        assert_eq!(vf.stats().unknown, 1);
    }

    #[test]
    fn notify_and_detach_send_notifications() {
        let csr = Arc::new(MemoryCsr::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        scripted_pf(&csr, move |msg| {
            log.lock().unwrap().push(msg);
            None
        });
        let vf = vf_on(&csr, ProtocolConfig::default());

        vf.notify(0x2A).unwrap();
        vf.detach().unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                Message::new(msgtype::VF2PF_NOTIFY, 0x2A),
                Message::new(msgtype::VF2PF_SHUTDOWN, 0),
            ]
        );
    }
}
