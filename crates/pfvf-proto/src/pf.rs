use std::sync::{Arc, Mutex, RwLock};

use pfvf_blkmsg::{BlockRequest, BlockResponse, ProviderRegistry};
use pfvf_codec::{msgtype, Message};
use pfvf_transport::{CsrTransport, Direction, Received, TransportStatsSnapshot};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::compat::{pf_verdict, CompatChecker, CompatVerdict, VersionResponse, LEGACY_VERSION};
use crate::config::ProtocolConfig;
use crate::error::{ProtoError, Result};
use crate::events::{NoEvents, PfEvents};
use crate::stats::{ProtoStats, ProtoStatsSnapshot};

/// What the PF knows about one VF.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VfState {
    /// Version negotiated with the VF; 0 before negotiation or for legacy VFs.
    pub compat_version: u8,
    /// Last verdict sent to the VF.
    pub verdict: Option<CompatVerdict>,
    /// Init seen and no shutdown since.
    pub alive: bool,
}

struct VfEndpoint {
    transport: CsrTransport,
    state: Mutex<VfState>,
}

impl VfEndpoint {
    fn state(&self) -> VfState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn update(&self, f: impl FnOnce(&mut VfState)) {
        f(&mut self.state.lock().unwrap_or_else(|e| e.into_inner()));
    }
}

/// PF side of the mailbox: one endpoint per VF.
pub struct PfProtocol {
    endpoints: Vec<VfEndpoint>,
    providers: ProviderRegistry,
    checkers: RwLock<Vec<Arc<dyn CompatChecker>>>,
    events: Arc<dyn PfEvents>,
    config: ProtocolConfig,
    stats: ProtoStats,
}

impl PfProtocol {
    /// Create a PF context. `transports[i]` is the PF→VF transport of VF `i`.
    pub fn new(transports: Vec<CsrTransport>, config: ProtocolConfig) -> Self {
        let endpoints = transports
            .into_iter()
            .map(|transport| {
                debug_assert_eq!(transport.direction(), Direction::PfToVf);
                VfEndpoint {
                    transport,
                    state: Mutex::new(VfState::default()),
                }
            })
            .collect();
        Self {
            endpoints,
            providers: ProviderRegistry::new(),
            checkers: RwLock::new(Vec::new()),
            events: Arc::new(NoEvents),
            config,
            stats: ProtoStats::default(),
        }
    }

    /// Route VF lifecycle events to `events`.
    pub fn with_events(mut self, events: Arc<dyn PfEvents>) -> Self {
        self.events = events;
        self
    }

    /// Block providers served to every VF.
    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    /// Add a compatibility checker consulted on every version request.
    pub fn add_checker(&self, checker: Arc<dyn CompatChecker>) {
        self.checkers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(checker);
    }

    pub fn num_vfs(&self) -> usize {
        self.endpoints.len()
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    /// Receive path for VF `vf`. Runs in the interrupt handler.
    pub fn handle_vf_interrupt(&self, vf: usize) -> Result<()> {
        let endpoint = self.endpoint(vf)?;
        let msg = match endpoint.transport.recv() {
            Received::Message(msg) => msg,
            Received::Spurious(_) | Received::Legacy(_) => return Ok(()),
        };

        if let Some(request) = BlockRequest::from_message(&msg) {
            return self.handle_block_request(vf, endpoint, request);
        }

        match msg.msg_type {
            msgtype::VF2PF_COMPAT_VER_REQ => self.handle_compat_version(vf, endpoint, msg),
            msgtype::VF2PF_VERSION_REQ => {
                endpoint.update(|state| {
                    state.compat_version = 0;
                    state.verdict = Some(CompatVerdict::Compatible);
                });
                info!(vf, "legacy version request");
                self.reply(
                    endpoint,
                    Message::new(
                        msgtype::PF2VF_VERSION_RESP,
                        VersionResponse::new(LEGACY_VERSION, CompatVerdict::Compatible).to_data(),
                    ),
                )
            }
            msgtype::VF2PF_INIT => {
                self.stats.inc_notifications();
                endpoint.update(|state| state.alive = true);
                info!(vf, "VF init");
                self.events.on_vf_init(vf);
                Ok(())
            }
            msgtype::VF2PF_SHUTDOWN => {
                self.stats.inc_notifications();
                endpoint.update(|state| state.alive = false);
                info!(vf, "VF shutdown");
                self.events.on_vf_shutdown(vf);
                Ok(())
            }
            msgtype::VF2PF_NOTIFY => {
                self.stats.inc_notifications();
                debug!(vf, data = msg.data, "VF notify");
                self.events.on_vf_notify(vf, msg.data);
                Ok(())
            }
            other => {
                self.stats.inc_unknown();
                warn!(vf, msg_type = other, data = msg.data, "unknown message from VF");
                Ok(())
            }
        }
    }

    fn handle_block_request(
        &self,
        vf: usize,
        endpoint: &VfEndpoint,
        request: BlockRequest,
    ) -> Result<()> {
        let compat = endpoint.state().compat_version;
        let response = self.providers.respond(request, compat);
        debug!(
            vf,
            block_type = request.block_type,
            byte_index = request.byte_index,
            crc = request.crc,
            "block request"
        );
        if let BlockResponse::Error(code) = response {
            self.stats.inc_rejected();
            debug!(vf, block_type = request.block_type, %code, "block request rejected");
        }
        self.reply(endpoint, response.to_message())
    }

    fn handle_compat_version(&self, vf: usize, endpoint: &VfEndpoint, msg: Message) -> Result<()> {
        let local = self.config.compat_version;
        let vf_version = (msg.data & 0xFF) as u8;
        let verdict = {
            let checkers = self.checkers.read().unwrap_or_else(|e| e.into_inner());
            pf_verdict(local, vf, vf_version, &checkers)
        };

        endpoint.update(|state| {
            state.compat_version = if verdict == CompatVerdict::Incompatible {
                0
            } else {
                local.min(vf_version)
            };
            state.verdict = Some(verdict);
        });
        info!(vf, vf_version, local, ?verdict, "compat version request");

        self.reply(
            endpoint,
            Message::new(
                msgtype::PF2VF_VERSION_RESP,
                VersionResponse::new(local, verdict).to_data(),
            ),
        )
    }

    fn reply(&self, endpoint: &VfEndpoint, response: Message) -> Result<()> {
        self.stats.inc_responses();
        endpoint.transport.send(response)?;
        Ok(())
    }

    /// Send `msg` to VF `vf`.
    pub fn send(&self, vf: usize, msg: Message) -> Result<()> {
        self.endpoint(vf)?.transport.send(msg)?;
        Ok(())
    }

    /// Tell every live VF the PF is about to reset.
    pub fn notify_restarting(&self) -> Result<usize> {
        self.broadcast(msgtype::PF2VF_RESTARTING)
    }

    /// Tell every live VF the device hit a fatal error.
    pub fn notify_fatal_error(&self) -> Result<usize> {
        self.broadcast(msgtype::PF2VF_FATAL_ERROR)
    }

    /// Send a notification to every live VF. Every VF is tried; the first
    /// failure is returned after the last attempt. Returns the number of VFs
    /// notified.
    fn broadcast(&self, msg_type: u8) -> Result<usize> {
        let mut notified = 0;
        let mut first_err = None;
        for (vf, endpoint) in self.endpoints.iter().enumerate() {
            if !endpoint.state().alive {
                continue;
            }
            match endpoint.transport.send(Message::new(msg_type, 0)) {
                Ok(()) => notified += 1,
                Err(err) => {
                    warn!(vf, msg_type = msgtype::pf2vf_name(msg_type), error = %err, "notification failed");
                    first_err.get_or_insert(ProtoError::from(err));
                }
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(notified),
        }
    }

    /// Drop every block provider and compatibility checker.
    pub fn shutdown(&self) {
        self.providers.clear();
        self.checkers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        info!(vfs = self.endpoints.len(), "PF mailbox shut down");
    }

    pub fn vf_state(&self, vf: usize) -> Result<VfState> {
        Ok(self.endpoint(vf)?.state())
    }

    pub fn transport_stats(&self, vf: usize) -> Result<TransportStatsSnapshot> {
        Ok(self.endpoint(vf)?.transport.stats())
    }

    pub fn stats(&self) -> ProtoStatsSnapshot {
        self.stats.snapshot()
    }

    fn endpoint(&self, vf: usize) -> Result<&VfEndpoint> {
        self.endpoints.get(vf).ok_or(ProtoError::UnknownVf(vf))
    }
}

impl std::fmt::Debug for PfProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PfProtocol")
            .field("vfs", &self.endpoints.len())
            .field("providers", &self.providers)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
