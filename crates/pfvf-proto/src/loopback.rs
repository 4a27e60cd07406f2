//! In-process PF and VFs wired to one register file.
//!
//! Writes that raise a doorbell run the receiving side's interrupt handler
//! synchronously, from inside the write. Time is virtual, so ack ceilings
//! and response timeouts complete without sleeping.

use std::sync::{Arc, Weak};

use pfvf_transport::{CsrTransport, Lane, Layout, MemoryCsr, VirtualClock};
use tracing::warn;

use crate::config::ProtocolConfig;
use crate::events::{NoEvents, PfEvents, VfEvents};
use crate::function::Function;
use crate::pf::PfProtocol;
use crate::vf::VfProtocol;

/// Offset of VF 0's mailbox.
pub const MAILBOX_BASE: u32 = 0x3A000;

/// Loopback topology and per-side protocol config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopbackConfig {
    pub layout: Layout,
    pub num_vfs: usize,
    pub pf: ProtocolConfig,
    pub vf: ProtocolConfig,
}

impl Default for LoopbackConfig {
    fn default() -> Self {
        Self {
            layout: Layout::Shared,
            num_vfs: 1,
            pf: ProtocolConfig::default(),
            vf: ProtocolConfig::default(),
        }
    }
}

/// `(vf2pf, pf2vf)` register offsets of VF `vf`.
pub fn mailbox_offsets(layout: Layout, vf: usize) -> (u32, u32) {
    let vf = vf as u32;
    match layout {
        Layout::Shared => {
            let offset = MAILBOX_BASE + 4 * vf;
            (offset, offset)
        }
        Layout::Dedicated => {
            let offset = MAILBOX_BASE + 8 * vf;
            (offset, offset + 4)
        }
    }
}

/// Which handler a register write should interrupt, if any.
fn interrupt_target(layout: Layout, offset: u32, old: u32, new: u32) -> Option<(Function, usize)> {
    let rel = offset.checked_sub(MAILBOX_BASE)?;
    let raised_for = |receiver: Function| {
        let bit = Lane::of(layout, receiver.recv_direction()).doorbell;
        new & bit != 0 && old & bit == 0
    };
    match layout {
        Layout::Shared => [Function::Pf, Function::Vf]
            .into_iter()
            .find(|&receiver| raised_for(receiver))
            .map(|receiver| (receiver, (rel / 4) as usize)),
        Layout::Dedicated => {
            // Even slot is the VF→PF register.
            let sender = if rel % 8 == 0 {
                Function::Vf
            } else {
                Function::Pf
            };
            let receiver = sender.peer();
            raised_for(receiver).then_some((receiver, (rel / 8) as usize))
        }
    }
}

/// A PF and its VFs sharing one in-memory register file.
pub struct Loopback {
    layout: Layout,
    csr: Arc<MemoryCsr>,
    clock: Arc<VirtualClock>,
    pf: Arc<PfProtocol>,
    vfs: Vec<Arc<VfProtocol>>,
}

impl Loopback {
    pub fn new(config: LoopbackConfig) -> Self {
        Self::with_events(config, Arc::new(NoEvents), Arc::new(NoEvents))
    }

    /// Build with event sinks. Every VF reports to the same `vf_events`.
    pub fn with_events(
        config: LoopbackConfig,
        pf_events: Arc<dyn PfEvents>,
        vf_events: Arc<dyn VfEvents>,
    ) -> Self {
        let layout = config.layout;
        let csr = Arc::new(MemoryCsr::new());
        let clock = Arc::new(VirtualClock::new());

        let pf_transports = (0..config.num_vfs)
            .map(|vf| {
                let (vf2pf, pf2vf) = mailbox_offsets(layout, vf);
                CsrTransport::new(
                    csr.clone(),
                    layout,
                    Function::Pf.send_direction(),
                    pf2vf,
                    vf2pf,
                )
                .with_clock(clock.clone())
                .with_config(config.pf.transport.clone())
            })
            .collect();
        let pf = Arc::new(PfProtocol::new(pf_transports, config.pf.clone()).with_events(pf_events));

        let vfs: Vec<Arc<VfProtocol>> = (0..config.num_vfs)
            .map(|vf| {
                let (vf2pf, pf2vf) = mailbox_offsets(layout, vf);
                let transport = CsrTransport::new(
                    csr.clone(),
                    layout,
                    Function::Vf.send_direction(),
                    vf2pf,
                    pf2vf,
                )
                .with_clock(clock.clone())
                .with_config(config.vf.transport.clone());
                Arc::new(
                    VfProtocol::new(transport, config.vf.clone()).with_events(vf_events.clone()),
                )
            })
            .collect();

        let pf_handle: Weak<PfProtocol> = Arc::downgrade(&pf);
        let vf_handles: Vec<Weak<VfProtocol>> = vfs.iter().map(Arc::downgrade).collect();
        csr.set_write_hook(Arc::new(move |_, offset, old, new| {
            match interrupt_target(layout, offset, old, new) {
                Some((Function::Pf, vf)) => {
                    if let Some(pf) = pf_handle.upgrade() {
                        if let Err(err) = pf.handle_vf_interrupt(vf) {
                            warn!(vf, error = %err, "PF interrupt handler failed");
                        }
                    }
                }
                Some((Function::Vf, vf)) => {
                    if let Some(handle) = vf_handles.get(vf).and_then(Weak::upgrade) {
                        handle.handle_pf_interrupt();
                    }
                }
                None => {}
            }
        }));

        Self {
            layout,
            csr,
            clock,
            pf,
            vfs,
        }
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn pf(&self) -> &Arc<PfProtocol> {
        &self.pf
    }

    pub fn vf(&self, vf: usize) -> Option<&Arc<VfProtocol>> {
        self.vfs.get(vf)
    }

    pub fn vfs(&self) -> &[Arc<VfProtocol>] {
        &self.vfs
    }

    pub fn csr(&self) -> &Arc<MemoryCsr> {
        &self.csr
    }

    pub fn clock(&self) -> &Arc<VirtualClock> {
        &self.clock
    }
}

impl std::fmt::Debug for Loopback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loopback")
            .field("layout", &self.layout)
            .field("vfs", &self.vfs.len())
            .field("csr", &self.csr)
            .finish()
    }
}
