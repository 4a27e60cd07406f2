//! Lifecycle callbacks into the rest of the driver.
//!
//! Callbacks run on the receive path. They must not send mailbox messages
//! on the same endpoint.

/// Events a PF receives from its VFs.
pub trait PfEvents: Send + Sync {
    fn on_vf_init(&self, _vf: usize) {}

    fn on_vf_shutdown(&self, _vf: usize) {}

    fn on_vf_notify(&self, _vf: usize, _data: u32) {}
}

/// Events a VF receives from its PF.
pub trait VfEvents: Send + Sync {
    fn on_pf_restarting(&self) {}

    fn on_pf_fatal_error(&self) {}
}

/// Ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoEvents;

impl PfEvents for NoEvents {}

impl VfEvents for NoEvents {}
