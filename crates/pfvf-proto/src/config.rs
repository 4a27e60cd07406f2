use std::time::Duration;

use pfvf_transport::TransportConfig;

use crate::compat::{COMPAT_FAST_ACK, COMPAT_VERSION};

/// Configuration shared by the PF and VF protocol contexts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolConfig {
    /// Compat version this side speaks.
    pub compat_version: u8,
    /// Lowest PF version a VF accepts when the PF answers "unknown".
    pub min_compat_version: u8,
    /// Wait for one response before resending the request.
    pub response_timeout: Duration,
    /// Request attempts before giving up with a timeout.
    pub response_retries: u32,
    /// Delay between receive polls when interrupts are not available.
    pub poll_interval: Duration,
    /// Block on the completion instead of polling the register.
    pub interrupts_ready: bool,
    /// Register-level timing.
    pub transport: TransportConfig,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            compat_version: COMPAT_VERSION,
            min_compat_version: COMPAT_FAST_ACK,
            response_timeout: Duration::from_millis(100),
            response_retries: 5,
            poll_interval: Duration::from_millis(1),
            interrupts_ready: false,
            transport: TransportConfig::default(),
        }
    }
}

impl ProtocolConfig {
    /// Same config speaking `version` instead.
    pub fn with_compat_version(mut self, version: u8) -> Self {
        self.compat_version = version;
        self
    }

    /// Same config with interrupt-driven waits enabled or disabled.
    pub fn with_interrupts_ready(mut self, ready: bool) -> Self {
        self.interrupts_ready = ready;
        self
    }
}
