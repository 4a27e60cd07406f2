//! Simulation settings loaded from `--config <file.json>`.
//!
//! Every field is optional; missing fields keep the library defaults.

use std::path::Path;
use std::time::Duration;

use pfvf_blkmsg::{Block, Capabilities, RingToServiceMap};
use pfvf_proto::ProtocolConfig;
use serde::Deserialize;

use crate::exit::{io_error, CliError, CliResult, DATA_INVALID};
use crate::hex::parse_hex;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimConfig {
    pub response_timeout_ms: Option<u64>,
    pub response_retries: Option<u32>,
    pub poll_interval_ms: Option<u64>,
    pub interrupts_ready: Option<bool>,
    pub min_compat_version: Option<u8>,
    pub ack_delay_min_us: Option<u64>,
    pub ack_delay_max_us: Option<u64>,
    pub ack_timeout_ms: Option<u64>,
    pub retry_delay_ms: Option<u64>,
    pub max_attempts: Option<u32>,
    pub capabilities: Option<CapabilitiesConfig>,
    pub ring_to_svc_map: Option<u16>,
    pub blocks: Vec<BlockFixture>,
}

/// Capability summary the simulated PF serves.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CapabilitiesConfig {
    pub version: u8,
    pub ext_dc_caps: u32,
    pub capabilities: u32,
    pub frequency: u32,
}

impl Default for CapabilitiesConfig {
    fn default() -> Self {
        Self {
            version: Capabilities::LATEST_VERSION,
            ext_dc_caps: 0x1,
            capabilities: 0x0000_0F3F,
            frequency: 1_000,
        }
    }
}

impl CapabilitiesConfig {
    pub fn to_capabilities(&self) -> Capabilities {
        Capabilities {
            version: self.version,
            ext_dc_caps: self.ext_dc_caps,
            capabilities: (self.version >= 2).then_some(self.capabilities),
            frequency: (self.version >= 3).then_some(self.frequency),
        }
    }
}

/// Extra block served by the simulated PF.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BlockFixture {
    pub block_type: u8,
    #[serde(default = "default_block_version")]
    pub version: u8,
    /// Payload bytes as a hex string.
    pub payload: String,
}

fn default_block_version() -> u8 {
    1
}

impl BlockFixture {
    pub fn to_block(&self) -> CliResult<Block> {
        let payload = parse_hex(&self.payload).map_err(|err| {
            CliError::new(
                DATA_INVALID,
                format!("block {} payload: {}", self.block_type, err.message),
            )
        })?;
        Ok(Block::new(self.version, payload))
    }
}

impl SimConfig {
    pub fn load(path: &Path) -> CliResult<Self> {
        let context = format!("read config {}", path.display());
        let text = std::fs::read_to_string(path).map_err(|err| io_error(&context, err))?;
        Self::parse(&text).map_err(|err| {
            CliError::new(
                DATA_INVALID,
                format!("parse config {}: {}", path.display(), err.message),
            )
        })
    }

    pub fn parse(text: &str) -> CliResult<Self> {
        serde_json::from_str(text).map_err(|err| CliError::new(DATA_INVALID, err.to_string()))
    }

    /// Overlay the configured fields on `base`.
    pub fn apply(&self, mut base: ProtocolConfig) -> ProtocolConfig {
        if let Some(ms) = self.response_timeout_ms {
            base.response_timeout = Duration::from_millis(ms);
        }
        if let Some(retries) = self.response_retries {
            base.response_retries = retries;
        }
        if let Some(ms) = self.poll_interval_ms {
            base.poll_interval = Duration::from_millis(ms);
        }
        if let Some(ready) = self.interrupts_ready {
            base.interrupts_ready = ready;
        }
        if let Some(min) = self.min_compat_version {
            base.min_compat_version = min;
        }

        let transport = &mut base.transport;
        if let Some(us) = self.ack_delay_min_us {
            transport.ack_delay_min = Duration::from_micros(us);
        }
        if let Some(us) = self.ack_delay_max_us {
            transport.ack_delay_max = Duration::from_micros(us);
        }
        if let Some(ms) = self.ack_timeout_ms {
            transport.ack_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.retry_delay_ms {
            transport.retry_delay = Duration::from_millis(ms);
        }
        if let Some(attempts) = self.max_attempts {
            transport.max_attempts = attempts;
        }
        base
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
            .clone()
            .unwrap_or_default()
            .to_capabilities()
    }

    pub fn ring_to_svc_map(&self) -> RingToServiceMap {
        RingToServiceMap {
            map: self.ring_to_svc_map.unwrap_or(0x0201),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_keeps_defaults() {
        let config = SimConfig::parse("{}").unwrap();
        assert_eq!(
            config.apply(ProtocolConfig::default()),
            ProtocolConfig::default()
        );
        assert_eq!(config.capabilities().version, Capabilities::LATEST_VERSION);
    }

    #[test]
    fn overlays_timing_fields() {
        let config = SimConfig::parse(
            r#"{"response_timeout_ms": 20, "response_retries": 2, "ack_delay_min_us": 10,
                "ack_timeout_ms": 500, "max_attempts": 3}"#,
        )
        .unwrap();
        let applied = config.apply(ProtocolConfig::default());

        assert_eq!(applied.response_timeout, Duration::from_millis(20));
        assert_eq!(applied.response_retries, 2);
        assert_eq!(applied.transport.ack_delay_min, Duration::from_micros(10));
        assert_eq!(applied.transport.ack_timeout, Duration::from_millis(500));
        assert_eq!(applied.transport.max_attempts, 3);
        assert_eq!(applied.poll_interval, Duration::from_millis(1));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = SimConfig::parse(r#"{"respnse_timeout_ms": 20}"#).unwrap_err();
        assert_eq!(err.code, DATA_INVALID);
    }

    #[test]
    fn block_fixture_payload() {
        let config = SimConfig::parse(
            r#"{"blocks": [{"block_type": 20, "payload": "01 02 03"}],
                "capabilities": {"version": 1, "ext_dc_caps": 7}}"#,
        )
        .unwrap();

        let block = config.blocks[0].to_block().unwrap();
        assert_eq!(block.version, 1);
        assert_eq!(&block.payload[..], &[1, 2, 3]);

        let caps = config.capabilities();
        assert_eq!(caps.ext_dc_caps, 7);
        assert_eq!(caps.capabilities, None);
    }
}
