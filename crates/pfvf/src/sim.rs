//! Simulated PF and VFs the commands run against.

use std::sync::Arc;

use clap::ValueEnum;
use pfvf_blkmsg::{Block, BlockProvider, ProviderError, CAPABILITIES_BLOCK, RING_TO_SVC_BLOCK};
use pfvf_proto::{Loopback, LoopbackConfig, ProtocolConfig};
use pfvf_transport::Layout;
use serde::Serialize;
use tracing::debug;

use crate::config::SimConfig;
use crate::exit::{block_error, CliResult};

/// Device generation, which decides the register layout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Generation {
    /// One shared register per VF.
    #[default]
    Gen2,
    /// One register per direction per VF.
    Gen4,
}

impl Generation {
    pub fn layout(self) -> Layout {
        match self {
            Generation::Gen2 => Layout::Shared,
            Generation::Gen4 => Layout::Dedicated,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Topology {
    pub generation: Generation,
    pub num_vfs: usize,
    pub pf_version: u8,
    pub vf_version: u8,
}

fn static_provider(block: Block) -> Arc<dyn BlockProvider> {
    Arc::new(move |_: u8, _: u8| -> Result<Block, ProviderError> { Ok(block.clone()) })
}

/// Wire a loopback and register the configured blocks on its PF.
pub fn build(config: &SimConfig, topology: Topology) -> CliResult<Loopback> {
    let loopback = Loopback::new(LoopbackConfig {
        layout: topology.generation.layout(),
        num_vfs: topology.num_vfs,
        pf: config.apply(ProtocolConfig::default().with_compat_version(topology.pf_version)),
        vf: config.apply(ProtocolConfig::default().with_compat_version(topology.vf_version)),
    });
    let providers = loopback.pf().providers();

    let caps = config.capabilities();
    let caps_provider: Arc<dyn BlockProvider> =
        Arc::new(move |_: u8, compat: u8| -> Result<Block, ProviderError> {
            Ok(caps.for_compat(compat).to_block())
        });
    providers
        .register(CAPABILITIES_BLOCK, caps_provider)
        .map_err(|err| block_error("register capabilities", err))?;
    providers
        .register(
            RING_TO_SVC_BLOCK,
            static_provider(config.ring_to_svc_map().to_block()),
        )
        .map_err(|err| block_error("register ring map", err))?;

    for fixture in &config.blocks {
        providers
            .register(fixture.block_type, static_provider(fixture.to_block()?))
            .map_err(|err| block_error("register block fixture", err))?;
    }

    debug!(
        generation = ?topology.generation,
        vfs = topology.num_vfs,
        blocks = ?providers.block_types(),
        "simulation ready"
    );
    Ok(loopback)
}
