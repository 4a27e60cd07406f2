use clap::{Args, Subcommand};

use crate::config::SimConfig;
use crate::exit::CliResult;
use crate::output::OutputFormat;
use crate::sim::Generation;

pub mod block;
pub mod crc;
pub mod negotiate;
pub mod stats;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Attach one simulated VF to a simulated PF and print the outcome.
    Negotiate(NegotiateArgs),
    /// Fetch a block from the simulated PF.
    Block(BlockArgs),
    /// Compute the block message CRC8 of a hex byte string.
    Crc(CrcArgs),
    /// Attach several VFs and print per-endpoint counters.
    Stats(StatsArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat, config: &SimConfig) -> CliResult<i32> {
    match command {
        Command::Negotiate(args) => negotiate::run(args, format, config),
        Command::Block(args) => block::run(args, format, config),
        Command::Crc(args) => crc::run(args, format),
        Command::Stats(args) => stats::run(args, format, config),
        Command::Version(args) => version::run(args, format),
    }
}

#[derive(Args, Debug)]
pub struct NegotiateArgs {
    /// Compat version the VF speaks.
    #[arg(long, default_value_t = pfvf_proto::COMPAT_VERSION)]
    pub vf_version: u8,
    /// Compat version the PF speaks.
    #[arg(long, default_value_t = pfvf_proto::COMPAT_VERSION)]
    pub pf_version: u8,
    /// Device generation.
    #[arg(long, value_enum, default_value_t = Generation::Gen2)]
    pub generation: Generation,
}

#[derive(Args, Debug)]
pub struct BlockArgs {
    /// Block type (0-27).
    #[arg(value_parser = clap::value_parser!(u8).range(0..=27))]
    pub block_type: u8,
    /// Bytes to read, header included. Default: the largest block of the class.
    #[arg(long)]
    pub buffer: Option<usize>,
    /// Device generation.
    #[arg(long, value_enum, default_value_t = Generation::Gen2)]
    pub generation: Generation,
}

#[derive(Args, Debug)]
pub struct CrcArgs {
    /// Bytes as hex, e.g. 0102abcd.
    pub hex: String,
}

#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Number of VFs to attach.
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u16).range(1..=256))]
    pub vfs: u16,
    /// Device generation.
    #[arg(long, value_enum, default_value_t = Generation::Gen2)]
    pub generation: Generation,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
