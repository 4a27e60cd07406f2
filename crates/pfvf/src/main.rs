mod cmd;
mod config;
mod exit;
mod hex;
mod logging;
mod output;
mod sim;

use std::path::PathBuf;

use clap::Parser;

use crate::cmd::Command;
use crate::config::SimConfig;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "pfvf", version, about = "PF/VF mailbox protocol simulator")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "warn", global = true)]
    log_level: LogLevel,

    /// Simulation settings (JSON).
    #[arg(long, value_name = "FILE", env = "PFVF_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = match cli.config.as_deref().map(SimConfig::load) {
        Some(Err(err)) => Err(err),
        Some(Ok(config)) => cmd::run(cli.command, format, &config),
        None => cmd::run(cli.command, format, &SimConfig::default()),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}
