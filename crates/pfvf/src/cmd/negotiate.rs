use pfvf_blkmsg::Capabilities;
use pfvf_proto::{CompatVerdict, PfStatus, VfState};
use pfvf_transport::Clock;
use serde::Serialize;
use tracing::info;

use crate::cmd::NegotiateArgs;
use crate::config::SimConfig;
use crate::exit::{proto_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{label, opt, print_fields, print_json, OutputFormat};
use crate::sim::{self, Generation, Topology};

#[derive(Serialize)]
struct CapabilitiesOutput {
    version: u8,
    ext_dc_caps: String,
    capabilities: Option<String>,
    frequency: Option<u32>,
}

impl From<Capabilities> for CapabilitiesOutput {
    fn from(caps: Capabilities) -> Self {
        Self {
            version: caps.version,
            ext_dc_caps: format!("{:#010x}", caps.ext_dc_caps),
            capabilities: caps.capabilities.map(|c| format!("{c:#010x}")),
            frequency: caps.frequency,
        }
    }
}

#[derive(Serialize)]
struct NegotiateOutput {
    generation: Generation,
    vf_version: u8,
    pf_version: u8,
    compat_version: u8,
    verdict: Option<CompatVerdict>,
    pf_status: PfStatus,
    capabilities: Option<CapabilitiesOutput>,
    ring_to_svc_map: Option<String>,
    pf_view: VfState,
}

pub fn run(args: NegotiateArgs, format: OutputFormat, config: &SimConfig) -> CliResult<i32> {
    let loopback = sim::build(
        config,
        Topology {
            generation: args.generation,
            num_vfs: 1,
            pf_version: args.pf_version,
            vf_version: args.vf_version,
        },
    )?;
    let vf = loopback
        .vf(0)
        .ok_or_else(|| CliError::new(INTERNAL, "simulation has no VF 0"))?;

    let session = vf.attach().map_err(|err| proto_error("negotiate", err))?;
    let pf_view = loopback
        .pf()
        .vf_state(0)
        .map_err(|err| proto_error("negotiate", err))?;
    info!(
        compat_version = session.compat_version,
        elapsed = ?loopback.clock().now(),
        "negotiation complete"
    );

    let out = NegotiateOutput {
        generation: args.generation,
        vf_version: args.vf_version,
        pf_version: session.pf_version,
        compat_version: session.compat_version,
        verdict: session.verdict,
        pf_status: session.pf_status,
        capabilities: session.capabilities.map(CapabilitiesOutput::from),
        ring_to_svc_map: session.ring_to_svc_map.map(|m| format!("{:#06x}", m.map)),
        pf_view,
    };

    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Raw => println!("{}", out.compat_version),
        _ => print_fields(
            &[
                ("generation", label(out.generation)),
                ("vf_version", out.vf_version.to_string()),
                ("pf_version", out.pf_version.to_string()),
                ("compat_version", out.compat_version.to_string()),
                ("verdict", opt(out.verdict.map(label))),
                ("pf_status", label(out.pf_status)),
                (
                    "capabilities",
                    opt(out
                        .capabilities
                        .as_ref()
                        .map(|c| format!("v{} ext_dc_caps={}", c.version, c.ext_dc_caps))),
                ),
                ("ring_to_svc_map", opt(out.ring_to_svc_map.clone())),
                ("pf_view_alive", out.pf_view.alive.to_string()),
            ],
            format,
        ),
    }
    Ok(SUCCESS)
}
