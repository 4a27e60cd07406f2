use pfvf_blkmsg::{BlockClass, HEADER_LEN};
use pfvf_codec::blkmsg_crc;
use pfvf_proto::COMPAT_VERSION;
use serde::Serialize;

use crate::cmd::BlockArgs;
use crate::config::SimConfig;
use crate::exit::{proto_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::hex::to_hex;
use crate::output::{label, print_fields, print_json, print_raw, OutputFormat};
use crate::sim::{self, Topology};

#[derive(Serialize)]
struct BlockOutput {
    block_type: u8,
    class: String,
    version: u8,
    length: u8,
    payload: String,
    crc: String,
}

pub fn run(args: BlockArgs, format: OutputFormat, config: &SimConfig) -> CliResult<i32> {
    let class = BlockClass::of(args.block_type).ok_or_else(|| {
        CliError::usage(format!("block type {} out of range", args.block_type))
    })?;
    let buffer = args.buffer.unwrap_or(HEADER_LEN + class.max_payload());

    let loopback = sim::build(
        config,
        Topology {
            generation: args.generation,
            num_vfs: 1,
            pf_version: COMPAT_VERSION,
            vf_version: COMPAT_VERSION,
        },
    )?;
    let vf = loopback
        .vf(0)
        .ok_or_else(|| CliError::new(INTERNAL, "simulation has no VF 0"))?;

    // Providers tailor blocks to the negotiated version.
    vf.request_version()
        .map_err(|err| proto_error("negotiate", err))?;
    let bytes = vf
        .get_block(args.block_type, buffer)
        .map_err(|err| proto_error(&format!("block {}", args.block_type), err))?;

    if let OutputFormat::Raw = format {
        print_raw(&bytes);
        return Ok(SUCCESS);
    }

    let out = BlockOutput {
        block_type: args.block_type,
        class: label(class),
        version: bytes.first().copied().unwrap_or_default(),
        length: bytes.get(1).copied().unwrap_or_default(),
        payload: to_hex(bytes.get(HEADER_LEN..).unwrap_or_default()),
        crc: format!("0x{:02x}", blkmsg_crc(&bytes)),
    };

    match format {
        OutputFormat::Json => print_json(&out),
        _ => print_fields(
            &[
                ("block_type", out.block_type.to_string()),
                ("class", out.class.clone()),
                ("version", out.version.to_string()),
                ("length", out.length.to_string()),
                ("payload", out.payload.clone()),
                ("crc", out.crc.clone()),
            ],
            format,
        ),
    }
    Ok(SUCCESS)
}
