use pfvf_codec::blkmsg_crc;
use serde::Serialize;

use crate::cmd::CrcArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::hex::{parse_hex, to_hex};
use crate::output::{print_fields, print_json, OutputFormat};

#[derive(Serialize)]
struct CrcOutput {
    bytes: String,
    length: usize,
    crc: String,
}

pub fn run(args: CrcArgs, format: OutputFormat) -> CliResult<i32> {
    let bytes = parse_hex(&args.hex)?;
    let crc = blkmsg_crc(&bytes);

    match format {
        OutputFormat::Json => print_json(&CrcOutput {
            bytes: to_hex(&bytes),
            length: bytes.len(),
            crc: format!("0x{crc:02x}"),
        }),
        OutputFormat::Raw => println!("{crc:02x}"),
        _ => print_fields(
            &[
                ("length", bytes.len().to_string()),
                ("crc", format!("0x{crc:02x}")),
            ],
            format,
        ),
    }
    Ok(SUCCESS)
}
