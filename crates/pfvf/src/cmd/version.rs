use serde::Serialize;

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_fields, print_json, OutputFormat};

#[derive(Serialize)]
struct VersionOutput {
    name: &'static str,
    version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    build: Option<BuildInfo>,
}

#[derive(Serialize)]
struct BuildInfo {
    target_os: &'static str,
    target_arch: &'static str,
    build_target: &'static str,
    /// Newest mailbox compat version this build speaks.
    compat_version: u8,
    /// Oldest PF version accepted when the PF answers "unknown".
    min_compat_version: u8,
}

pub fn run(args: VersionArgs, format: OutputFormat) -> CliResult<i32> {
    let name = env!("CARGO_PKG_NAME");
    let version = env!("CARGO_PKG_VERSION");
    let build = args.extended.then(|| {
        let defaults = pfvf_proto::ProtocolConfig::default();
        BuildInfo {
            target_os: std::env::consts::OS,
            target_arch: std::env::consts::ARCH,
            build_target: option_env!("PFVF_BUILD_TARGET").unwrap_or("unknown"),
            compat_version: defaults.compat_version,
            min_compat_version: defaults.min_compat_version,
        }
    });

    match (format, build) {
        (OutputFormat::Json, build) => print_json(&VersionOutput {
            name,
            version,
            build,
        }),
        (_, None) => println!("{name} {version}"),
        (format, Some(build)) => print_fields(
            &[
                ("name", name.to_string()),
                ("version", version.to_string()),
                ("target_os", build.target_os.to_string()),
                ("target_arch", build.target_arch.to_string()),
                ("build_target", build.build_target.to_string()),
                ("compat_version", build.compat_version.to_string()),
                ("min_compat_version", build.min_compat_version.to_string()),
            ],
            format,
        ),
    }
    Ok(SUCCESS)
}
