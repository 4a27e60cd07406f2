use comfy_table::Cell;
use pfvf_proto::{ProtoStatsSnapshot, COMPAT_VERSION};
use pfvf_transport::{Clock, TransportStatsSnapshot};
use serde::Serialize;

use crate::cmd::StatsArgs;
use crate::config::SimConfig;
use crate::exit::{proto_error, CliResult, SUCCESS};
use crate::output::{new_table, print_json, OutputFormat};
use crate::sim::{self, Generation, Topology};

#[derive(Serialize, Default, Clone, Copy)]
struct TransportCounters {
    sent: u64,
    busy: u64,
    collisions: u64,
    no_ack: u64,
    received: u64,
    spurious: u64,
    legacy: u64,
}

impl From<TransportStatsSnapshot> for TransportCounters {
    fn from(s: TransportStatsSnapshot) -> Self {
        Self {
            sent: s.sent,
            busy: s.busy,
            collisions: s.collisions,
            no_ack: s.no_ack,
            received: s.received,
            spurious: s.spurious,
            legacy: s.legacy,
        }
    }
}

impl TransportCounters {
    fn add(&mut self, other: &Self) {
        self.sent += other.sent;
        self.busy += other.busy;
        self.collisions += other.collisions;
        self.no_ack += other.no_ack;
        self.received += other.received;
        self.spurious += other.spurious;
        self.legacy += other.legacy;
    }
}

#[derive(Serialize)]
struct Endpoint {
    name: String,
    compat_version: u8,
    transport: TransportCounters,
    proto: Option<ProtoStatsSnapshot>,
}

#[derive(Serialize)]
struct StatsOutput {
    generation: Generation,
    elapsed_us: u128,
    endpoints: Vec<Endpoint>,
}

pub fn run(args: StatsArgs, format: OutputFormat, config: &SimConfig) -> CliResult<i32> {
    let num_vfs = usize::from(args.vfs);
    let loopback = sim::build(
        config,
        Topology {
            generation: args.generation,
            num_vfs,
            pf_version: COMPAT_VERSION,
            vf_version: COMPAT_VERSION,
        },
    )?;

    let mut endpoints = Vec::with_capacity(2 * num_vfs + 1);
    let mut pf_total = TransportCounters::default();
    for (index, vf) in loopback.vfs().iter().enumerate() {
        let session = vf
            .attach()
            .map_err(|err| proto_error(&format!("attach vf{index}"), err))?;
        let link: TransportCounters = loopback
            .pf()
            .transport_stats(index)
            .map_err(|err| proto_error("pf stats", err))?
            .into();
        pf_total.add(&link);

        endpoints.push(Endpoint {
            name: format!("vf{index}"),
            compat_version: session.compat_version,
            transport: vf.transport_stats().into(),
            proto: Some(vf.stats()),
        });
        endpoints.push(Endpoint {
            name: format!("pf->vf{index}"),
            compat_version: session.compat_version,
            transport: link,
            proto: None,
        });
    }
    endpoints.push(Endpoint {
        name: "pf".to_string(),
        compat_version: loopback.pf().config().compat_version,
        transport: pf_total,
        proto: Some(loopback.pf().stats()),
    });

    let out = StatsOutput {
        generation: args.generation,
        elapsed_us: loopback.clock().now().as_micros(),
        endpoints,
    };

    match format {
        OutputFormat::Json | OutputFormat::Raw => print_json(&out),
        OutputFormat::Table | OutputFormat::Pretty => print_table(&out),
    }
    Ok(SUCCESS)
}

fn print_table(out: &StatsOutput) {
    let mut table = new_table(vec![
        "ENDPOINT",
        "VERSION",
        "SENT",
        "BUSY",
        "COLLISIONS",
        "NO_ACK",
        "RECEIVED",
        "SPURIOUS",
        "LEGACY",
        "REQUESTS",
        "RESPONSES",
        "TIMEOUTS",
        "NOTIFICATIONS",
        "REJECTED",
    ]);
    for ep in &out.endpoints {
        let t = &ep.transport;
        let mut row = vec![
            Cell::new(&ep.name),
            Cell::new(ep.compat_version),
            Cell::new(t.sent),
            Cell::new(t.busy),
            Cell::new(t.collisions),
            Cell::new(t.no_ack),
            Cell::new(t.received),
            Cell::new(t.spurious),
            Cell::new(t.legacy),
        ];
        match &ep.proto {
            Some(p) => row.extend([
                Cell::new(p.requests),
                Cell::new(p.responses),
                Cell::new(p.timeouts),
                Cell::new(p.notifications),
                Cell::new(p.rejected),
            ]),
            None => row.extend((0..5).map(|_| Cell::new("-"))),
        }
        table.add_row(row);
    }
    println!("{table}");
}
