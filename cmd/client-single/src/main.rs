use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use clap::Parser;
use shardkv::client::single::{self, SingleOp, SingleRequest};

#[derive(Clone, Debug, clap::ValueEnum)]
enum OperationArg {
    #[value(name = "GET")]
    Get,
    #[value(name = "PUT")]
    Put,
}

/// Issues a single GET or PUT against the shard owning `KEY`. Exits `0` on
/// success, `1` on a protocol error, `2` if the key was not found.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Opt {
    /// Port of the target shard. Only meaningful when DIRECT is 1.
    #[arg(short = 'p', long = "PORT", default_value_t = 0)]
    port: u16,

    #[arg(short = 'o', long = "OPERATION", value_enum)]
    operation: OperationArg,

    #[arg(short = 'k', long = "KEY")]
    key: u32,

    #[arg(short = 'v', long = "VALUE", default_value = "")]
    value: String,

    #[arg(short = 'm', long = "MASTER_PORT")]
    master_port: u16,

    /// 0: route through the master. 1: talk to PORT directly.
    #[arg(short = 'd', long = "DIRECT")]
    direct: u8,

    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() {
    let opt = Opt::parse();
    shardkv::logging::init(&opt.log_level);

    let master_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), opt.master_port);
    let op = match opt.operation {
        OperationArg::Get => SingleOp::Get,
        OperationArg::Put => SingleOp::Put(opt.value.into_bytes()),
    };
    let direct_port = if opt.direct == 1 { Some(opt.port) } else { None };

    let code = single::run(SingleRequest {
        key: opt.key,
        op,
        master_addr,
        direct_port,
    });
    println!("Client finished with {code}.");
    std::process::exit(code);
}
