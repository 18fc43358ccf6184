use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use clap::Parser;
use shardkv::client::bench::{self, BenchConfig, DEFAULT_CLIENT_BASE_PORT};
use workload::generate::{parse_line_trace, DEFAULT_READ_PERMILLE};

/// Multi-threaded load generator: replays a line trace against one shard
/// and verifies every write it issued once the run settles.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Opt {
    #[arg(short = 'c', long = "C_THREADS")]
    c_threads: u16,

    #[arg(short = 's', long = "HOSTNAME", default_value = "127.0.0.1")]
    hostname: String,

    #[arg(short = 'p', long = "PORT")]
    port: u16,

    #[arg(short = 'm', long = "N_MESSAGES")]
    n_messages: usize,

    #[arg(short = 't', long = "TRACE")]
    trace: std::path::PathBuf,

    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() {
    let opt = Opt::parse();
    shardkv::logging::init(&opt.log_level);

    let text = std::fs::read_to_string(&opt.trace).unwrap_or_else(|e| {
        slog_global::crit!("failed to read trace file"; "path" => %opt.trace.display(), "err" => %e);
        std::process::exit(1);
    });
    let trace = Arc::new(parse_line_trace(&text, DEFAULT_READ_PERMILLE, 0));
    slog_global::info!("loaded trace"; "entries" => trace.len());

    let ip: IpAddr = opt.hostname.parse().unwrap_or_else(|_| {
        slog_global::crit!("could not parse HOSTNAME as an IP address"; "hostname" => %opt.hostname);
        std::process::exit(1);
    });
    let shard_addr = SocketAddr::new(ip, opt.port);

    bench::run(BenchConfig {
        c_threads: opt.c_threads,
        shard_addr,
        n_messages: opt.n_messages,
        trace,
        client_base_port: DEFAULT_CLIENT_BASE_PORT,
    });
}
