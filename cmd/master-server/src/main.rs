use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use shardkv::master::{self, MasterState};

const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(10);
const HEALTH_CHECK_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Master coordinator: tracks shard membership and routes clients to the
/// owning shard for a key.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Opt {
    /// Port the master listens on.
    #[arg(short = 'p', long = "MASTER_PORT")]
    master_port: u16,

    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() {
    let opt = Opt::parse();
    shardkv::logging::init(&opt.log_level);

    let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), opt.master_port);
    let listener = master::bind(addr).unwrap_or_else(|e| {
        slog_global::crit!("failed to bind master listener"; "addr" => %addr, "err" => %e);
        std::process::exit(1);
    });

    let state = Arc::new(MasterState::new());
    let queue = master::new_queue();

    {
        let state = state.clone();
        thread::spawn(move || master::health_check_loop(state, HEALTH_CHECK_INTERVAL, HEALTH_CHECK_CONNECT_TIMEOUT));
    }
    {
        let state = state.clone();
        let queue = queue.clone();
        thread::spawn(move || master::dispatch_loop(state, queue));
    }

    slog_global::info!("master listening"; "addr" => %addr);
    master::listen(listener, queue);
}
