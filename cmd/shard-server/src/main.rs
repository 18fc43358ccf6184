use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener};

use clap::Parser;
use shardkv::server::ShardServer;

/// Shard server: owns a slice of the keyspace and answers GET/PUT/TXN_*
/// requests routed to it by the master.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Opt {
    /// Port this shard listens on for client and peer connections.
    #[arg(short = 'p', long = "PORT")]
    port: u16,

    /// Port the master coordinator listens on.
    #[arg(short = 'm', long = "MASTER_PORT")]
    master_port: u16,

    /// Number of worker threads draining the connection queue.
    #[arg(long, default_value_t = 4)]
    pool_size: usize,

    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() {
    let opt = Opt::parse();
    shardkv::logging::init(&opt.log_level);

    let loopback = IpAddr::V4(Ipv4Addr::LOCALHOST);
    let master_addr = SocketAddr::new(loopback, opt.master_port);
    let listen_addr = SocketAddr::new(loopback, opt.port);

    let listener = TcpListener::bind(listen_addr).unwrap_or_else(|e| {
        slog_global::crit!("failed to bind shard listener"; "addr" => %listen_addr, "err" => %e);
        std::process::exit(1);
    });

    let server = ShardServer::new(master_addr);
    if let Err(e) = server.register(opt.port) {
        slog_global::crit!("failed to register with master"; "err" => %e);
        std::process::exit(1);
    }

    slog_global::info!("shard server listening"; "addr" => %listen_addr, "master" => %master_addr);
    if let Err(e) = server.serve(listener, opt.pool_size) {
        slog_global::crit!("shard server exited with error"; "err" => %e);
        std::process::exit(1);
    }
}
