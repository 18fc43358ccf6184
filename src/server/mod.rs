//! Shard server: one listening TCP port, a worker pool draining accepted
//! connections, and a per-connection dispatch loop over the KV engine.

mod dispatch;

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use kv_engine::Engine;
use net_util::{Runnable, WorkerPool};
use wire::{OperationType, Reply, Request};

use crate::metrics::{REDISTRIBUTION_KEYS_MOVED, SERVER_ACTIVE_CONNECTIONS};
use crate::routing;

const PEEK_TIMEOUT: Duration = Duration::from_secs(3);

pub struct ShardServer {
    pub engine: Arc<Engine>,
    pub master_addr: SocketAddr,
}

impl ShardServer {
    pub fn new(master_addr: SocketAddr) -> Self {
        ShardServer {
            engine: Arc::new(Engine::new()),
            master_addr,
        }
    }

    /// Registers this shard with the master, recorded under its own
    /// listening port.
    pub fn register(&self, own_port: u16) -> io::Result<()> {
        routing::register_with_master(self.master_addr, own_port)
    }

    /// Runs the accept loop on `listener`, handing every accepted
    /// connection to a worker pool of `pool_size` threads. Blocks forever.
    pub fn serve(&self, listener: TcpListener, pool_size: usize) -> io::Result<()> {
        let engine = self.engine.clone();
        let master_addr = self.master_addr;
        let (pool, scheduler) = WorkerPool::start("shard-conn", pool_size, move || ConnectionHandler {
            engine: engine.clone(),
            master_addr,
        });

        for stream in listener.incoming() {
            let stream = match stream {
                Ok(s) => s,
                Err(e) => {
                    slog_global::warn!("failed to accept connection"; "err" => %e);
                    continue;
                }
            };
            if scheduler.schedule(stream).is_err() {
                break;
            }
        }
        drop(scheduler);
        pool.stop();
        Ok(())
    }
}

struct ConnectionHandler {
    engine: Arc<Engine>,
    master_addr: SocketAddr,
}

impl Runnable for ConnectionHandler {
    type Task = TcpStream;

    fn run(&mut self, stream: TcpStream) {
        SERVER_ACTIVE_CONNECTIONS.inc();
        handle_connection(&self.engine, self.master_addr, stream);
        SERVER_ACTIVE_CONNECTIONS.dec();
    }
}

/// Drives one accepted connection until it closes or idles out. A 3-second
/// read timeout on every peek treats a silent peer as closed, matching the
/// reference server's idle-connection handling.
fn handle_connection(engine: &Engine, master_addr: SocketAddr, mut stream: TcpStream) {
    if stream.set_read_timeout(Some(PEEK_TIMEOUT)).is_err() {
        return;
    }
    let mut reply_sink: Option<TcpStream> = None;

    loop {
        let mut peek_buf = [0u8; 1];
        match stream.peek(&mut peek_buf) {
            Ok(0) => return,
            Ok(_) => {}
            Err(ref e) if is_timeout(e) => return,
            Err(_) => return,
        }

        let payload = match wire::recv_frame(&mut stream) {
            Ok(Some(p)) => p,
            Ok(None) => return,
            Err(e) => {
                slog_global::debug!("frame read failed, closing connection"; "err" => %e);
                return;
            }
        };
        let req = match Request::decode(&payload) {
            Ok(r) => r,
            Err(e) => {
                slog_global::warn!("failed to decode request, closing connection"; "err" => %e);
                return;
            }
        };
        let Some(first) = req.ops.first() else {
            return;
        };

        match first.op {
            Some(OperationType::Init) => {
                if let Some(port) = first.port {
                    open_reply_sink(&stream, port, &mut reply_sink);
                }
                continue;
            }
            Some(OperationType::TxnStart) => {
                redistribute_out(engine, master_addr);
                continue;
            }
            _ => {}
        }

        let reply = match dispatch::dispatch(engine, &req) {
            Ok(r) => r,
            Err(e) => {
                slog_global::warn!("dispatch failed, closing connection"; "err" => %e);
                return;
            }
        };
        let bytes = reply.encode();
        let sent = match reply_sink.as_mut() {
            Some(sink) => wire::send_frame(sink, &bytes),
            None => wire::send_frame(&mut stream, &bytes),
        };
        if sent.is_err() {
            return;
        }
    }
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

fn open_reply_sink(stream: &TcpStream, port: u16, reply_sink: &mut Option<TcpStream>) {
    let Ok(peer) = stream.peer_addr() else { return };
    match TcpStream::connect((peer.ip(), port)) {
        Ok(sink) => *reply_sink = Some(sink),
        Err(e) => slog_global::warn!("failed to open reverse reply connection"; "port" => port, "err" => %e),
    }
}

/// Handles the `TXN_START` redistribution control signal: snapshots this
/// shard's contents, resets its own map immediately, then reinserts every
/// key through the master's ordinary client-routing path so it lands on
/// its new owner under the updated modulus.
fn redistribute_out(engine: &Engine, master_addr: SocketAddr) {
    let snapshot = engine.drain_all();
    slog_global::info!("redistributing keys out"; "count" => snapshot.len());
    for (key, value) in snapshot {
        match reinsert_via_master(master_addr, key, &value) {
            Ok(()) => REDISTRIBUTION_KEYS_MOVED.inc(),
            Err(e) => slog_global::warn!("failed to reinsert key during redistribution"; "key" => key, "err" => %e),
        }
    }
}

fn reinsert_via_master(master_addr: SocketAddr, key: u32, value: &[u8]) -> io::Result<()> {
    use wire::Operation;
    let probe = Operation::new(OperationType::Put).with_key(key);
    let owner_port = routing::ask_master_for_owner(master_addr, probe)?;
    let shard_addr: SocketAddr = (master_addr.ip(), owner_port).into();
    let put = Request::single(Operation::new(OperationType::Put).with_key(key).with_value(value.to_vec()));
    let reply: Reply = routing::send_to_shard(shard_addr, &put)?;
    if reply.ops.first().and_then(|o| o.success) != Some(true) {
        slog_global::warn!("reinsert replied without success"; "key" => key);
    }
    Ok(())
}
