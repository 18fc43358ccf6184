//! `client-bench`: a barrier-synchronized pool of load-generating threads,
//! each replaying a slice of a shared trace against one shard and verifying
//! its own writes against a local mirror once the run settles.

use std::io::{self};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Barrier};
use std::thread;

use kv_engine::Engine;
use wire::{Operation, OperationType, Reply, Request};
use workload::generate::{TraceCmd, TraceOp};

pub const DEFAULT_CLIENT_BASE_PORT: u16 = 40000;

pub struct BenchConfig {
    pub c_threads: u16,
    pub shard_addr: SocketAddr,
    pub n_messages: usize,
    pub trace: Arc<Vec<TraceCmd>>,
    pub client_base_port: u16,
}

struct Barriers {
    start_point: Barrier,
    terminate_point: Barrier,
}

/// Runs the full barrier-synchronized benchmark and blocks until every
/// thread has finished verification. Any verification mismatch is fatal
/// to the process, matching the reference client's `exit(1)` on mismatch.
pub fn run(cfg: BenchConfig) {
    let barriers = Arc::new(Barriers {
        start_point: Barrier::new(cfg.c_threads as usize),
        terminate_point: Barrier::new(cfg.c_threads as usize),
    });
    let trace_len = cfg.trace.len();
    let slice = if cfg.c_threads == 0 { 0 } else { trace_len / cfg.c_threads as usize };

    thread::scope(|scope| {
        for thread_id in 0..cfg.c_threads {
            let barriers = barriers.clone();
            let trace = cfg.trace.clone();
            let shard_addr = cfg.shard_addr;
            let client_port = cfg.client_base_port + thread_id;
            let n_messages = cfg.n_messages;
            scope.spawn(move || {
                run_one_thread(thread_id, shard_addr, client_port, &trace, slice, n_messages, &barriers);
            });
        }
    });
}

fn run_one_thread(
    thread_id: u16,
    shard_addr: SocketAddr,
    client_port: u16,
    trace: &[TraceCmd],
    slice: usize,
    n_messages: usize,
    barriers: &Barriers,
) {
    let (mut request_sock, mut reply_sock) = match connect_duplex(shard_addr, client_port) {
        Ok(pair) => pair,
        Err(e) => {
            slog_global::warn!("bench thread failed to connect"; "thread_id" => thread_id, "err" => %e);
            return;
        }
    };

    let mirror = Engine::new();
    barriers.start_point.wait();

    let start = if slice == 0 { 0 } else { (thread_id as usize * slice) % trace.len().max(1) };
    let mut sent = 0usize;
    let mut idx = start;
    while sent < n_messages && !trace.is_empty() {
        let cmd = &trace[idx % trace.len()];
        let op = match cmd.op {
            TraceOp::Get => Operation::new(OperationType::Get).with_key(cmd.key_hash),
            TraceOp::Put => {
                mirror.put(cmd.key_hash, cmd.value.clone());
                Operation::new(OperationType::Put).with_key(cmd.key_hash).with_value(cmd.value.clone())
            }
        };
        let req = Request::single(op);
        if wire::send_frame(&mut request_sock, &req.encode()).is_err() {
            break;
        }
        sent += 1;
        idx += 1;
    }

    let mut received = 0usize;
    while received < sent {
        match wire::recv_frame(&mut reply_sock) {
            Ok(Some(_)) => received += 1,
            _ => break,
        }
    }

    barriers.terminate_point.wait();
    verify(&mirror, &mut request_sock, &mut reply_sock);
}

fn connect_duplex(shard_addr: SocketAddr, client_port: u16) -> io::Result<(TcpStream, TcpStream)> {
    let mut request_sock = TcpStream::connect(shard_addr)?;
    let listener = TcpListener::bind(("0.0.0.0", client_port))?;
    let init = Request::single(Operation::new(OperationType::Init).with_port(client_port));
    wire::send_frame(&mut request_sock, &init.encode()).map_err(io::Error::other)?;
    let (reply_sock, _) = listener.accept()?;
    Ok((request_sock, reply_sock))
}

/// Replays every key in the thread's local mirror as a `GET` against the
/// server and checks the returned bytes match. Exits the process on the
/// first mismatch, matching the reference client's fatal verification.
fn verify(mirror: &Engine, request_sock: &mut TcpStream, reply_sock: &mut TcpStream) {
    mirror.init_iter();
    let mut verified = 0usize;
    while let Some(key) = mirror.next_key() {
        let expected = mirror.get(key).unwrap_or_default();
        let req = Request::single(Operation::new(OperationType::Get).with_key(key));
        if wire::send_frame(request_sock, &req.encode()).is_err() {
            std::process::exit(1);
        }
        let payload = match wire::recv_frame(reply_sock) {
            Ok(Some(p)) => p,
            _ => std::process::exit(1),
        };
        let reply = match Reply::decode(&payload) {
            Ok(r) => r,
            Err(_) => std::process::exit(1),
        };
        let actual = reply.ops.first().and_then(|o| o.value.clone()).unwrap_or_default();
        if actual != expected {
            slog_global::error!("verification mismatch"; "key" => key);
            std::process::exit(1);
        }
        verified += 1;
    }
    slog_global::info!("bench thread verification complete"; "keys_verified" => verified);
}
