//! `client-single`: one GET or PUT issued directly against a shard, with
//! the process exit code carrying the outcome (no retry, no mirror KV).

use std::net::{SocketAddr, TcpStream};
use std::thread;
use std::time::Duration;

use wire::{Operation, OperationType, Reply, Request};

use crate::routing;

const CONNECT_RETRY_DELAY: Duration = Duration::from_millis(50);

pub enum SingleOp {
    Get,
    Put(Vec<u8>),
}

pub struct SingleRequest {
    pub key: u32,
    pub op: SingleOp,
    pub master_addr: SocketAddr,
    /// `None` routes through the master; `Some(port)` talks to the shard
    /// directly, mirroring the original's `DIRECT` flag.
    pub direct_port: Option<u16>,
}

/// Exit codes match the reference client: `0` success, `1` protocol/error,
/// `2` key not found.
pub fn run(req: SingleRequest) -> i32 {
    let operation = match &req.op {
        SingleOp::Get => Operation::new(OperationType::Get).with_key(req.key),
        SingleOp::Put(value) => Operation::new(OperationType::Put).with_key(req.key).with_value(value.clone()),
    };

    let server_port = match req.direct_port {
        Some(port) => port,
        None => match routing::ask_master_for_owner(req.master_addr, operation.clone()) {
            Ok(port) => port,
            Err(e) => {
                slog_global::warn!("failed to resolve owning shard from master"; "err" => %e);
                return 1;
            }
        },
    };

    let server_addr = SocketAddr::new(req.master_addr.ip(), server_port);
    let mut stream = match connect_with_retry(server_addr) {
        Ok(s) => s,
        Err(e) => {
            slog_global::warn!("could not connect to shard"; "err" => %e);
            return 1;
        }
    };

    let request = Request::single(operation);
    if wire::send_frame(&mut stream, &request.encode()).is_err() {
        return 1;
    }

    let reply: Reply = match wire::recv_frame(&mut stream) {
        Ok(Some(payload)) => match Reply::decode(&payload) {
            Ok(r) => r,
            Err(_) => return 1,
        },
        _ => return 1,
    };

    let Some(first) = reply.ops.first() else { return 1 };
    if first.value.as_deref() == Some(b"NOT-FOUND".as_slice()) {
        return 2;
    }
    if first.success == Some(true) {
        0
    } else {
        1
    }
}

fn connect_with_retry(addr: SocketAddr) -> std::io::Result<TcpStream> {
    loop {
        match TcpStream::connect(addr) {
            Ok(s) => return Ok(s),
            Err(e) if e.kind() == std::io::ErrorKind::ConnectionRefused => {
                thread::sleep(CONNECT_RETRY_DELAY);
            }
            Err(e) => return Err(e),
        }
    }
}
