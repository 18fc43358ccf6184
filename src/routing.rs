//! Shared "ask the master which shard owns this key" round trip, used by
//! both the client driver and a shard's redistribution reinsertion path
//! (which issues writes through the master exactly as an external client
//! would, per the redistribution protocol).

use std::io;
use std::net::{SocketAddr, TcpStream};

use wire::{Operation, OperationType, Reply, Request};

/// Sends `probe_op` (any non-`INIT` op carrying the key to route) to the
/// master and returns the port of the key's owning shard. The master's
/// reply is itself a `Request`-shaped payload whose first op is `INIT` with
/// `port = owner_port`, an asymmetry preserved from the reference protocol.
pub fn ask_master_for_owner(master_addr: SocketAddr, probe_op: Operation) -> io::Result<u16> {
    let mut stream = TcpStream::connect(master_addr)?;
    let req = Request::single(probe_op);
    wire::send_frame(&mut stream, &req.encode()).map_err(io::Error::other)?;
    let payload = wire::recv_frame(&mut stream).map_err(io::Error::other)?.ok_or_else(|| {
        io::Error::new(io::ErrorKind::UnexpectedEof, "master closed connection before replying")
    })?;
    let reply = Request::decode(&payload).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let first = reply
        .ops
        .first()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "master reply had no operations"))?;
    Ok(first.port.unwrap_or(0))
}

/// Registers a shard's own listen port with the master. The socket is
/// closed immediately afterward; registration is fire-and-forget from the
/// shard's perspective.
pub fn register_with_master(master_addr: SocketAddr, own_port: u16) -> io::Result<()> {
    let mut stream = TcpStream::connect(master_addr)?;
    let req = Request::single(Operation::new(OperationType::Init).with_port(own_port));
    wire::send_frame(&mut stream, &req.encode()).map_err(io::Error::other)
}

/// Sends `req` directly to a shard at `shard_addr` and returns its reply.
pub fn send_to_shard(shard_addr: SocketAddr, req: &Request) -> io::Result<Reply> {
    let mut stream = TcpStream::connect(shard_addr)?;
    wire::send_frame(&mut stream, &req.encode()).map_err(io::Error::other)?;
    let payload = wire::recv_frame(&mut stream)
        .map_err(io::Error::other)?
        .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "shard closed connection before replying"))?;
    Reply::decode(&payload).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}
