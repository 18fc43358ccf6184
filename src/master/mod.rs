//! Master coordinator: shard registry, client routing, and the
//! redistribution orchestrator triggered on shard join.

mod redistribute;

use std::collections::VecDeque;
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use wire::{Operation, OperationType, Request};

use crate::metrics::{MASTER_REQUESTS, MASTER_SHARD_COUNT};

pub use redistribute::redistribute;

#[derive(Debug, Clone)]
pub struct ShardInfo {
    pub id: u32,
    pub addr: SocketAddr,
}

/// Shared master state: the shard registry and the `manage_block` gate
/// that pauses dispatch while a redistribution is in flight.
pub struct MasterState {
    shards: Mutex<Vec<ShardInfo>>,
    manage_block: AtomicBool,
    started: AtomicBool,
}

impl Default for MasterState {
    fn default() -> Self {
        Self::new()
    }
}

impl MasterState {
    pub fn new() -> Self {
        MasterState {
            shards: Mutex::new(Vec::new()),
            manage_block: AtomicBool::new(false),
            started: AtomicBool::new(false),
        }
    }

    /// Registers a newly joined shard, assigning it the next shard index.
    /// Returns the full registry snapshot (including the new entry) and
    /// whether this join should trigger redistribution (client traffic
    /// must already have begun).
    pub fn register_shard(&self, addr: SocketAddr) -> (ShardInfo, bool) {
        let mut shards = self.shards.lock().unwrap();
        let id = shards.len() as u32 + 1;
        let info = ShardInfo { id, addr };
        shards.push(info.clone());
        MASTER_SHARD_COUNT.set(shards.len() as i64);
        let should_redistribute = self.started.load(Ordering::Acquire);
        (info, should_redistribute)
    }

    pub fn shards_snapshot(&self) -> Vec<ShardInfo> {
        self.shards.lock().unwrap().clone()
    }

    pub fn shard_count(&self) -> u32 {
        self.shards.lock().unwrap().len() as u32
    }

    /// Returns the owning shard for `key` under the current modulus, or
    /// `None` if no shard has registered yet (`RegistrationRace`).
    pub fn owner_of(&self, key: u32) -> Option<ShardInfo> {
        let shards = self.shards.lock().unwrap();
        if shards.is_empty() {
            return None;
        }
        let owner_id = (key % shards.len() as u32) + 1;
        shards.iter().find(|s| s.id == owner_id).cloned()
    }

    pub fn mark_started(&self) {
        self.started.store(true, Ordering::Release);
    }

    pub fn is_blocked(&self) -> bool {
        self.manage_block.load(Ordering::Acquire)
    }

    fn set_blocked(&self, blocked: bool) {
        self.manage_block.store(blocked, Ordering::Release);
    }

    /// Removes any shard unreachable by a fresh connection attempt. Does
    /// not trigger redistribution: only joins do.
    pub fn prune_unreachable(&self, connect_timeout: Duration) {
        let mut shards = self.shards.lock().unwrap();
        let before = shards.len();
        shards.retain(|s| TcpStream::connect_timeout(&s.addr, connect_timeout).is_ok());
        if shards.len() != before {
            slog_global::warn!("removed unreachable shards"; "removed" => before - shards.len());
            MASTER_SHARD_COUNT.set(shards.len() as i64);
        }
    }
}

/// Accepts connections and pushes them onto `queue`; a separate dispatcher
/// drains it. Matches the reference's listener/dispatcher split, backed
/// here by a mutex-guarded `VecDeque` rather than a channel so the
/// dispatcher's `manage_block` pause is a simple flag check between pops.
pub fn listen(listener: TcpListener, queue: Arc<Mutex<VecDeque<TcpStream>>>) {
    for stream in listener.incoming() {
        match stream {
            Ok(s) => queue.lock().unwrap().push_back(s),
            Err(e) => slog_global::warn!("master accept failed"; "err" => %e),
        }
    }
}

/// Drains `queue` unless `state.is_blocked()`, polling every 5ms when the
/// queue is empty or blocked.
pub fn dispatch_loop(state: Arc<MasterState>, queue: Arc<Mutex<VecDeque<TcpStream>>>) {
    loop {
        if state.is_blocked() {
            thread::sleep(Duration::from_millis(5));
            continue;
        }
        let next = queue.lock().unwrap().pop_front();
        match next {
            Some(stream) => handle_connection(&state, stream),
            None => thread::sleep(Duration::from_millis(5)),
        }
    }
}

fn handle_connection(state: &Arc<MasterState>, mut stream: TcpStream) {
    loop {
        let payload = match wire::recv_frame(&mut stream) {
            Ok(Some(p)) => p,
            Ok(None) => return,
            Err(_) => return,
        };
        let req = match Request::decode(&payload) {
            Ok(r) => r,
            Err(e) => {
                slog_global::warn!("master failed to decode request"; "err" => %e);
                return;
            }
        };
        let Some(first) = req.ops.first() else { return };

        let reply = match first.op {
            Some(OperationType::Init) => {
                MASTER_REQUESTS.init.inc();
                let port = first.port.unwrap_or(0);
                let peer_ip = stream.peer_addr().map(|a| a.ip()).unwrap_or(std::net::Ipv4Addr::UNSPECIFIED.into());
                let addr = SocketAddr::new(peer_ip, port);
                let (info, should_redistribute) = state.register_shard(addr);
                slog_global::info!("shard registered"; "shard_id" => info.id, "addr" => %info.addr);
                if should_redistribute {
                    let state = state.clone();
                    let newest = info.clone();
                    thread::spawn(move || redistribute(&state, &newest));
                }
                None
            }
            Some(_) => {
                MASTER_REQUESTS.route.inc();
                state.mark_started();
                let key = first.key.unwrap_or(0);
                let owner_port = match state.owner_of(key) {
                    Some(shard) => shard.addr.port(),
                    None => {
                        slog_global::warn!("routing request before any shard has registered");
                        0
                    }
                };
                Some(Request::single(Operation::new(OperationType::Init).with_port(owner_port)))
            }
            None => return,
        };

        if let Some(reply) = reply {
            if wire::send_frame(&mut stream, &reply.encode()).is_err() {
                return;
            }
        } else {
            return;
        }
    }
}

/// Runs the 10-second liveness probe loop. Intended to be spawned on its
/// own thread; never returns.
pub fn health_check_loop(state: Arc<MasterState>, interval: Duration, connect_timeout: Duration) {
    loop {
        thread::sleep(interval);
        state.prune_unreachable(connect_timeout);
    }
}

pub type ListenerQueue = Arc<Mutex<VecDeque<TcpStream>>>;

pub fn new_queue() -> ListenerQueue {
    Arc::new(Mutex::new(VecDeque::new()))
}

pub fn bind(addr: SocketAddr) -> io::Result<TcpListener> {
    TcpListener::bind(addr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_shard_assigns_sequential_ids() {
        let state = MasterState::new();
        let (a, _) = state.register_shard("127.0.0.1:1".parse().unwrap());
        let (b, _) = state.register_shard("127.0.0.1:2".parse().unwrap());
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert_eq!(state.shard_count(), 2);
    }

    #[test]
    fn owner_of_follows_modulus() {
        let state = MasterState::new();
        state.register_shard("127.0.0.1:1026".parse().unwrap());
        state.register_shard("127.0.0.1:1027".parse().unwrap());
        assert_eq!(state.owner_of(2).unwrap().id, 1);
        assert_eq!(state.owner_of(3).unwrap().id, 2);
    }

    #[test]
    fn owner_of_before_any_registration_is_none() {
        let state = MasterState::new();
        assert!(state.owner_of(5).is_none());
    }

    #[test]
    fn join_after_traffic_started_signals_redistribution() {
        let state = MasterState::new();
        let (_, should) = state.register_shard("127.0.0.1:1".parse().unwrap());
        assert!(!should);
        state.mark_started();
        let (_, should) = state.register_shard("127.0.0.1:2".parse().unwrap());
        assert!(should);
    }
}
