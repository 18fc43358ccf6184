//! Redistribution fan-out: on a shard join, every other registered shard is
//! told to stream its contents back out through the master so the keys it
//! no longer owns land on their new owner under the updated shard count.
//!
//! The reference implementation fires these notifications off as detached
//! threads with no way to tell when they've all landed. Here the fan-out
//! runs on `net_util::run_bounded_and_join`, so `manage_block` is only
//! cleared once every notified shard has actually received its `TXN_START`.

use std::net::TcpStream;
use std::time::Duration;

use wire::{Operation, OperationType, Request};

use super::{MasterState, ShardInfo};

const NOTIFY_CONCURRENCY: usize = 8;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Notifies every shard except `newest` to redistribute, blocking the
/// caller until all notifications have been delivered (or have failed and
/// been logged). `manage_block` is held for the duration so the dispatch
/// loop pauses client routing while keys are in flight.
pub fn redistribute(state: &MasterState, newest: &ShardInfo) {
    state.set_blocked(true);
    let targets: Vec<ShardInfo> = state
        .shards_snapshot()
        .into_iter()
        .filter(|s| s.id != newest.id)
        .collect();

    slog_global::info!("redistribution starting"; "new_shard" => newest.id, "peers" => targets.len());

    let tasks: Vec<_> = targets
        .into_iter()
        .map(|target| move || notify_one(target))
        .collect();
    net_util::run_bounded_and_join(tasks, NOTIFY_CONCURRENCY);

    state.set_blocked(false);
    slog_global::info!("redistribution complete"; "new_shard" => newest.id);
}

fn notify_one(target: ShardInfo) {
    let req = Request::single(Operation::new(OperationType::TxnStart));
    match TcpStream::connect_timeout(&target.addr, CONNECT_TIMEOUT) {
        Ok(mut stream) => {
            if let Err(e) = wire::send_frame(&mut stream, &req.encode()) {
                slog_global::warn!("redistribution notify failed"; "shard" => target.id, "err" => %e);
            }
        }
        Err(e) => {
            slog_global::warn!("could not reach shard for redistribution"; "shard" => target.id, "err" => %e);
        }
    }
}
