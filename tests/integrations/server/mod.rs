//! End-to-end scenarios driven over real loopback sockets: one master and
//! one or more shard servers running on background threads, exercised the
//! way a client actually would.

mod common;

use common::{new_master, new_shard};
use std::time::{Duration, Instant};
use wire::{Operation, OperationType, Request};

fn put(shard_addr: std::net::SocketAddr, key: u32, value: &[u8]) -> wire::Reply {
    let req = Request::single(Operation::new(OperationType::Put).with_key(key).with_value(value.to_vec()));
    shardkv::routing::send_to_shard(shard_addr, &req).unwrap()
}

fn get(shard_addr: std::net::SocketAddr, key: u32) -> wire::Reply {
    let req = Request::single(Operation::new(OperationType::Get).with_key(key));
    shardkv::routing::send_to_shard(shard_addr, &req).unwrap()
}

#[test]
fn single_put_get_round_trips_and_reports_not_found() {
    let master = new_master();
    let shard = new_shard(master.addr);

    let reply = put(shard.addr, 7, b"abc");
    assert_eq!(reply.ops[0].success, Some(true));

    let reply = get(shard.addr, 7);
    assert_eq!(reply.ops[0].value.as_deref(), Some(b"abc".as_slice()));

    let reply = get(shard.addr, 8);
    assert_eq!(reply.ops[0].value.as_deref(), Some(b"NOT-FOUND".as_slice()));
}

#[test]
fn keys_shard_by_modulus_over_registration_order() {
    let master = new_master();
    let shard_a = new_shard(master.addr);
    let shard_b = new_shard(master.addr);

    // key=2 -> (2 % 2) + 1 = shard 1 (A); key=3 -> (3 % 2) + 1 = shard 2 (B).
    let probe_a = Operation::new(OperationType::Put).with_key(2);
    let port_a = shardkv::routing::ask_master_for_owner(master.addr, probe_a).unwrap();
    assert_eq!(port_a, shard_a.addr.port());

    let probe_b = Operation::new(OperationType::Put).with_key(3);
    let port_b = shardkv::routing::ask_master_for_owner(master.addr, probe_b).unwrap();
    assert_eq!(port_b, shard_b.addr.port());
}

#[test]
fn txn_read_lock_is_released_on_abort() {
    let master = new_master();
    let shard = new_shard(master.addr);

    // TXN_START is reserved on the wire for redistribution (see
    // `shardkv::server::dispatch`'s module docs); txn 1 and txn 2 are
    // started implicitly by their first TXN_GET, as a real client's would be.
    let txn_get = |txn_id: u64, key: u32| -> wire::Reply {
        let op = Operation::new(OperationType::TxnGet).with_txn_id(txn_id).with_key(key);
        shardkv::routing::send_to_shard(shard.addr, &Request::single(op)).unwrap()
    };
    let txn_abort = |txn_id: u64| -> wire::Reply {
        let op = Operation::new(OperationType::TxnAbort).with_txn_id(txn_id);
        shardkv::routing::send_to_shard(shard.addr, &Request::single(op)).unwrap()
    };

    let r = txn_get(1, 5);
    assert_eq!(r.ops[0].success, Some(true));

    let r = txn_get(2, 5);
    assert_eq!(r.ops[0].success, Some(false));

    let r = txn_abort(1);
    assert_eq!(r.ops[0].success, Some(true));

    let r = txn_get(2, 5);
    assert_eq!(r.ops[0].success, Some(true));
}

#[test]
fn shard_join_redistributes_keys_to_their_new_owner() {
    let master = new_master();
    let shard_a = new_shard(master.addr);

    let route_put = |key: u32, value: &[u8]| {
        let probe = Operation::new(OperationType::Put).with_key(key);
        let port = shardkv::routing::ask_master_for_owner(master.addr, probe).unwrap();
        let addr = std::net::SocketAddr::new(master.addr.ip(), port);
        put(addr, key, value)
    };

    route_put(1, b"x");
    route_put(2, b"y");

    let shard_b = new_shard(master.addr);

    let route_get = |key: u32| -> wire::Reply {
        let probe = Operation::new(OperationType::Get).with_key(key);
        let port = shardkv::routing::ask_master_for_owner(master.addr, probe).unwrap();
        let addr = std::net::SocketAddr::new(master.addr.ip(), port);
        get(addr, key)
    };

    let deadline = Instant::now() + Duration::from_secs(5);
    let mut last = wire::Reply::default();
    while Instant::now() < deadline {
        last = route_get(1);
        if last.ops[0].value.as_deref() == Some(b"x".as_slice()) {
            break;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    assert_eq!(last.ops[0].value.as_deref(), Some(b"x".as_slice()));

    let reply = route_get(2);
    assert_eq!(reply.ops[0].value.as_deref(), Some(b"y".as_slice()));

    // key=1 now belongs to (1 % 2) + 1 = shard 2 (B), key=2 stays on A.
    let probe = Operation::new(OperationType::Get).with_key(1);
    let port = shardkv::routing::ask_master_for_owner(master.addr, probe).unwrap();
    assert_eq!(port, shard_b.addr.port());
    let probe = Operation::new(OperationType::Get).with_key(2);
    let port = shardkv::routing::ask_master_for_owner(master.addr, probe).unwrap();
    assert_eq!(port, shard_a.addr.port());
}
