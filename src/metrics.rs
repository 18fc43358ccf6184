// Licensed under Apache-2.0.

use lazy_static::lazy_static;
use prometheus::*;
use prometheus_static_metric::*;

make_static_metric! {
    pub struct ServerOpCounter: IntCounter {
        "type" => {
            init,
            get,
            put,
            txn_start,
            txn_put,
            txn_get,
            txn_get_and_execute,
            txn_commit,
            txn_abort,
        },
    }

    pub struct MasterRequestCounter: IntCounter {
        "type" => {
            init,
            route,
        },
    }
}

lazy_static! {
    pub static ref SERVER_OPS_VEC: IntCounterVec = register_int_counter_vec!(
        "shardkv_server_ops_total",
        "Total number of operations handled by a shard server, by operation type",
        &["type"]
    )
    .unwrap();
    pub static ref SERVER_OPS: ServerOpCounter = ServerOpCounter::from(&SERVER_OPS_VEC);
    pub static ref SERVER_ACTIVE_CONNECTIONS: IntGauge = register_int_gauge!(
        "shardkv_server_active_connections",
        "Number of currently open client connections on a shard server"
    )
    .unwrap();
    pub static ref MASTER_REQUESTS_VEC: IntCounterVec = register_int_counter_vec!(
        "shardkv_master_requests_total",
        "Total number of requests handled by the master coordinator, by request type",
        &["type"]
    )
    .unwrap();
    pub static ref MASTER_REQUESTS: MasterRequestCounter = MasterRequestCounter::from(&MASTER_REQUESTS_VEC);
    pub static ref MASTER_SHARD_COUNT: IntGauge = register_int_gauge!(
        "shardkv_master_shard_count",
        "Number of shard servers currently registered with the master"
    )
    .unwrap();
    pub static ref REDISTRIBUTION_KEYS_MOVED: IntCounter = register_int_counter!(
        "shardkv_redistribution_keys_moved_total",
        "Total number of keys moved by shard redistribution"
    )
    .unwrap();
}
