//! Pure request-dispatch core: engine operations in, reply operations out.
//! Kept free of socket concerns so it can be unit tested directly; the
//! connection loop in [`crate::server`] is the only caller.

use kv_engine::Engine;
use wire::{Operation, OperationType, Reply, Request};

use crate::errors::DispatchError;
use crate::metrics::SERVER_OPS;

const NOT_FOUND: &[u8] = b"NOT-FOUND";

/// Applies every operation in `req` against `engine` in order and returns
/// the corresponding reply. `TXN_START` is never handled here: it is the
/// master's redistribution control signal and is intercepted by the
/// connection loop before a request ever reaches this function.
pub fn dispatch(engine: &Engine, req: &Request) -> Result<Reply, DispatchError> {
    if req.ops.is_empty() {
        return Err(DispatchError::EmptyRequest);
    }
    let mut ops = Vec::with_capacity(req.ops.len());
    for op in &req.ops {
        ops.push(dispatch_one(engine, op)?);
    }
    Ok(Reply { ops })
}

fn dispatch_one(engine: &Engine, op: &Operation) -> Result<Operation, DispatchError> {
    let ty = op.op.ok_or(DispatchError::EmptyRequest)?;
    let key = op.key.unwrap_or(0);

    let reply = match ty {
        OperationType::Get => {
            SERVER_OPS.get.inc();
            let value = engine.get(key).unwrap_or_else(|| NOT_FOUND.to_vec());
            Operation::new(OperationType::Get)
                .with_value(value)
                .with_success(true)
                .with_op_id(1)
        }
        OperationType::Put => {
            SERVER_OPS.put.inc();
            let value = op.value.clone().unwrap_or_default();
            engine.put(key, value.clone());
            Operation::new(OperationType::Put)
                .with_value(value)
                .with_success(true)
                .with_op_id(0)
        }
        OperationType::TxnPut => {
            SERVER_OPS.txn_put.inc();
            let txn_id = op.txn_id.unwrap_or(0);
            ensure_started(engine, txn_id);
            let value = op.value.clone().unwrap_or_default();
            let success = engine.txn_put(txn_id, key, value);
            Operation::new(OperationType::TxnPut).with_success(success)
        }
        OperationType::TxnGet => {
            SERVER_OPS.txn_get.inc();
            let txn_id = op.txn_id.unwrap_or(0);
            ensure_started(engine, txn_id);
            let (success, value) = engine.txn_get(txn_id, key);
            Operation::new(OperationType::TxnGet)
                .with_success(success)
                .with_value(value)
        }
        OperationType::TxnGetAndExecute => {
            SERVER_OPS.txn_get_and_execute.inc();
            Operation::new(OperationType::TxnGetAndExecute).with_success(false)
        }
        OperationType::TxnCommit => {
            SERVER_OPS.txn_commit.inc();
            let txn_id = op.txn_id.unwrap_or(0);
            let success = engine.txn_commit(txn_id);
            Operation::new(OperationType::TxnCommit).with_success(success)
        }
        OperationType::TxnAbort => {
            SERVER_OPS.txn_abort.inc();
            let txn_id = op.txn_id.unwrap_or(0);
            let success = engine.txn_abort(txn_id);
            Operation::new(OperationType::TxnAbort).with_success(success)
        }
        OperationType::TxnStart | OperationType::Init => {
            return Err(DispatchError::EmptyRequest);
        }
    };
    Ok(reply)
}

/// Lazily starts a transaction the first time a client names an unseen
/// `txn_id` on `TXN_PUT`/`TXN_GET`, since `TXN_START` itself is reserved on
/// the wire for the redistribution control signal (see module docs). A
/// second call for an already-live id is a harmless no-op.
fn ensure_started(engine: &Engine, txn_id: u64) {
    let _ = engine.txn_start(txn_id);
}
