//! Per-node operations and the state-mutation semantics the oracle in
//! [`crate::dag`] replays. Grounded in `load_txn.cpp`'s `op_type_map`,
//! `op_wrapper`, and `bin_op_wrapper`.

use std::collections::HashMap;

pub type Key = u32;
pub type Value = Vec<u8>;
pub type KvStoreState = HashMap<Key, Value>;

/// Arithmetic and bitwise operators. Each reads the node's own key as the
/// first operand and treats the node's `value` field, parsed as a decimal
/// key, as the second operand's location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuncOp {
    Add,
    Sub,
    Mult,
    Div,
    Mod,
    And,
    Or,
    Xor,
    Not,
    Nand,
    Nor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Get,
    Put,
    SendAndExecute,
    Prepare,
    Commit,
    Abort,
    Kill,
    Pause,
    Func(FuncOp),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxnCmd {
    pub op: Op,
    pub key: Key,
    pub value: Value,
}

fn parse_decimal(bytes: &[u8]) -> Option<i64> {
    std::str::from_utf8(bytes).ok()?.trim().parse().ok()
}

fn encode_decimal(v: i64) -> Value {
    v.to_string().into_bytes()
}

fn encode_unsigned(v: u64) -> Value {
    v.to_string().into_bytes()
}

/// Bitwise ops (`and`/`or`/`xor`/`not`/`nand`/`nor`) reinterpret both
/// operands through the matching-width unsigned type before applying, and
/// format the unsigned result, matching `bin_op_wrapper`/`not_func`.
/// Arithmetic ops keep the signed, wrapping `i64` arithmetic.
fn apply_func(state: &mut KvStoreState, cmd: &TxnCmd, func: FuncOp) -> bool {
    let Some(lhs) = state.get(&cmd.key).and_then(|v| parse_decimal(v)) else {
        return false;
    };

    if func == FuncOp::Not {
        state.insert(cmd.key, encode_unsigned(!(lhs as u64)));
        return true;
    }

    let Some(rhs_key) = parse_decimal(&cmd.value) else {
        return false;
    };
    let Some(rhs) = state.get(&(rhs_key as Key)).and_then(|v| parse_decimal(v)) else {
        return false;
    };

    match func {
        FuncOp::Add | FuncOp::Sub | FuncOp::Mult | FuncOp::Div | FuncOp::Mod => {
            let result = match func {
                FuncOp::Add => lhs.wrapping_add(rhs),
                FuncOp::Sub => lhs.wrapping_sub(rhs),
                FuncOp::Mult => lhs.wrapping_mul(rhs),
                FuncOp::Div => {
                    if rhs == 0 {
                        return false;
                    }
                    lhs.wrapping_div(rhs)
                }
                FuncOp::Mod => {
                    if rhs == 0 {
                        return false;
                    }
                    lhs.wrapping_rem(rhs)
                }
                _ => unreachable!("handled by outer match arm"),
            };
            state.insert(cmd.key, encode_decimal(result));
        }
        FuncOp::And | FuncOp::Or | FuncOp::Xor | FuncOp::Nand | FuncOp::Nor => {
            let (lhs, rhs) = (lhs as u64, rhs as u64);
            let result = match func {
                FuncOp::And => lhs & rhs,
                FuncOp::Or => lhs | rhs,
                FuncOp::Xor => lhs ^ rhs,
                FuncOp::Nand => !(lhs & rhs),
                FuncOp::Nor => !(lhs | rhs),
                _ => unreachable!("handled by outer match arm"),
            };
            state.insert(cmd.key, encode_unsigned(result));
        }
        FuncOp::Not => unreachable!("handled above"),
    }
    true
}

/// Applies one node's command to the oracle's simulated state. Control
/// operations (`SendAndExecute`, `Prepare`, `Commit`, `Abort`, `Kill`,
/// `Pause`) do not mutate the simulated key/value state: they describe live
/// execution side effects the oracle does not replay, matching the
/// reference oracle, which never invokes its own `send_cmd` while
/// enumerating outcomes.
pub fn apply_cmd(state: &mut KvStoreState, cmd: &TxnCmd) -> bool {
    match cmd.op {
        Op::Get => state.contains_key(&cmd.key),
        Op::Put => {
            state.insert(cmd.key, cmd.value.clone());
            true
        }
        Op::Func(func) => apply_func(state, cmd, func),
        Op::SendAndExecute | Op::Prepare | Op::Commit | Op::Abort | Op::Kill | Op::Pause => true,
    }
}
