//! Transaction dependency graph and the recursive topological-interleaving
//! oracle. Grounded in `load_txn.h`'s `TxnGraph`/`GraphNode` and
//! `load_txn.cpp`'s `parse_txn_trace`/`get_possible_results`, reworked from
//! a reference-counted node graph into an arena of nodes addressed by index
//! with explicit in-degree counters. The refcounted version relies on a
//! node's own destructor firing once its last incoming edge is dropped to
//! requeue it as ready; the index-and-counter version makes that readiness
//! transition an explicit, inspectable integer decrement instead.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ops::{apply_cmd, KvStoreState, TxnCmd};

#[derive(Debug, Error)]
pub enum DagError {
    #[error("trace refers to unknown txn id {0}")]
    UnknownTxnId(u64),
    #[error("failed to parse trace json: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct DagNode {
    pub id: u64,
    pub is_txn: bool,
    pub cmds: Vec<TxnCmd>,
    /// Indices, into the owning [`TxnGraph`]'s `nodes`, of nodes that
    /// depend on this one.
    pub successors: Vec<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct TxnGraph {
    pub nodes: Vec<DagNode>,
}

impl TxnGraph {
    fn initial_in_degree(&self) -> Vec<usize> {
        let mut in_degree = vec![0usize; self.nodes.len()];
        for node in &self.nodes {
            for &succ in &node.successors {
                in_degree[succ] += 1;
            }
        }
        in_degree
    }

    fn initial_ready(&self, in_degree: &[usize]) -> VecDeque<usize> {
        in_degree
            .iter()
            .enumerate()
            .filter(|(_, &d)| d == 0)
            .map(|(i, _)| i)
            .collect()
    }
}

/// Enumerates every key/value state reachable by some legal topological
/// interleaving of `graph`'s nodes. When at any point only one node is
/// ready, there is no scheduling choice to make and execution continues
/// along a single path; whenever more than one node is ready, the oracle
/// branches once per choice and unions the results.
pub fn get_possible_results(graph: &TxnGraph) -> Vec<KvStoreState> {
    if graph.nodes.is_empty() {
        return vec![KvStoreState::new()];
    }
    let in_degree = graph.initial_in_degree();
    let ready = graph.initial_ready(&in_degree);
    explore(graph, in_degree, ready, KvStoreState::new())
}

/// Only a real transaction node (`is_txn`) or the designated root (`id ==
/// 0`) mutates the oracle's simulated state; any other node is a pure
/// observation that still occupies a slot in the schedule.
fn apply_node(graph: &TxnGraph, node: usize, mut state: KvStoreState) -> KvStoreState {
    let n = &graph.nodes[node];
    if n.is_txn || n.id == 0 {
        for cmd in &n.cmds {
            apply_cmd(&mut state, cmd);
        }
    }
    state
}

fn advance(graph: &TxnGraph, node: usize, in_degree: &mut [usize], ready: &mut VecDeque<usize>) {
    for &succ in &graph.nodes[node].successors {
        in_degree[succ] -= 1;
        if in_degree[succ] == 0 {
            ready.push_back(succ);
        }
    }
}

fn explore(
    graph: &TxnGraph,
    mut in_degree: Vec<usize>,
    mut ready: VecDeque<usize>,
    mut state: KvStoreState,
) -> Vec<KvStoreState> {
    loop {
        match ready.len() {
            0 => return vec![state],
            1 => {
                let node = ready.pop_front().unwrap();
                state = apply_node(graph, node, state);
                advance(graph, node, &mut in_degree, &mut ready);
            }
            _ => {
                let mut results = Vec::new();
                for i in 0..ready.len() {
                    let mut ready_branch = ready.clone();
                    let node = ready_branch.remove(i).unwrap();
                    let mut in_degree_branch = in_degree.clone();
                    let state_branch = apply_node(graph, node, state.clone());
                    advance(graph, node, &mut in_degree_branch, &mut ready_branch);
                    results.extend(explore(graph, in_degree_branch, ready_branch, state_branch));
                }
                return results;
            }
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct NodeTrace {
    txn_id: u64,
    #[serde(default = "default_true")]
    is_txn: bool,
    #[serde(default)]
    depends_on: Vec<u64>,
    cmds: Vec<CmdTrace>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize)]
struct CmdTrace {
    op: OpTrace,
    #[serde(default)]
    key: u32,
    #[serde(default)]
    value: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum OpTrace {
    Get,
    Put,
    SendAndExecute,
    Prepare,
    Commit,
    Abort,
    Kill,
    Pause,
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

impl From<&CmdTrace> for TxnCmd {
    fn from(c: &CmdTrace) -> Self {
        use crate::ops::{FuncOp, Op};
        let op = match c.op {
            OpTrace::Get => Op::Get,
            OpTrace::Put => Op::Put,
            OpTrace::SendAndExecute => Op::SendAndExecute,
            OpTrace::Prepare => Op::Prepare,
            OpTrace::Commit => Op::Commit,
            OpTrace::Abort => Op::Abort,
            OpTrace::Kill => Op::Kill,
            OpTrace::Pause => Op::Pause,
            OpTrace::Add => Op::Func(FuncOp::Add),
            OpTrace::Sub => Op::Func(FuncOp::Sub),
            OpTrace::Mult => Op::Func(FuncOp::Mult),
            OpTrace::Div => Op::Func(FuncOp::Div),
            OpTrace::Mod => Op::Func(FuncOp::Mod),
            OpTrace::And => Op::Func(FuncOp::And),
            OpTrace::Or => Op::Func(FuncOp::Or),
            OpTrace::Xor => Op::Func(FuncOp::Xor),
            OpTrace::Not => Op::Func(FuncOp::Not),
            OpTrace::Nand => Op::Func(FuncOp::Nand),
            OpTrace::Nor => Op::Func(FuncOp::Nor),
        };
        TxnCmd { op, key: c.key, value: c.value.clone().into_bytes() }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct TraceFile {
    txns: Vec<NodeTrace>,
}

/// Parses a JSON transaction-dependency trace into a [`TxnGraph`]. The
/// on-disk format is `{ "txns": [ { "txn_id", "is_txn", "depends_on",
/// "cmds": [ { "op", "key", "value" } ] } ] }`.
pub fn parse_txn_trace(json: &str) -> Result<TxnGraph, DagError> {
    let file: TraceFile = serde_json::from_str(json)?;
    let index_of: HashMap<u64, usize> = file
        .txns
        .iter()
        .enumerate()
        .map(|(i, t)| (t.txn_id, i))
        .collect();

    let mut nodes: Vec<DagNode> = file
        .txns
        .iter()
        .map(|t| DagNode {
            id: t.txn_id,
            is_txn: t.is_txn,
            cmds: t.cmds.iter().map(TxnCmd::from).collect(),
            successors: Vec::new(),
        })
        .collect();

    for t in &file.txns {
        let this_idx = index_of[&t.txn_id];
        for dep in &t.depends_on {
            let dep_idx = *index_of.get(dep).ok_or(DagError::UnknownTxnId(*dep))?;
            nodes[dep_idx].successors.push(this_idx);
        }
    }

    Ok(TxnGraph { nodes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::Op;

    fn leaf(id: u64, op: Op, key: u32, value: &str) -> DagNode {
        DagNode {
            id,
            is_txn: true,
            cmds: vec![TxnCmd { op, key, value: value.as_bytes().to_vec() }],
            successors: Vec::new(),
        }
    }

    #[test]
    fn single_chain_has_one_outcome() {
        let mut a = leaf(1, Op::Put, 1, "1");
        a.successors.push(1);
        let b = leaf(2, Op::Put, 1, "2");
        let graph = TxnGraph { nodes: vec![a, b] };
        let results = get_possible_results(&graph);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].get(&1), Some(&b"2".to_vec()));
    }

    #[test]
    fn independent_nodes_branch_into_both_orders() {
        let a = leaf(1, Op::Put, 1, "a");
        let b = leaf(2, Op::Put, 1, "b");
        let graph = TxnGraph { nodes: vec![a, b] };
        let results = get_possible_results(&graph);
        assert_eq!(results.len(), 2);
        let values: Vec<_> = results.iter().map(|s| s.get(&1).cloned()).collect();
        assert!(values.contains(&Some(b"a".to_vec())));
        assert!(values.contains(&Some(b"b".to_vec())));
    }

    #[test]
    fn parses_depends_on_into_successor_edges() {
        let json = r#"{
            "txns": [
                { "txn_id": 1, "cmds": [ { "op": "put", "key": 1, "value": "1" } ] },
                { "txn_id": 2, "depends_on": [1], "cmds": [ { "op": "get", "key": 1 } ] }
            ]
        }"#;
        let graph = parse_txn_trace(json).unwrap();
        assert_eq!(graph.nodes[0].successors, vec![1]);
        let results = get_possible_results(&graph);
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn non_txn_node_with_nonzero_id_does_not_mutate_state() {
        let mut observation = leaf(5, Op::Put, 1, "should-not-apply");
        observation.is_txn = false;
        let graph = TxnGraph { nodes: vec![observation] };
        let results = get_possible_results(&graph);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].get(&1), None);
    }

    #[test]
    fn root_node_with_id_zero_mutates_even_when_not_is_txn() {
        let mut root = leaf(0, Op::Put, 1, "applied");
        root.is_txn = false;
        let graph = TxnGraph { nodes: vec![root] };
        let results = get_possible_results(&graph);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].get(&1), Some(&b"applied".to_vec()));
    }

    #[test]
    fn unknown_dependency_is_reported() {
        let json = r#"{
            "txns": [
                { "txn_id": 2, "depends_on": [1], "cmds": [] }
            ]
        }"#;
        let err = parse_txn_trace(json).unwrap_err();
        assert!(matches!(err, DagError::UnknownTxnId(1)));
    }
}
