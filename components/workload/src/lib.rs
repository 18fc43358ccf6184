//! Workload generation and the transaction-DAG test oracle.
//!
//! Two independent concerns live here, both grounded in the reference
//! implementation's `workload_traces/` directory:
//!
//! - [`generate`]: flat get/put traces for the multi-threaded client
//!   benchmark driver.
//! - [`dag`] and [`ops`]: the transaction dependency graph used to check a
//!   concurrent transaction schedule against every legal serialization the
//!   graph allows. The graph is an arena of nodes addressed by index with
//!   explicit in-degree counters, not the reference implementation's
//!   reference-counted node graph, so that readiness can be computed and
//!   rolled back deterministically while enumerating branches.

pub mod dag;
pub mod generate;
pub mod ops;

pub use dag::{get_possible_results, parse_txn_trace, DagError, DagNode, TxnGraph};
pub use ops::{apply_cmd, FuncOp, KvStoreState, Op, TxnCmd};
