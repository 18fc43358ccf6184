//! Blocking-thread worker pool and bounded task-group helper.
//!
//! The shard and master control loops are built on blocking sockets, not
//! futures, so the background work they hand off (applying a batch of
//! writes off the accept loop, fanning a redistribution out to every peer
//! shard) is scheduled onto plain OS threads rather than an async runtime.
//! This module is the blocking-native analogue of a worker-pool
//! abstraction: a named background thread with a channel in front of it
//! (`Worker`/`Scheduler`/`Runnable`), plus a bounded task group that blocks
//! the caller until every spawned task has finished
//! (`run_bounded_and_join`), used wherever fire-and-forget background
//! threads would otherwise leave the caller unable to tell when a
//! multi-peer operation has actually finished.

mod pool;
mod task_group;

pub use pool::{Runnable, ScheduleError, Scheduler, Worker, WorkerPool};
pub use task_group::run_bounded_and_join;
