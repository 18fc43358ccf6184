//! Library crate backing every shardkv binary: the shard server's request
//! dispatch, the master coordinator, and the client driver's shared
//! connection and barrier machinery.

pub mod client;
pub mod config;
pub mod errors;
pub mod logging;
pub mod master;
pub mod metrics;
pub mod routing;
pub mod server;

pub use errors::DispatchError;
