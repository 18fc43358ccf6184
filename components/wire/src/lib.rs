//! Wire framing and message codec shared by every shardkv binary.
//!
//! Every socket in the system, client, shard server, and master, speaks the
//! same length-prefixed framing and the same tagged operation schema. Keeping
//! both in one crate means a change to the schema can never desync two
//! binaries built from different points in the tree.

mod framing;
mod message;

pub use framing::{recv_frame, send_frame, FramingError};
pub use message::{CodecError, Operation, OperationType, Reply, Request};

pub use framing::MAX_ZERO_READ_RETRIES;
