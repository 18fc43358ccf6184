use thiserror::Error;

use kv_engine::EngineError;
use wire::{CodecError, FramingError};

/// Top-level error surfaced by the shard server's request dispatch loop and
/// the master coordinator's connection handling. A dispatch error that
/// reaches the top of the accept loop always means the connection is torn
/// down; it never retries in place.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("received a request with no operations")]
    EmptyRequest,
}
