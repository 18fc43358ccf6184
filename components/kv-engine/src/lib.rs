//! In-memory key/value engine with transactional write buffering.
//!
//! The engine is guarded by three independent locks rather than one big
//! lock around the whole store, mirroring the reference implementation's
//! split between its store mutex, its live-transaction mutex, and its
//! iteration-cursor mutex. Every method that needs more than one of them
//! acquires in the fixed order `txns -> map -> locks`; this is the only
//! order used anywhere in the crate, so the engine cannot deadlock against
//! itself no matter how many threads call into it concurrently. The same
//! engine doubles as the client-side mirror store used to verify server
//! responses after a benchmark run.

mod engine;

pub use engine::{Engine, EngineError, Key, TxnId, Value};
