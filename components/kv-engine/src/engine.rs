use std::collections::{HashMap, HashSet, VecDeque};

use parking_lot::Mutex;
use thiserror::Error;

pub type Key = u32;
pub type Value = Vec<u8>;
pub type TxnId = u64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("unknown transaction {0}")]
    UnknownTxn(TxnId),
    #[error("transaction {0} is already live")]
    TxnAlreadyLive(TxnId),
}

#[derive(Default)]
struct TxnState {
    writes: HashMap<Key, Value>,
    /// Keys reserved by this transaction's own reads; released on commit
    /// or abort.
    read_locks: HashSet<Key>,
}

/// A single shard's resident key/value state.
///
/// Acquisition order across the three locks, `txns`, then `map`, then
/// `locks`, is fixed everywhere in this file. A method never needs to
/// re-acquire a lock it already holds, and never acquires them out of
/// order, so no two threads calling into the same `Engine` can deadlock.
///
/// Every public method here returns a plain `bool`/`Option` per the
/// literal engine contract (`txn_put(id, k, v) -> true iff id live`, and so
/// on); the `_checked` methods beneath them expose the same operations as a
/// fallible `Result<_, EngineError>` so the three-critical-section
/// discipline is easy to unit test in isolation from the public surface.
pub struct Engine {
    map: Mutex<HashMap<Key, Value>>,
    txns: Mutex<HashMap<TxnId, TxnState>>,
    /// Keys currently reserved by a live transaction's own read, so a
    /// second transaction's read of the same key is rejected until the
    /// first ends. Reserved on read, not on write: a buffered write is
    /// only ever visible to its own transaction until commit.
    locks: Mutex<HashMap<Key, TxnId>>,
    iter_cursor: Mutex<Option<VecDeque<Key>>>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Engine {
            map: Mutex::new(HashMap::new()),
            txns: Mutex::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
            iter_cursor: Mutex::new(None),
        }
    }

    /// Direct, non-transactional write. Used for ordinary PUT requests and
    /// for applying a committed transaction's write buffer.
    pub fn put(&self, key: Key, value: Value) {
        self.map.lock().insert(key, value);
    }

    /// Direct, non-transactional read.
    pub fn get(&self, key: Key) -> Option<Value> {
        self.map.lock().get(&key).cloned()
    }

    /// Creates a new live transaction under the client-assigned `id`.
    /// Returns `true` iff `id` was not already live.
    pub fn txn_start(&self, id: TxnId) -> bool {
        self.txn_start_checked(id).is_ok()
    }

    pub fn txn_start_checked(&self, id: TxnId) -> Result<(), EngineError> {
        let mut txns = self.txns.lock();
        if txns.contains_key(&id) {
            return Err(EngineError::TxnAlreadyLive(id));
        }
        txns.insert(id, TxnState::default());
        Ok(())
    }

    /// Buffers a write under `id`. The write stays private to `id` until
    /// commit; it never reserves `key` against other transactions'
    /// reads. Returns `true` iff `id` is live.
    pub fn txn_put(&self, id: TxnId, key: Key, value: Value) -> bool {
        self.txn_put_checked(id, key, value).is_ok()
    }

    pub fn txn_put_checked(&self, id: TxnId, key: Key, value: Value) -> Result<(), EngineError> {
        let mut txns = self.txns.lock();
        let state = txns.get_mut(&id).ok_or(EngineError::UnknownTxn(id))?;
        state.writes.insert(key, value);
        Ok(())
    }

    /// Reads `key` as visible to `id`: the transaction's own buffered write
    /// if it has one, otherwise the committed value (or an empty value if
    /// absent). A successful read reserves `key` for `id` in the lock
    /// registry; a second transaction's read of the same key is rejected
    /// with `(false, "")` until `id` commits or aborts.
    pub fn txn_get(&self, id: TxnId, key: Key) -> (bool, Value) {
        match self.txn_get_checked(id, key) {
            Ok(Some(value)) => (true, value),
            Ok(None) => (false, Value::new()),
            Err(_) => (false, Value::new()),
        }
    }

    pub fn txn_get_checked(&self, id: TxnId, key: Key) -> Result<Option<Value>, EngineError> {
        let mut txns = self.txns.lock();
        let state = txns.get_mut(&id).ok_or(EngineError::UnknownTxn(id))?;
        if let Some(value) = state.writes.get(&key) {
            return Ok(Some(value.clone()));
        }

        let map = self.map.lock();
        let mut locks = self.locks.lock();
        match locks.get(&key) {
            Some(owner) if *owner != id => Ok(None),
            _ => {
                locks.insert(key, id);
                state.read_locks.insert(key);
                Ok(Some(map.get(&key).cloned().unwrap_or_default()))
            }
        }
    }

    /// Applies `id`'s buffered writes to the committed map and releases its
    /// locks. The transaction no longer exists afterward. Returns `true`
    /// iff `id` was live.
    pub fn txn_commit(&self, id: TxnId) -> bool {
        self.txn_commit_checked(id).is_ok()
    }

    pub fn txn_commit_checked(&self, id: TxnId) -> Result<(), EngineError> {
        let mut txns = self.txns.lock();
        let state = txns.remove(&id).ok_or(EngineError::UnknownTxn(id))?;
        drop(txns);

        {
            let mut map = self.map.lock();
            for (key, value) in state.writes {
                map.insert(key, value);
            }
        }
        let mut locks = self.locks.lock();
        for key in state.read_locks {
            locks.remove(&key);
        }
        Ok(())
    }

    /// Discards `id`'s buffered writes and releases its locks without
    /// touching the committed map. Returns `true` iff `id` was live.
    pub fn txn_abort(&self, id: TxnId) -> bool {
        self.txn_abort_checked(id).is_ok()
    }

    pub fn txn_abort_checked(&self, id: TxnId) -> Result<(), EngineError> {
        let mut txns = self.txns.lock();
        let state = txns.remove(&id).ok_or(EngineError::UnknownTxn(id))?;
        drop(txns);

        let mut locks = self.locks.lock();
        for key in state.read_locks {
            locks.remove(&key);
        }
        Ok(())
    }

    /// Snapshots the current key set for iteration. A second call before
    /// the first is drained resets the cursor from scratch.
    pub fn init_iter(&self) {
        let keys: VecDeque<Key> = self.map.lock().keys().copied().collect();
        *self.iter_cursor.lock() = Some(keys);
    }

    /// Advances the iteration cursor started by [`Engine::init_iter`].
    /// Returns `None` once exhausted, in place of the reference
    /// implementation's `-1` sentinel.
    pub fn next_key(&self) -> Option<Key> {
        self.iter_cursor.lock().as_mut().and_then(|q| q.pop_front())
    }

    /// Redistribution support: drains every resident key/value pair and
    /// resets the map to empty, used by a shard that is handing its data to
    /// its new peers.
    pub fn drain_all(&self) -> Vec<(Key, Value)> {
        let mut map = self.map.lock();
        map.drain().collect()
    }

    pub fn contains_key(&self, key: Key) -> bool {
        self.map.lock().contains_key(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_round_trips() {
        let engine = Engine::new();
        engine.put(1, b"a".to_vec());
        assert_eq!(engine.get(1), Some(b"a".to_vec()));
        assert_eq!(engine.get(2), None);
    }

    #[test]
    fn txn_start_fails_on_live_id() {
        let engine = Engine::new();
        assert!(engine.txn_start(1));
        assert!(!engine.txn_start(1));
    }

    #[test]
    fn txn_put_is_invisible_to_other_txn_until_commit() {
        let engine = Engine::new();
        engine.txn_start(1);
        engine.txn_start(2);
        assert!(engine.txn_put(1, 7, b"v1".to_vec()));
        // A buffered write reserves nothing: txn 2's read sees the
        // committed state (still empty), not a lock conflict.
        assert_eq!(engine.txn_get(2, 7), (true, Value::new()));
        assert_eq!(engine.txn_get(1, 7), (true, b"v1".to_vec()));
        assert!(engine.txn_commit(1));
        assert_eq!(engine.get(7), Some(b"v1".to_vec()));
        assert_eq!(engine.txn_get(2, 7), (true, b"v1".to_vec()));
    }

    #[test]
    fn read_lock_conflict_matches_spec_scenario_three() {
        let engine = Engine::new();
        assert!(engine.txn_start(1));
        assert!(engine.txn_start(2));
        assert_eq!(engine.txn_get(1, 5), (true, Value::new()));
        assert_eq!(engine.txn_get(2, 5), (false, Value::new()));
        assert!(engine.txn_abort(1));
        assert_eq!(engine.txn_get(2, 5), (true, Value::new()));
    }

    #[test]
    fn abort_discards_buffered_writes() {
        let engine = Engine::new();
        engine.txn_start(1);
        engine.txn_put(1, 3, b"v".to_vec());
        assert!(engine.txn_abort(1));
        assert_eq!(engine.get(3), None);
        assert!(!engine.txn_commit(1));
    }

    #[test]
    fn read_reserves_the_key_not_write() {
        let engine = Engine::new();
        engine.txn_start(1);
        engine.txn_start(2);
        // A write alone reserves nothing.
        assert!(engine.txn_put(1, 9, b"v".to_vec()));
        assert_eq!(engine.txn_get(2, 9), (true, Value::new()));
        // The read that just succeeded is what reserves the key.
        assert_eq!(engine.txn_get(1, 9), (true, b"v".to_vec()));
        assert!(engine.txn_start(3));
        assert_eq!(engine.txn_get(3, 9), (false, Value::new()));
    }

    #[test]
    fn unknown_txn_is_reported() {
        let engine = Engine::new();
        assert_eq!(engine.txn_put_checked(99, 1, vec![]), Err(EngineError::UnknownTxn(99)));
        assert_eq!(engine.txn_get_checked(99, 1), Err(EngineError::UnknownTxn(99)));
    }

    #[test]
    fn iteration_snapshots_and_exhausts() {
        let engine = Engine::new();
        engine.put(1, b"a".to_vec());
        engine.put(2, b"b".to_vec());
        engine.init_iter();
        let mut seen = vec![engine.next_key().unwrap(), engine.next_key().unwrap()];
        seen.sort();
        assert_eq!(seen, vec![1, 2]);
        assert_eq!(engine.next_key(), None);
    }

    #[test]
    fn drain_all_empties_the_map() {
        let engine = Engine::new();
        engine.put(1, b"a".to_vec());
        let drained = engine.drain_all();
        assert_eq!(drained, vec![(1, b"a".to_vec())]);
        assert_eq!(engine.get(1), None);
    }
}
