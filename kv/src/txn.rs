//! Transaction context: the per-in-flight-transaction state threaded through
//! `read`/`write`/`commit` — id, start time, private snapshot, and op log.

use std::collections::HashMap;
use std::hash::Hash;

use crate::value::ValueRecord;

/// An operation appended to a transaction's op log as it runs, replayed
/// against `master` in order at commit time.
#[derive(Clone, Debug)]
pub enum Operation<K, V> {
    Read { key: K, ts: u64 },
    Write { key: K, value: Option<V>, ts: u64 },
}

impl<K, V> Operation<K, V> {
    pub fn key(&self) -> &K {
        match self {
            Operation::Read { key, .. } => key,
            Operation::Write { key, .. } => key,
        }
    }

    pub fn ts(&self) -> u64 {
        match self {
            Operation::Read { ts, .. } => *ts,
            Operation::Write { ts, .. } => *ts,
        }
    }
}

/// Per-transaction state. Owned by the engine's transaction index for the
/// lifetime of the transaction; destroyed (by value) on commit or abort.
///
/// Not shared across threads: the engine exposes it only indirectly, through
/// operations keyed by transaction id.
pub struct TransactionContext<K, V> {
    id: i64,
    start_time: u64,
    snapshot: HashMap<K, ValueRecord<V>>,
    op_log: Vec<Operation<K, V>>,
}

impl<K: Eq + Hash + Clone, V: Clone> TransactionContext<K, V> {
    pub(crate) fn new(id: i64, start_time: u64, snapshot: HashMap<K, ValueRecord<V>>) -> Self {
        Self { id, start_time, snapshot, op_log: Vec::new() }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn start_time(&self) -> u64 {
        self.start_time
    }

    pub fn op_log(&self) -> &[Operation<K, V>] {
        &self.op_log
    }

    pub(crate) fn snapshot_get(&self, key: &K) -> Option<&ValueRecord<V>> {
        self.snapshot.get(key)
    }

    pub(crate) fn snapshot_insert(&mut self, key: K, record: ValueRecord<V>) {
        self.snapshot.insert(key, record);
    }

    pub(crate) fn record_read(&mut self, key: K, ts: u64) {
        self.op_log.push(Operation::Read { key, ts });
    }

    pub(crate) fn record_write(&mut self, key: K, value: Option<V>, ts: u64) {
        self.op_log.push(Operation::Write { key, value, ts });
    }
}
