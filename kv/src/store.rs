//! The store engine: the shared authoritative map from key to value record,
//! the in-flight transaction index, and the validation predicate that makes
//! this an optimistic, timestamp-based transactional store.
//!
//! UNLIKE A VERSIONED (MVCC) STORE, there is exactly one live record per key
//! in `master` at any time — no historical versions are kept. Instead every
//! record carries `last_written`/`last_read` timestamps, and a transaction's
//! entire read set and write set are checked against those timestamps in one
//! shot at commit:
//!
//! Time
//! 5                        commit(T2) -> conflict on b (T1 wrote b@4 >= T2.start=2)
//! 4    write(b)@T1
//! 3
//! 2  begin(T2, start=2), read(b)
//! 1  begin(T1, start=1)
//!    T1          T2                Transactions
//!
//! * T1 writes b at tick 4 and commits.
//! * T2 started at tick 2 and read b before T1's write was visible to it.
//! * When T2 commits, `master[b].last_written = 4 >= T2.start_time = 2`, so T2
//!   is rolled back and must retry — this is exactly testable property 4 in
//!   the engine's test suite (`write_invalidates_earlier_read`, below).
//!
//! `begin` and `commit` are mutually exclusive with each other (and with
//! themselves, across transactions) behind a single engine-wide mutex, and
//! each captures its timestamp from the same `Clock` while holding it. That
//! is what makes the validation predicate correct: two events that must be
//! ordered can never land on the same tick.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::Mutex;

use crate::clock::{AtomicClock, Clock};
use crate::config::ReplayConfig;
use crate::error::{RetryReason, StoreError};
use crate::txn::{Operation, TransactionContext};
use crate::value::ValueRecord;

/// The lock-guarded shared state: the master map and the live-transaction
/// index. A transaction id is live iff it has an entry here — the distilled
/// source's separate `by_id` and `in_flight` indices collapse into this one
/// map, since they were always the same set viewed two ways.
struct EngineState<K, V> {
    master: HashMap<K, ValueRecord<V>>,
    by_id: HashMap<i64, TransactionContext<K, V>>,
}

impl<K, V> EngineState<K, V> {
    fn new() -> Self {
        Self { master: HashMap::new(), by_id: HashMap::new() }
    }
}

/// An in-memory, optimistic, timestamp-based transactional key-value engine.
///
/// Generic over the key type `K` (hashable, equatable, cheaply cloned) and
/// the value type `V` (cloned into snapshots and into the op log). The
/// absence of a value — a missing key, or a deleted one — is `None`
/// throughout; there is no separate tombstone type.
pub struct StoreEngine<K, V, C: Clock = AtomicClock> {
    state: Mutex<EngineState<K, V>>,
    clock: C,
    retry_base_ms: u64,
    retry_per_conflict_ms: u64,
}

impl<K, V> StoreEngine<K, V, AtomicClock>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// An empty engine with the default atomic-counter clock and the default
    /// retry-interval tuning (100ms base, 50ms per conflicting key).
    pub fn new() -> Self {
        Self::with_clock(AtomicClock::new())
    }
}

impl<K, V> Default for StoreEngine<K, V, AtomicClock>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, C> StoreEngine<K, V, C>
where
    K: Eq + Hash + Clone,
    V: Clone,
    C: Clock,
{
    /// An empty engine with an explicit clock — e.g. a deterministic stub in
    /// tests that need to pin down a specific interleaving.
    pub fn with_clock(clock: C) -> Self {
        Self { state: Mutex::new(EngineState::new()), clock, retry_base_ms: 100, retry_per_conflict_ms: 50 }
    }

    /// An empty engine with an explicit clock and the retry-interval tuning
    /// taken from `config` (`max_attempts` and `retry_jitter_ms` are the
    /// replay coordinator's concern, not the engine's, and are ignored here).
    pub fn with_clock_and_config(clock: C, config: &ReplayConfig) -> Self {
        Self {
            state: Mutex::new(EngineState::new()),
            clock,
            retry_base_ms: config.retry_base_ms,
            retry_per_conflict_ms: config.retry_per_conflict_ms,
        }
    }

    /// Registers a new transaction context, snapshotting the current master
    /// at the tick captured for `start_time`.
    pub fn begin(&self, id: i64) -> Result<(), StoreError> {
        if id < 0 {
            return Err(StoreError::InvalidTransaction { id });
        }

        let mut state = self.state.lock().expect("engine lock poisoned");
        if state.by_id.contains_key(&id) {
            return Err(StoreError::InvalidTransaction { id });
        }

        let start_time = self.clock.tick();
        let snapshot = state.master.clone();
        state.by_id.insert(id, TransactionContext::new(id, start_time, snapshot));
        log::trace!("txn {id} began at tick {start_time}");
        Ok(())
    }

    /// Reads `key` under transaction `id`. Appends `READ(key, now)` to the op
    /// log; if the snapshot has no entry for `key` yet, installs an absent
    /// placeholder so commit-time reconciliation has somewhere to look.
    pub fn read(&self, key: &K, id: i64) -> Result<Option<V>, StoreError> {
        let mut state = self.state.lock().expect("engine lock poisoned");
        let now = self.clock.tick();
        let txn = state.by_id.get_mut(&id).ok_or(StoreError::NoSuchTransaction { id })?;

        let value = match txn.snapshot_get(key) {
            Some(record) => record.value().cloned(),
            None => {
                txn.snapshot_insert(key.clone(), ValueRecord::new(None, None, Some(now)));
                None
            }
        };
        txn.record_read(key.clone(), now);
        Ok(value)
    }

    /// Writes `value` to `key` under transaction `id`.
    pub fn write(&self, key: K, value: V, id: i64) -> Result<(), StoreError> {
        self.write_inner(key, Some(value), id)
    }

    /// Deletes `key` under transaction `id`. Modeled as `write(key, None,
    /// id)`: it follows the exact same op-log and snapshot path as an
    /// ordinary write, so commit-time application needs no separate delete
    /// case.
    pub fn remove(&self, key: K, id: i64) -> Result<(), StoreError> {
        self.write_inner(key, None, id)
    }

    fn write_inner(&self, key: K, value: Option<V>, id: i64) -> Result<(), StoreError> {
        let mut state = self.state.lock().expect("engine lock poisoned");
        let now = self.clock.tick();
        let txn = state.by_id.get_mut(&id).ok_or(StoreError::NoSuchTransaction { id })?;

        txn.snapshot_insert(key.clone(), ValueRecord::new(value.clone(), None, None));
        txn.record_write(key, value, now);
        Ok(())
    }

    /// Validates `id`'s op log against `master`. On success, applies it and
    /// removes the transaction from the index. On conflict, removes the
    /// transaction from the index (no master mutation) and signals
    /// `RetryLater`.
    pub fn commit(&self, id: i64) -> Result<(), StoreError> {
        let mut state = self.state.lock().expect("engine lock poisoned");
        let txn = state.by_id.get(&id).ok_or(StoreError::NoSuchTransaction { id })?;

        if let Some(conflicts) = conflicting_key_count(&state.master, txn) {
            state.by_id.remove(&id);
            log::debug!("txn {id} aborted: {conflicts} conflicting key(s)");
            return Err(StoreError::RetryLater {
                wait_ms: self.retry_base_ms + self.retry_per_conflict_ms * conflicts as u64,
                reason: RetryReason::ConflictingKeys(conflicts),
            });
        }

        let commit_time = self.clock.tick();
        let txn = state.by_id.remove(&id).expect("presence checked above, under the same lock");
        apply(&mut state.master, txn.op_log(), commit_time);
        log::trace!("txn {id} committed at tick {commit_time}");
        Ok(())
    }
}

/// The validation predicate: a transaction must roll back iff any key in its
/// op log has `master[key].last_written` defined and `>= txn.start_time()`.
/// Returns the number of distinct conflicting keys (feeds the wait-interval
/// formula), or `None` if the transaction may commit.
fn conflicting_key_count<K: Eq + Hash + Clone, V: Clone>(
    master: &HashMap<K, ValueRecord<V>>,
    txn: &TransactionContext<K, V>,
) -> Option<usize> {
    let mut seen = HashSet::new();
    let count = txn
        .op_log()
        .iter()
        .map(Operation::key)
        .filter(|key| seen.insert(*key))
        .filter(|key| {
            master.get(*key).and_then(ValueRecord::last_written).is_some_and(|ts| ts >= txn.start_time())
        })
        .count();

    (count > 0).then_some(count)
}

/// Applies a validated op log to `master` in order, as described in §4.1:
/// writes set `value`/`last_written`, preserving `last_read`; reads set
/// `last_read` only, preserving `value`/`last_written`, inserting a
/// read-only placeholder record if the key was never written.
fn apply<K: Eq + Hash + Clone, V: Clone>(
    master: &mut HashMap<K, ValueRecord<V>>,
    op_log: &[Operation<K, V>],
    commit_time: u64,
) {
    for op in op_log {
        match op {
            Operation::Write { key, value, .. } => {
                master
                    .entry(key.clone())
                    .and_modify(|record| {
                        *record = ValueRecord::new(value.clone(), Some(commit_time), record.last_read());
                    })
                    .or_insert_with(|| ValueRecord::new(value.clone(), Some(commit_time), None));
            }
            Operation::Read { key, .. } => {
                master
                    .entry(key.clone())
                    .and_modify(|record| {
                        *record =
                            ValueRecord::new(record.value().cloned(), record.last_written(), Some(commit_time));
                    })
                    .or_insert_with(|| ValueRecord::new(None, None, Some(commit_time)));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> StoreEngine<String, i64> {
        StoreEngine::new()
    }

    #[test]
    fn write_then_read() {
        let s = engine();
        s.begin(1).unwrap();
        s.write("k".into(), 42, 1).unwrap();
        s.commit(1).unwrap();

        s.begin(2).unwrap();
        assert_eq!(s.read(&"k".into(), 2).unwrap(), Some(42));
        s.commit(2).unwrap();
    }

    #[test]
    fn overwrite_yields_latest_value() {
        let s = engine();
        s.begin(1).unwrap();
        s.write("x".into(), 1, 1).unwrap();
        s.commit(1).unwrap();

        s.begin(2).unwrap();
        s.write("x".into(), 2, 2).unwrap();
        s.commit(2).unwrap();

        s.begin(3).unwrap();
        assert_eq!(s.read(&"x".into(), 3).unwrap(), Some(2));
        s.commit(3).unwrap();
    }

    #[test]
    fn disjoint_key_transactions_both_commit() {
        let s = engine();
        s.begin(1).unwrap();
        s.begin(2).unwrap();
        s.write("a".into(), 1, 1).unwrap();
        s.write("b".into(), 2, 2).unwrap();
        s.commit(1).unwrap();
        s.commit(2).unwrap();

        s.begin(3).unwrap();
        assert_eq!(s.read(&"a".into(), 3).unwrap(), Some(1));
        assert_eq!(s.read(&"b".into(), 3).unwrap(), Some(2));
        s.commit(3).unwrap();
    }

    #[test]
    fn write_invalidates_earlier_read() {
        let s = engine();
        s.begin(1).unwrap();
        s.write("k".into(), 55, 1).unwrap();
        s.commit(1).unwrap();

        s.begin(2).unwrap();
        s.read(&"k".into(), 2).unwrap();

        s.begin(3).unwrap();
        s.write("k".into(), 56, 3).unwrap();
        s.commit(3).unwrap();

        match s.commit(2) {
            Err(StoreError::RetryLater { reason: RetryReason::ConflictingKeys(n), .. }) => assert_eq!(n, 1),
            other => panic!("expected RetryLater, got {other:?}"),
        }
    }

    #[test]
    fn last_written_is_monotonic_across_commits() {
        // There is no public accessor for master[k].last_written, so the only
        // externally observable evidence that a commit actually advanced it
        // is that a transaction which began before that commit, and touched
        // the same key, is later invalidated. Repeating this across several
        // commits checks that every single one of them bumps last_written,
        // not just the first.
        let s = engine();
        s.begin(0).unwrap();
        s.write("k".into(), 0, 0).unwrap();
        s.commit(0).unwrap();

        for id in 1..5 {
            let witness = 1000 + id;
            s.begin(witness).unwrap();
            s.read(&"k".into(), witness).unwrap();

            s.begin(id).unwrap();
            s.write("k".into(), id, id).unwrap();
            s.commit(id).unwrap();

            assert!(s.commit(witness).unwrap_err().is_retryable());
        }
    }

    #[test]
    fn write_only_commit_preserves_last_read() {
        let s = engine();
        s.begin(1).unwrap();
        s.read(&"k".into(), 1).unwrap();
        s.commit(1).unwrap();

        s.begin(2).unwrap();
        s.write("k".into(), 9, 2).unwrap();
        s.commit(2).unwrap();

        // last_read from txn 1's read is preserved by txn 2's write-only
        // commit; verify indirectly by reading with a fresh transaction
        // whose start_time is after both, which must see the write and must
        // not itself conflict (last_read never feeds the validation
        // predicate).
        s.begin(3).unwrap();
        assert_eq!(s.read(&"k".into(), 3).unwrap(), Some(9));
        s.commit(3).unwrap();
    }

    #[test]
    fn begin_rejects_negative_id() {
        let s = engine();
        assert_eq!(s.begin(-1), Err(StoreError::InvalidTransaction { id: -1 }));
    }

    #[test]
    fn double_begin_rejected_first_stays_live() {
        let s = engine();
        s.begin(1).unwrap();
        assert_eq!(s.begin(1), Err(StoreError::InvalidTransaction { id: 1 }));

        // The first context is still live: operations against it succeed.
        s.write("k".into(), 1, 1).unwrap();
        s.commit(1).unwrap();
    }

    #[test]
    fn double_commit_rejected() {
        let s = engine();
        s.begin(1).unwrap();
        s.commit(1).unwrap();
        assert_eq!(s.commit(1), Err(StoreError::NoSuchTransaction { id: 1 }));
    }

    #[test]
    fn operations_on_unknown_id_fail() {
        let s = engine();
        assert_eq!(s.read(&"k".into(), 7), Err(StoreError::NoSuchTransaction { id: 7 }));
        assert_eq!(s.write("k".into(), 1, 7), Err(StoreError::NoSuchTransaction { id: 7 }));
        assert_eq!(s.commit(7), Err(StoreError::NoSuchTransaction { id: 7 }));
    }

    #[test]
    fn empty_op_log_commits_trivially() {
        let s = engine();
        s.begin(1).unwrap();
        s.commit(1).unwrap();
    }

    #[test]
    fn remove_is_a_write_of_the_absence_marker() {
        let s = engine();
        s.begin(1).unwrap();
        s.write("k".into(), 1, 1).unwrap();
        s.commit(1).unwrap();

        s.begin(2).unwrap();
        s.remove("k".into(), 2).unwrap();
        s.commit(2).unwrap();

        s.begin(3).unwrap();
        assert_eq!(s.read(&"k".into(), 3).unwrap(), None);
        s.commit(3).unwrap();
    }

    #[test]
    fn concurrent_increments_serialized_by_hand() {
        // S3 from the spec: key1 starts at 5; two concurrent readers compute
        // conflicting increments; the second to commit must retry.
        let s = engine();
        s.begin(0).unwrap();
        s.write("key1".into(), 5, 0).unwrap();
        s.commit(0).unwrap();

        s.begin(2).unwrap();
        s.begin(3).unwrap();
        let r2 = s.read(&"key1".into(), 2).unwrap().unwrap();
        s.write("key1".into(), r2 + 8, 2).unwrap();
        let r3 = s.read(&"key1".into(), 3).unwrap().unwrap();
        s.write("key1".into(), r3 + 13, 3).unwrap();

        s.commit(2).unwrap();
        assert!(s.commit(3).unwrap_err().is_retryable());

        // Replaying the second increment picks up where it left off.
        s.begin(4).unwrap();
        let r4 = s.read(&"key1".into(), 4).unwrap().unwrap();
        s.write("key1".into(), r4 + 13, 4).unwrap();
        s.commit(4).unwrap();

        s.begin(5).unwrap();
        assert_eq!(s.read(&"key1".into(), 5).unwrap(), Some(26));
        s.commit(5).unwrap();
    }
}
