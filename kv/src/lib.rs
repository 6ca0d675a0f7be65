//! `kv` is an in-memory, optimistic, timestamp-based transactional
//! key-value engine.
//!
//! Many clients may issue interleaved `begin`/`read`/`write`/`commit`
//! operations against a shared key-space; conflicts are detected at commit
//! time by comparing a transaction's start timestamp against the
//! `last_written` timestamp of every key it touched, and surfaced to the
//! caller as a retry signal rather than resolved by blocking. [Author
//! fengyang]
//!
//! ## Getting started
//!
//! ```
//! use kv::store::StoreEngine;
//!
//! let store: StoreEngine<String, i64> = StoreEngine::new();
//!
//! store.begin(1).unwrap();
//! store.write("meaning".to_string(), 42, 1).unwrap();
//! store.commit(1).unwrap();
//!
//! store.begin(2).unwrap();
//! assert_eq!(store.read(&"meaning".to_string(), 2).unwrap(), Some(42));
//! store.commit(2).unwrap();
//! ```
//!
//! Transactions that lose a race are asked to retry rather than blocked; the
//! [`replay`] module turns a retryable closure into a commit-or-give-up
//! outcome:
//!
//! ```
//! use std::sync::atomic::{AtomicI64, Ordering};
//! use kv::config::ReplayConfig;
//! use kv::replay::submit_replayable;
//! use kv::store::StoreEngine;
//!
//! let store = StoreEngine::<String, i64>::new();
//! store.begin(0).unwrap();
//! store.write("k".to_string(), 0, 0).unwrap();
//! store.commit(0).unwrap();
//!
//! let next_id = AtomicI64::new(1);
//! submit_replayable(
//!     |store: &StoreEngine<String, i64>| {
//!         let id = next_id.fetch_add(1, Ordering::SeqCst);
//!         store.begin(id)?;
//!         let current = store.read(&"k".to_string(), id)?.unwrap_or(0);
//!         store.write("k".to_string(), current + 1, id)?;
//!         store.commit(id)
//!     },
//!     &store,
//!     &ReplayConfig::default(),
//! )
//! .unwrap();
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod replay;
pub mod store;
pub mod txn;
pub mod value;

pub use clock::{AtomicClock, Clock};
pub use config::ReplayConfig;
pub use error::{ReplayError, RetryReason, StoreError};
pub use replay::{submit_replayable, submit_replayable_cancellable};
pub use store::StoreEngine;
pub use txn::{Operation, TransactionContext};
pub use value::ValueRecord;
