//! Error taxonomy surfaced by the store engine and the replay coordinator.
//!
//! `RetryLater` is the one recoverable kind: the engine has already torn the
//! aborted transaction down (removed it from its index) before raising it, so
//! a caller that catches and ignores it leaks nothing. Every other kind is
//! fatal to the operation that raised it.

use thiserror::Error;

/// Why a commit was asked to retry. Carried alongside `wait_ms` mostly for
/// diagnostics; the replay coordinator doesn't need to inspect it to do its
/// job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RetryReason {
    /// Validation found this many keys whose `last_written` raced the
    /// transaction's start time.
    ConflictingKeys(usize),
    /// A caller-supplied explanation, for engines that reject for reasons
    /// other than the timestamp predicate (e.g. a pessimistic lock-set
    /// variant failing to acquire a key).
    Message(String),
}

/// Errors raised by `StoreEngine` operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("transaction {id} is invalid: negative id, or already live")]
    InvalidTransaction { id: i64 },

    #[error("transaction {id} is not live")]
    NoSuchTransaction { id: i64 },

    #[error("commit must retry after {wait_ms}ms ({reason:?})")]
    RetryLater { wait_ms: u64, reason: RetryReason },

    /// Corrupted engine state: a live transaction referenced a key absent
    /// from its own snapshot. Rust's exhaustive `match` over `Operation`
    /// rules out the distilled source's "unknown op variant" failure mode at
    /// compile time, so this is the one invariant violation that can still
    /// occur at runtime, and only as a defensive backstop.
    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),

    /// Reserved for engine variants that do not support key removal.
    /// The shipped engine always supports it (`remove` is sugar for a write
    /// of the absence marker), so this is never raised today.
    #[error("not implemented")]
    NotImplemented,
}

impl StoreError {
    /// `true` only for the recoverable variant.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::RetryLater { .. })
    }
}

/// Errors raised by the replay coordinator.
#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("gave up after {attempts} attempt(s)")]
    GaveUp { attempts: u32 },

    #[error("replay cancelled")]
    Cancelled,

    #[error(transparent)]
    Store(StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_retry_later_is_retryable() {
        assert!(StoreError::RetryLater { wait_ms: 100, reason: RetryReason::ConflictingKeys(1) }
            .is_retryable());
        assert!(!StoreError::InvalidTransaction { id: 1 }.is_retryable());
        assert!(!StoreError::NoSuchTransaction { id: 1 }.is_retryable());
        assert!(!StoreError::NotImplemented.is_retryable());
    }
}
