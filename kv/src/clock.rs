//! Monotonic tick source used to stamp `begin`/`commit` events.
//!
//! The distilled engine this crate is modeled on used wall-clock milliseconds
//! and inserted small sleep spacers at commit boundaries so that two events
//! requiring ordering would never land on the same millisecond. An
//! engine-wide tick counter, advanced only while the caller holds the
//! engine's lock, makes the spacer unnecessary: two events that must be
//! ordered can never observe the same tick, because the counter only moves
//! forward one critical section at a time.

use std::sync::atomic::{AtomicU64, Ordering};

/// A source of strictly increasing, non-negative timestamps.
///
/// Implementations must never return the same value twice, and must never
/// return a value lower than one they've already returned.
pub trait Clock: Send + Sync {
    fn tick(&self) -> u64;
}

/// The default `Clock`: an atomic counter starting at 1. Tick `0` is never
/// handed out, so `Option<u64>` timestamps can use `None` unambiguously for
/// "never written" / "never read" without reserving a sentinel value.
#[derive(Debug)]
pub struct AtomicClock {
    next: AtomicU64,
}

impl AtomicClock {
    pub fn new() -> Self {
        Self { next: AtomicU64::new(1) }
    }
}

impl Default for AtomicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for AtomicClock {
    fn tick(&self) -> u64 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }
}
