//! Replay coordinator: turns a closure that opens, drives, and commits its
//! own transaction into a commit-or-give-up outcome, retrying while the
//! closure raises `StoreError::RetryLater`.
//!
//! The coordinator is agnostic to what the closure does with the store — it
//! only recognizes `RetryLater` and the attempt budget. The closure owns
//! allocating a fresh transaction id on every attempt; handing it the same id
//! twice would make its second `begin` fail with `InvalidTransaction` before
//! the retry logic here ever saw it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use rand::Rng;

use crate::config::ReplayConfig;
use crate::error::{ReplayError, StoreError};

/// Runs `closure(args)` until it returns `Ok`, or gives up once `RetryLater`
/// has been observed more than `config.max_attempts` times.
pub fn submit_replayable<A>(
    closure: impl FnMut(&A) -> Result<(), StoreError>,
    args: &A,
    config: &ReplayConfig,
) -> Result<(), ReplayError> {
    submit_replayable_cancellable(closure, args, config, None)
}

/// Like [`submit_replayable`], but checks `cancel` before each attempt and
/// before each retry sleep, returning `ReplayError::Cancelled` if it is set.
/// `std::thread::sleep` cannot itself be interrupted in safe Rust, so
/// cancellation is only observed at these check points rather than mid-sleep.
pub fn submit_replayable_cancellable<A>(
    mut closure: impl FnMut(&A) -> Result<(), StoreError>,
    args: &A,
    config: &ReplayConfig,
    cancel: Option<&AtomicBool>,
) -> Result<(), ReplayError> {
    let cancelled = |cancel: Option<&AtomicBool>| cancel.is_some_and(|c| c.load(Ordering::Relaxed));

    let mut attempts = 0u32;
    loop {
        if cancelled(cancel) {
            return Err(ReplayError::Cancelled);
        }

        match closure(args) {
            Ok(()) => return Ok(()),
            Err(StoreError::RetryLater { wait_ms, .. }) => {
                attempts += 1;
                if attempts > config.max_attempts {
                    log::warn!("replay gave up after {attempts} attempt(s)");
                    return Err(ReplayError::GaveUp { attempts });
                }
                log::debug!("replay attempt {attempts} retrying after {wait_ms}ms");

                if cancelled(cancel) {
                    return Err(ReplayError::Cancelled);
                }
                thread::sleep(Duration::from_millis(wait_ms + jitter(config.retry_jitter_ms)));
            }
            Err(other) => return Err(ReplayError::Store(other)),
        }
    }
}

fn jitter(max_ms: u64) -> u64 {
    if max_ms == 0 {
        0
    } else {
        rand::thread_rng().gen_range(0..=max_ms)
    }
}
