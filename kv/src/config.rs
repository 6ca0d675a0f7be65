//! Replay coordinator configuration: the retry budget and wait-interval
//! tuning named in the external-interfaces configuration surface.

use serde_derive::{Deserialize, Serialize};

/// Tunables for the replay coordinator and the engine's retry-interval
/// formula. There is no file or environment loader here — an embedding CLI
/// or server would be the place to load this from a config file, the way a
/// front-end loads its own settings; this crate has no process lifecycle of
/// its own. `Serialize`/`Deserialize` are derived so that such an embedder
/// can still fold it into its own config file format directly.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Bounds the retry loop. `RetryLater` observed more than this many
    /// times raises `ReplayError::GaveUp`.
    pub max_attempts: u32,

    /// Base wait, in milliseconds, before a retried attempt.
    pub retry_base_ms: u64,

    /// Additional wait, in milliseconds, added per conflicting key found at
    /// the aborted commit.
    pub retry_per_conflict_ms: u64,

    /// Upper bound, in milliseconds, of the random jitter added on top of
    /// the computed wait to reduce thundering-herd retries. Zero disables
    /// jitter.
    pub retry_jitter_ms: u64,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self { max_attempts: 100, retry_base_ms: 100, retry_per_conflict_ms: 50, retry_jitter_ms: 0 }
    }
}
