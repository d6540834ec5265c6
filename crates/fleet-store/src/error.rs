// SPDX-License-Identifier: Apache-2.0
//! Error taxonomy for the store adapter.

use thiserror::Error;

/// Errors surfaced by `ClusterStore` implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A transient failure (connection drop, timeout) that was retried and
    /// exhausted its backoff budget, or that the caller chose not to
    /// retry. Per §7, exceeding the retry budget turns a transient error
    /// into this permanent one.
    #[error("store operation failed after exhausting retries: {0}")]
    RetriesExhausted(String),
    /// The underlying Redis client returned an error.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    /// A value stored under a key couldn't be interpreted as UTF-8 text.
    #[error("non-utf8 value for key {0:?}")]
    InvalidEncoding(String),
    /// Attempted to subscribe to a channel that has no backing connection
    /// (e.g. the in-memory fake's subscriber task already exited).
    #[error("subscription to channel {0:?} is closed")]
    SubscriptionClosed(String),
}
