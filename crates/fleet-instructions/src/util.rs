// SPDX-License-Identifier: Apache-2.0
//! Small shared helpers.

use std::time::{SystemTime, UNIX_EPOCH};

/// Monotonic-enough wall clock seconds, used for `Instruction::timestamp`
/// and sync-command timestamps. Never panics: a clock before the epoch
/// (unreachable in practice) yields `0`.
pub fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
