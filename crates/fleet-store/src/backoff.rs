// SPDX-License-Identifier: Apache-2.0
//! Capped exponential backoff for retrying transient store errors (§7:
//! 3 attempts, 100ms base).

use crate::error::StoreError;
use std::future::Future;
use std::time::Duration;

/// Retry `attempt` up to `max_attempts` times with a doubling delay
/// starting at `base_delay`, mapping an exhausted budget to
/// `StoreError::RetriesExhausted`.
pub async fn retry<T, F, Fut>(
    operation: &str,
    max_attempts: u32,
    base_delay: Duration,
    mut attempt: F,
) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let mut delay = base_delay;
    let mut last_err = None;
    for try_num in 0..max_attempts {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                tracing::warn!(operation, try_num, error = %err, "store operation failed, retrying");
                last_err = Some(err);
                if try_num + 1 < max_attempts {
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }
        }
    }
    Err(StoreError::RetriesExhausted(format!(
        "{operation}: {}",
        last_err.map_or_else(|| "no attempts made".to_string(), |e| e.to_string())
    )))
}

/// The default retry budget used throughout the instruction log: 3
/// attempts, 100ms base delay.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Default base delay for [`retry`].
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(100);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn succeeds_without_retrying_on_first_try() {
        let calls = AtomicU32::new(0);
        let result = retry("op", 3, Duration::from_millis(1), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, StoreError>(42)
        })
        .await
        .unwrap();
        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_the_budget_and_surfaces_a_permanent_error() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry("op", 3, Duration::from_millis(1), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::InvalidEncoding("boom".to_string()))
        })
        .await;
        assert!(matches!(result, Err(StoreError::RetriesExhausted(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
