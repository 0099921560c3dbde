//! Bounded retry with per-attempt acceptance.

use std::fmt::Display;
use std::future::Future;

use tracing::warn;

/// Every attempt failed.
#[derive(Debug)]
pub struct RetryExhausted<E> {
    pub attempts: u32,
    /// One error per attempt, in order.
    pub errors: Vec<E>,
}

/// Run `operation` up to `max_attempts` times.
///
/// Each produced value goes through `accept`; the first accepted value is
/// returned and no further attempts are made. Operation failures and
/// rejections both consume an attempt.
pub async fn retry<T, U, E, F, Fut, A>(
    max_attempts: u32,
    mut operation: F,
    mut accept: A,
) -> Result<U, RetryExhausted<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    A: FnMut(T) -> Result<U, E>,
    E: Display,
{
    let mut errors = Vec::new();

    for attempt in 1..=max_attempts {
        match operation(attempt).await.and_then(&mut accept) {
            Ok(value) => return Ok(value),
            Err(e) => {
                warn!(attempt, max_attempts, error = %e, "Attempt failed");
                errors.push(e);
            }
        }
    }

    Err(RetryExhausted {
        attempts: max_attempts,
        errors,
    })
}
