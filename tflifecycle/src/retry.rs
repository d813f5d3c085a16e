//! Bounded-duration polling with classified failures
//!
//! An operation passed to [`retry`] reports each attempt as success,
//! [`RetryError::Retryable`] or [`RetryError::NonRetryable`]. Retryable
//! failures are re-attempted on a fixed polling interval until the deadline;
//! the last retryable failure is then surfaced as a terminal
//! [`LifecycleError::Timeout`].

use crate::context::Context;
use crate::error::{LifecycleError, RemoteError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Disposition of a failed attempt
#[derive(Debug)]
pub enum RetryError {
    Retryable(LifecycleError),
    NonRetryable(LifecycleError),
}

impl RetryError {
    pub fn retryable(err: impl Into<LifecycleError>) -> Self {
        RetryError::Retryable(err.into())
    }

    pub fn non_retryable(err: impl Into<LifecycleError>) -> Self {
        RetryError::NonRetryable(err.into())
    }
}

/// Per-attempt view of the retry context handed to the operation
#[derive(Debug, Clone, Copy)]
pub struct Attempt {
    pub number: u32,
    pub deadline: Instant,
}

impl Attempt {
    /// True for the attempt made at the deadline; no further attempt follows it.
    pub fn is_final(&self) -> bool {
        Instant::now() >= self.deadline
    }
}

/// Default durations for the lifecycle's polling loops
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timeouts {
    /// Read-after-write visibility
    pub read: Duration,
    /// Delete confirmation
    pub delete: Duration,
    /// Data-source lookups waiting for an object to become visible
    pub lookup: Duration,
    /// Version-conflict retries on update
    pub update_attempts: u32,
    /// Fixed polling tick
    pub poll_interval: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            read: Duration::from_secs(60),
            delete: Duration::from_secs(30),
            lookup: Duration::from_secs(15),
            update_attempts: 5,
            poll_interval: Duration::from_secs(1),
        }
    }
}

/// Re-invoke `op` until it succeeds, fails terminally, or `timeout` (capped by
/// the context deadline) elapses. At least one attempt is always made, and a
/// last attempt is made at the deadline itself.
pub async fn retry<T, F, Fut>(
    ctx: &Context,
    timeout: Duration,
    interval: Duration,
    mut op: F,
) -> Result<T>
where
    F: FnMut(Attempt) -> Fut,
    Fut: Future<Output = std::result::Result<T, RetryError>>,
{
    let start = Instant::now();
    let deadline = ctx.deadline_within(timeout);
    let mut number = 0;

    loop {
        number += 1;
        let attempt = Attempt { number, deadline };

        let last = match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(RetryError::NonRetryable(err)) => return Err(err),
            Err(RetryError::Retryable(err)) => err,
        };

        tracing::debug!("Attempt {} failed, retrying: {}", number, last);

        if ctx.is_cancelled() {
            return Err(LifecycleError::Cancelled);
        }

        let now = Instant::now();
        if now >= deadline {
            let elapsed = start.elapsed();
            tracing::warn!("Giving up after {} attempts ({:?}): {}", number, elapsed, last);
            return Err(LifecycleError::Timeout {
                elapsed,
                last: Box::new(last),
            });
        }

        tokio::time::sleep(interval.min(deadline - now)).await;
    }
}

/// Re-run a mutation while `predicate` classifies its failure as transient,
/// up to `max_attempts` times. Used for optimistic-concurrency updates where
/// each attempt re-reads the current version before writing. Cancellation
/// and the context deadline stop the loop between attempts.
pub async fn retry_when<T, P, F, Fut>(
    ctx: &Context,
    predicate: P,
    max_attempts: u32,
    interval: Duration,
    mut op: F,
) -> Result<T>
where
    P: Fn(&RemoteError) -> bool,
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, RemoteError>>,
{
    let start = Instant::now();
    let mut attempt = 0;
    loop {
        attempt += 1;
        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(err) if predicate(&err) && attempt < max_attempts => err,
            Err(err) => return Err(LifecycleError::Transport(err)),
        };

        if ctx.is_cancelled() {
            return Err(LifecycleError::Cancelled);
        }
        let mut pause = interval;
        if let Some(deadline) = ctx.deadline() {
            let now = Instant::now();
            if now >= deadline {
                return Err(LifecycleError::Timeout {
                    elapsed: start.elapsed(),
                    last: Box::new(LifecycleError::Transport(err)),
                });
            }
            pause = pause.min(deadline - now);
        }

        tracing::debug!(
            "Retrying after transient failure (attempt {}): {}",
            attempt,
            err
        );
        tokio::time::sleep(pause).await;
    }
}

/// Classification for a read issued right after a create or update:
/// a 404 is read-your-write lag and is retried.
pub fn classify_read_after_write(err: RemoteError) -> RetryError {
    if err.is_not_found() {
        RetryError::Retryable(LifecycleError::Transport(err))
    } else {
        RetryError::NonRetryable(LifecycleError::Transport(err))
    }
}
