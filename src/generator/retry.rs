//! Retry policy for generator requests

use crate::error::HydeError;
use anyhow::{Context, Result};
use std::future::Future;
use std::time::Duration;

/// How often a failed generation request is repeated and how long to wait
/// between attempts.
///
/// `max_attempts == None` retries until the request succeeds. That suits
/// long offline batch runs against rate-limited APIs; interactive callers
/// should use `fail_fast` or `bounded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: Option<u32>,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn fail_fast() -> Self {
        Self {
            max_attempts: Some(1),
            backoff: Duration::ZERO,
        }
    }

    pub fn wait_till_success(backoff: Duration) -> Self {
        Self {
            max_attempts: None,
            backoff,
        }
    }

    pub fn bounded(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: Some(max_attempts.max(1)),
            backoff,
        }
    }

    /// Runs `op` until it succeeds or the attempt budget is spent.
    ///
    /// The final error keeps the last cause and carries
    /// `HydeError::GenerationFailure` as context.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    let exhausted = self.max_attempts.is_some_and(|max| attempt >= max);
                    if exhausted {
                        return Err(err)
                            .context(HydeError::GenerationFailure { attempts: attempt });
                    }
                    tracing::warn!(
                        request = label,
                        attempt,
                        backoff_ms = self.backoff.as_millis() as u64,
                        error = %err,
                        "Generation request failed, retrying"
                    );
                    if !self.backoff.is_zero() {
                        tokio::time::sleep(self.backoff).await;
                    }
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fail_fast()
    }
}
