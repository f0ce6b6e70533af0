use std::{future::Future, time::Duration};

use tokio::time::sleep;
use tracing::*;

use crate::{cfg::RetryConfig, error::Fatal};

/// Runs a fallible round a bounded number of times, waiting a fixed delay between attempts.
///
/// Running out of attempts is reported as [Fatal::RetriesExhausted]. A [Fatal] raised by the operation itself ends the
/// loop straight away. What a fatal condition means for the process is left to the caller.
#[derive(Debug, Clone, Copy)]
pub struct RetryExecutor {
    max_attempts: u32,
    backoff: Duration,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff: config.backoff,
        }
    }

    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut f: F) -> Result<T, Fatal>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let mut remaining = self.max_attempts;
        loop {
            let err = match f().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            let err = match err.downcast::<Fatal>() {
                Ok(fatal) => {
                    error!(operation, %fatal, "fatal error, not retrying");
                    return Err(fatal);
                }
                Err(err) => err,
            };

            remaining -= 1;
            let attempt = self.max_attempts - remaining;
            error!(operation, attempt, "exception running {operation}: {err:#}");

            if remaining == 0 {
                return Err(Fatal::RetriesExhausted {
                    operation,
                    attempts: self.max_attempts,
                    last_error: err,
                });
            }

            debug!(operation, "run {attempt} retry, sleeping {:?}", self.backoff);
            sleep(self.backoff).await;
        }
    }
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}
