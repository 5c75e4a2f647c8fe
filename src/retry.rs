use crate::Error;
use std::future::Future;
use std::time::Duration;

/// Bounded retry against transient connectivity failures.
///
/// `max_attempts` counts every attempt, the first one included. Errors for
/// which [`Error::is_transient`] is `false` are returned straight away.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: Duration::ZERO,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy allowing `max_attempts` attempts in total.
    ///
    /// A value of `0` is treated as `1`: the operation always runs once.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Sets the pause between two attempts. Defaults to no pause.
    pub fn backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Runs `op` until it succeeds, fails with a non-transient error, or the
    /// attempt budget is spent.
    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut op: F) -> Result<T, Error>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() => {
                    tracing::warn!(
                        operation,
                        attempt,
                        max_attempts = self.max_attempts,
                        err = %err,
                        "session store connection failed ({}/{})",
                        attempt,
                        self.max_attempts
                    );
                    if attempt >= self.max_attempts {
                        return Err(err);
                    }
                    attempt += 1;
                    if !self.backoff.is_zero() {
                        tokio::time::sleep(self.backoff).await;
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }
}
