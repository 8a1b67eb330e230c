use std::time::Duration;

use crate::browser::{BrowserError, ErrorKind};

/// Re-runs a fallible browser operation while it keeps failing with one of
/// the listed conditions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub backoff: Duration,
    pub retry_on: Vec<ErrorKind>,
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, backoff: Duration, retry_on: &[ErrorKind]) -> Self {
        Self {
            max_attempts,
            backoff,
            retry_on: retry_on.to_vec(),
        }
    }

    /// Intercepted clicks and WebDriver-level timeouts; 5 attempts, 1s apart.
    pub fn transient() -> Self {
        Self::new(
            5,
            Duration::from_secs(1),
            &[ErrorKind::Intercepted, ErrorKind::Stale, ErrorKind::Timeout],
        )
    }

    /// Used around raw element clicks; 5 attempts, 2s apart.
    pub fn click() -> Self {
        Self::new(
            5,
            Duration::from_secs(2),
            &[ErrorKind::Intercepted, ErrorKind::Stale],
        )
    }

    /// Starting a WebDriver session.
    pub fn session() -> Self {
        Self::new(5, Duration::from_secs(1), &[ErrorKind::Session])
    }

    pub fn is_retryable(&self, err: &BrowserError) -> bool {
        self.retry_on.contains(&err.kind())
    }

    pub async fn run<T>(
        &self,
        name: &str,
        mut op: impl AsyncFnMut() -> Result<T, BrowserError>,
    ) -> Result<T, BrowserError> {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if self.is_retryable(&e) && attempt < max_attempts => {
                    log::warn!("'{name}' failed on attempt {attempt}/{max_attempts}: {e}");
                    tokio::time::sleep(self.backoff).await;
                }
                Err(e) => {
                    if self.is_retryable(&e) {
                        log::error!("'{name}' failed after {max_attempts} attempts: {e}");
                    }
                    return Err(e);
                }
            }
        }
    }
}
