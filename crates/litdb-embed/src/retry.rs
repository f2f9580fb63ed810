//! Bounded retry with exponential backoff for flaky providers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use litdb_core::traits::Embedder;
use litdb_core::{Error, Result};

/// Longest uninterrupted sleep between cancellation checks.
const CANCEL_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.base_delay.as_millis() as f64 * self.backoff_multiplier.powi(attempt as i32);
        let delay = delay.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(delay as u64)
    }
}

/// Retries [`Error::ProviderUnavailable`] failures of the wrapped provider.
///
/// Any other error is returned immediately. Setting the cancellation flag
/// stops further attempts; the last error is returned.
pub struct RetryingEmbedder {
    inner: Arc<dyn Embedder>,
    policy: RetryPolicy,
    cancelled: Arc<AtomicBool>,
}

impl RetryingEmbedder {
    pub fn new(inner: Arc<dyn Embedder>, policy: RetryPolicy) -> Self {
        Self { inner, policy, cancelled: Arc::new(AtomicBool::new(false)) }
    }

    /// Shared flag; store `true` to abandon pending retries.
    pub fn cancellation_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Sleep for `delay` in short slices; `false` if cancelled meanwhile.
    fn backoff(&self, delay: Duration) -> bool {
        let deadline = Instant::now() + delay;
        loop {
            if self.is_cancelled() { return false; }
            let now = Instant::now();
            if now >= deadline { return true; }
            thread::sleep((deadline - now).min(CANCEL_POLL));
        }
    }
}

impl Embedder for RetryingEmbedder {
    fn embedder_id(&self) -> &str { self.inner.embedder_id() }

    fn dim(&self) -> usize { self.inner.dim() }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut attempt = 0;
        loop {
            match self.inner.embed_batch(texts) {
                Ok(vectors) => return Ok(vectors),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    if attempt >= self.policy.max_retries || self.is_cancelled() {
                        warn!(attempts = attempt + 1, error = %e, "embedding provider gave up");
                        return Err(e);
                    }
                    let delay = self.policy.delay_for_attempt(attempt);
                    debug!(attempt = attempt + 1, ?delay, error = %e, "retrying embedding batch");
                    if !self.backoff(delay) {
                        warn!(attempts = attempt + 1, error = %e, "embedding retry cancelled");
                        return Err(e);
                    }
                    attempt += 1;
                }
            }
        }
    }
}

impl std::fmt::Debug for RetryingEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryingEmbedder")
            .field("inner", &self.inner.embedder_id())
            .field("policy", &self.policy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_caps() {
        let policy = RetryPolicy {
            max_retries: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
            backoff_multiplier: 2.0,
        };
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(350));
    }

    #[test]
    fn non_retryable_errors_are_not_retried() {
        assert!(!Error::DimensionMismatch { expected: 2, actual: 3 }.is_retryable());
        assert!(Error::ProviderUnavailable("timeout".into()).is_retryable());
    }
}
