//! crates/bizdesk_core/src/retry.rs
//!
//! Retry-with-fallback around hosted model calls.
//!
//! Rate-limited attempts are retried with exponential backoff plus jitter.
//! When the last attempt fails the prompt is handed to the local fallback
//! model instead, so a throttled provider degrades the answer rather than
//! failing the request. Any other failure before the last attempt is fatal
//! and returned unchanged.

use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

use crate::ports::{FallbackModel, PortError, PortResult};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_FALLBACK_MAX_LENGTH: usize = 100;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub fallback_max_length: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            fallback_max_length: DEFAULT_FALLBACK_MAX_LENGTH,
        }
    }
}

/// `2^attempt` seconds plus up to one second of jitter. `attempt` is zero-based.
pub fn backoff_delay(attempt: u32) -> Duration {
    let base = 2f64.powi(attempt.min(16) as i32);
    Duration::from_secs_f64(base + rand::random::<f64>())
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, fallback_max_length: usize) -> Self {
        Self {
            max_attempts,
            fallback_max_length,
        }
    }

    /// Runs `work` until it succeeds, backing off on rate limits.
    ///
    /// `prompt` is what the fallback model receives once attempts run out.
    pub async fn run<F, Fut>(
        &self,
        prompt: &str,
        fallback: &dyn FallbackModel,
        mut work: F,
    ) -> PortResult<String>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = PortResult<String>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match work().await {
                Ok(text) => return Ok(text),
                Err(PortError::RateLimited(reason)) if attempt + 1 < attempts => {
                    let delay = backoff_delay(attempt);
                    warn!(
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        %reason,
                        "Model call rate limited, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) if attempt + 1 >= attempts => {
                    warn!(error = %e, "API limit reached. Falling back to local model.");
                    let text = fallback.generate(prompt, self.fallback_max_length).await?;
                    info!(chars = text.len(), "Fallback model answered");
                    return Ok(text);
                }
                Err(e) => return Err(e),
            }
            attempt += 1;
        }
    }
}
