use async_trait::async_trait;
use medhist_common::{MedHistError, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::client::{LlmClient, LlmRequest, LlmResponse};

/// Backoff settings for completion requests.
///
/// The default performs no retries: a failed completion surfaces on the
/// first error. Raise `max_retries` to retry rate limits and 5xx responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_delay_ms: 500,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
        }
    }
}

pub struct RetryingClient<T: LlmClient> {
    inner: T,
    config: RetryConfig,
}

impl<T: LlmClient> RetryingClient<T> {
    pub fn new(inner: T, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    fn is_retryable(error: &MedHistError) -> bool {
        let MedHistError::Completion(message) = error else {
            return false;
        };
        let lower = message.to_lowercase();
        [
            "429",
            "rate limit",
            "500",
            "502",
            "503",
            "504",
            "server error",
            "bad gateway",
            "service unavailable",
            "gateway timeout",
        ]
        .iter()
        .any(|needle| lower.contains(needle))
    }

    fn parse_retry_after(error_msg: &str) -> Option<u64> {
        // ASCII lowering keeps byte offsets aligned with `error_msg`.
        let lower = error_msg.to_ascii_lowercase();
        let pos = lower.find("retry-after")?;
        error_msg[pos..]
            .split_whitespace()
            .skip(1)
            .find_map(|word| {
                word.trim_end_matches(|c: char| !c.is_ascii_digit())
                    .parse::<u64>()
                    .ok()
            })
            .map(|secs| secs * 1000)
    }

    fn compute_delay(&self, attempt: u32) -> u64 {
        let base = self.config.initial_delay_ms as f64
            * self.config.backoff_multiplier.powi(attempt as i32);
        let jitter = (base * 0.1 * jitter_fraction(attempt)) as u64;
        let delay = (base as u64).saturating_add(jitter);
        delay.min(self.config.max_delay_ms)
    }
}

/// Deterministic jitter in `[0, 1)` derived from the attempt number.
fn jitter_fraction(attempt: u32) -> f64 {
    let x = attempt.wrapping_mul(2654435761);
    (x % 100) as f64 / 100.0
}

#[async_trait]
impl<T: LlmClient> LlmClient for RetryingClient<T> {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        let mut attempt = 0;
        loop {
            let error = match self.inner.complete(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(e) => e,
            };

            if attempt >= self.config.max_retries || !Self::is_retryable(&error) {
                return Err(error);
            }

            let error_msg = error.to_string();
            let delay = Self::parse_retry_after(&error_msg)
                .unwrap_or_else(|| self.compute_delay(attempt))
                .min(self.config.max_delay_ms);

            warn!(
                attempt = attempt + 1,
                max_retries = self.config.max_retries,
                delay_ms = delay,
                error = %error_msg,
                "Retrying completion request"
            );

            tokio::time::sleep(tokio::time::Duration::from_millis(delay)).await;
            attempt += 1;
        }
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}
