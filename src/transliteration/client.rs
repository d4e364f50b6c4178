/*!
 * Validated text generation with retries.
 *
 * [`GenerativeTextClient`] issues one request per attempt and only returns a
 * reply the caller's validator accepts. Empty and rejected replies are
 * retried immediately, rate-limited requests after an exponential backoff,
 * other failures after a fixed delay. Running out of attempts yields `None`
 * rather than an error.
 */

use log::{debug, error, info, warn};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use std::time::{Duration, Instant};

use crate::errors::ProviderError;
use crate::providers::Provider;
use super::keys::redact_key;

/// Error messages that indicate the backend wants us to slow down
static RATE_LIMIT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)429|rate limit|too many requests|overloaded").unwrap()
});

/// Whether an error message signals rate limiting
pub fn is_rate_limit_error(message: &str) -> bool {
    RATE_LIMIT_PATTERN.is_match(message)
}

/// Per-call generation options
#[derive(Debug, Clone)]
pub struct GenerationOptions {
    /// Number of requests to try before giving up
    pub max_retries: u32,
    /// Upper bound for a single request
    pub timeout: Duration,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            timeout: Duration::from_secs(10 * 60),
        }
    }
}

/// Delays applied between attempts
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Backoff after a rate-limited attempt 0, doubled on each later attempt
    pub rate_limit_base: Duration,
    /// Largest rate-limit backoff
    pub rate_limit_cap: Duration,
    /// Delay after any other backend failure
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            rate_limit_base: Duration::from_millis(1000),
            rate_limit_cap: Duration::from_millis(30_000),
            retry_delay: Duration::from_millis(2000),
        }
    }
}

impl RetryPolicy {
    /// Backoff for a rate-limited attempt: `min(2^attempt * base, cap)`
    pub fn rate_limit_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.rate_limit_base
            .checked_mul(factor)
            .unwrap_or(self.rate_limit_cap)
            .min(self.rate_limit_cap)
    }
}

/// What happened to one attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The validator accepted the reply
    Accepted,
    /// The backend answered without text
    Empty,
    /// The validator rejected the reply
    Rejected,
    /// The backend asked us to slow down; waited this long
    RateLimited(Duration),
    /// Any other backend failure
    Failed,
}

/// Record of one attempt, kept only for logging and statistics
#[derive(Debug, Clone)]
pub struct RetryAttempt {
    /// Zero-based attempt index
    pub index: u32,
    /// Outcome of the attempt
    pub outcome: AttemptOutcome,
    /// Time spent waiting for the backend
    pub elapsed: Duration,
}

/// Attempt counters accumulated by a client
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerationCounts {
    pub requests: usize,
    pub accepted: usize,
    pub empty: usize,
    pub rejected: usize,
    pub rate_limited: usize,
    pub failed: usize,
    /// Calls that ran out of attempts
    pub exhausted: usize,
}

/// Thread-safe attempt statistics
#[derive(Debug, Default)]
pub struct GenerationStats {
    counts: Mutex<GenerationCounts>,
    api_duration: Mutex<Duration>,
}

impl GenerationStats {
    fn record(&self, attempt: &RetryAttempt) {
        let mut counts = self.counts.lock();
        counts.requests += 1;
        match attempt.outcome {
            AttemptOutcome::Accepted => counts.accepted += 1,
            AttemptOutcome::Empty => counts.empty += 1,
            AttemptOutcome::Rejected => counts.rejected += 1,
            AttemptOutcome::RateLimited(_) => counts.rate_limited += 1,
            AttemptOutcome::Failed => counts.failed += 1,
        }
        *self.api_duration.lock() += attempt.elapsed;
    }

    fn record_exhausted(&self) {
        self.counts.lock().exhausted += 1;
    }

    /// Current counters
    pub fn counts(&self) -> GenerationCounts {
        *self.counts.lock()
    }

    /// Generate a summary of generation activity
    pub fn summary(&self) -> String {
        let counts = self.counts();
        let api_minutes = self.api_duration.lock().as_secs_f64() / 60.0;

        format!(
            "Generation Summary:\n\
             Requests: {}\n\
             Accepted: {}\n\
             Rejected by validation: {}\n\
             Empty responses: {}\n\
             Rate limited: {}\n\
             Other failures: {}\n\
             Gave up: {}\n\
             API request time: {:.2} minutes",
            counts.requests,
            counts.accepted,
            counts.rejected,
            counts.empty,
            counts.rate_limited,
            counts.failed,
            counts.exhausted,
            api_minutes
        )
    }
}

/// First 1000 and last 500 characters of a reply
fn preview(text: &str) -> (String, String) {
    let head: String = text.chars().take(1000).collect();
    let total = text.chars().count();
    let tail: String = text.chars().skip(total.saturating_sub(500)).collect();
    (head, tail)
}

/// Retrying, validating wrapper around a [`Provider`]
#[derive(Debug)]
pub struct GenerativeTextClient<P: Provider> {
    provider: P,
    policy: RetryPolicy,
    stats: GenerationStats,
}

impl<P: Provider> GenerativeTextClient<P> {
    /// Create a client with the default retry policy
    pub fn new(provider: P) -> Self {
        Self::with_policy(provider, RetryPolicy::default())
    }

    /// Create a client with custom delays
    pub fn with_policy(provider: P, policy: RetryPolicy) -> Self {
        Self {
            provider,
            policy,
            stats: GenerationStats::default(),
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn stats(&self) -> &GenerationStats {
        &self.stats
    }

    /// Generate text until `validate` accepts a reply or the attempts run out
    ///
    /// # Returns
    /// * `Some(text)` - The first reply the validator accepted
    /// * `None` - No attempt produced an acceptable reply
    pub async fn generate<V>(
        &self,
        prompt: &str,
        api_key: &str,
        validate: V,
        options: &GenerationOptions,
    ) -> Option<String>
    where
        V: Fn(&str) -> bool,
    {
        let redacted_key = redact_key(api_key);
        let max_retries = options.max_retries;

        for attempt in 0..max_retries {
            info!(
                "[{}: Sending {} bytes with key={}] (attempt {}/{})",
                self.provider.model(), prompt.len(), redacted_key, attempt + 1, max_retries
            );

            let started = Instant::now();
            let result = tokio::time::timeout(options.timeout, self.provider.generate(prompt, api_key))
                .await
                .unwrap_or_else(|_| Err(ProviderError::Timeout(format!("{} ms", options.timeout.as_millis()))));
            let elapsed = started.elapsed();

            let outcome = match result {
                Ok(Some(text)) if !text.is_empty() => {
                    if validate(&text) {
                        self.stats.record(&RetryAttempt { index: attempt, outcome: AttemptOutcome::Accepted, elapsed });
                        return Some(text);
                    }

                    let (head, tail) = preview(&text);
                    warn!(
                        "Invalid Response: [API {}] Response preview (first 1000 chars): {} (last 500 chars) {}",
                        redacted_key, head, tail
                    );
                    AttemptOutcome::Rejected
                }
                Ok(_) => {
                    warn!(
                        "[API {}] Empty response on attempt {} for a {} byte prompt",
                        redacted_key, attempt + 1, prompt.len()
                    );
                    debug!("[API {}] PROMPT SENT:\n{}", redacted_key, prompt);
                    AttemptOutcome::Empty
                }
                Err(e) => {
                    let message = e.to_string();
                    error!("[API {}] Error on attempt {}: {}", redacted_key, attempt + 1, message);

                    if is_rate_limit_error(&message) {
                        let wait = self.policy.rate_limit_delay(attempt);
                        info!("[API {}] Rate limited. Waiting {}ms...", redacted_key, wait.as_millis());
                        self.stats.record(&RetryAttempt { index: attempt, outcome: AttemptOutcome::RateLimited(wait), elapsed });
                        tokio::time::sleep(wait).await;
                        continue;
                    }

                    self.stats.record(&RetryAttempt { index: attempt, outcome: AttemptOutcome::Failed, elapsed });
                    if attempt + 1 < max_retries {
                        tokio::time::sleep(self.policy.retry_delay).await;
                    }
                    continue;
                }
            };

            self.stats.record(&RetryAttempt { index: attempt, outcome, elapsed });
        }

        warn!("[API {}] No acceptable response after {} attempt(s)", redacted_key, max_retries);
        self.stats.record_exhausted();
        None
    }
}
