/*!
 * Tests for the retrying generation client
 */

use async_trait::async_trait;
use std::time::Duration;

use maktaba::errors::ProviderError;
use maktaba::providers::Provider;
use maktaba::providers::mock::{MockProvider, MockReply};
use maktaba::transliteration::client::{GenerationOptions, GenerativeTextClient, RetryPolicy};

/// Backend that never answers within the timeout
#[derive(Debug)]
struct SlowProvider;

#[async_trait]
impl Provider for SlowProvider {
    async fn generate(&self, _prompt: &str, _api_key: &str) -> Result<Option<String>, ProviderError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(Some("1,late".to_string()))
    }

    fn model(&self) -> &str {
        "slow"
    }
}

/// Test that a backend error on every attempt ends in None after fixed delays
#[tokio::test(start_paused = true)]
async fn test_generate_withFailingBackend_shouldGiveUpAfterThreeCalls() {
    let client = GenerativeTextClient::new(MockProvider::failing("internal"));
    let started = tokio::time::Instant::now();

    let result = client.generate("p", "key", |_| true, &GenerationOptions::default()).await;

    assert!(result.is_none());
    assert_eq!(client.provider().request_count(), 3);
    // two 2000 ms pauses, none after the last attempt
    assert_eq!(started.elapsed(), Duration::from_millis(4000));

    let counts = client.stats().counts();
    assert_eq!(counts.failed, 3);
    assert_eq!(counts.exhausted, 1);
}

/// Test that each attempt is bounded by the timeout
#[tokio::test(start_paused = true)]
async fn test_generate_withSlowBackend_shouldTimeOutEachAttempt() {
    let policy = RetryPolicy { retry_delay: Duration::ZERO, ..Default::default() };
    let client = GenerativeTextClient::with_policy(SlowProvider, policy);
    let options = GenerationOptions { max_retries: 2, timeout: Duration::from_secs(5) };
    let started = tokio::time::Instant::now();

    let result = client.generate("p", "key", |_| true, &options).await;

    assert!(result.is_none());
    assert_eq!(started.elapsed(), Duration::from_secs(10));
    assert_eq!(client.stats().counts().failed, 2);
}

/// Test that a rate limit followed by a good reply succeeds
#[tokio::test(start_paused = true)]
async fn test_generate_withRateLimitThenSuccess_shouldReturnText() {
    let provider = MockProvider::scripted([
        MockReply::Error("Too Many Requests".to_string()),
        MockReply::Text("1,al-Bukhari".to_string()),
    ]);
    let client = GenerativeTextClient::new(provider);

    let result = client.generate("p", "key", |t| t.contains(','), &GenerationOptions::default()).await;

    assert_eq!(result.as_deref(), Some("1,al-Bukhari"));
    let counts = client.stats().counts();
    assert_eq!(counts.rate_limited, 1);
    assert_eq!(counts.accepted, 1);
    assert_eq!(counts.requests, 2);
}

/// Test that the key reaches the backend untouched
#[tokio::test]
async fn test_generate_shouldPassKeyToBackend() {
    let client = GenerativeTextClient::new(MockProvider::working());

    client.generate("1,x", "secret-key-value", |_| true, &GenerationOptions::default()).await;

    let calls = client.provider().calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].api_key, "secret-key-value");
    assert_eq!(calls[0].prompt, "1,x");
}

/// Test that the summary lists the counters
#[tokio::test]
async fn test_stats_summary_afterRejectedReplies_shouldMentionRejections() {
    let client = GenerativeTextClient::new(MockProvider::working());

    client.generate("1,x", "k", |_| false, &GenerationOptions { max_retries: 2, ..Default::default() }).await;

    let summary = client.stats().summary();
    assert!(summary.contains("Requests: 2"));
    assert!(summary.contains("Rejected by validation: 2"));
    assert!(summary.contains("Gave up: 1"));
}
