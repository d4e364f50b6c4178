/*!
 * Mock provider implementations for testing.
 *
 * This module provides mock providers that simulate different behaviors:
 * - `MockProvider::working()` - Transliterates every `id,name` row of the prompt
 * - `MockProvider::scripted(..)` - Replays a fixed sequence of replies
 * - `MockProvider::failing(..)` - Always fails with an error
 * - `MockProvider::empty()` - Always answers without text
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::errors::ProviderError;
use crate::providers::Provider;

/// One scripted reply
#[derive(Debug, Clone, PartialEq)]
pub enum MockReply {
    /// Answer with this text
    Text(String),
    /// Answer without any text
    Empty,
    /// Fail with a request error carrying this message
    Error(String),
}

/// Behavior mode for the mock provider
#[derive(Debug, Clone, PartialEq)]
pub enum MockBehavior {
    /// Answers every `id,name` prompt row with `id,tr:name`
    Working,
    /// Replays queued replies, then answers empty
    Scripted,
    /// Always fails with the given message
    Failing(String),
    /// Always answers without text
    Empty,
}

/// A request observed by the mock
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    /// Prompt that was sent
    pub prompt: String,
    /// Key that authenticated the call
    pub api_key: String,
}

/// Mock provider for testing generation behavior
#[derive(Debug)]
pub struct MockProvider {
    /// Behavior mode
    behavior: MockBehavior,
    /// Request counter shared between clones
    request_count: Arc<AtomicUsize>,
    /// Replies consumed by the scripted behavior
    script: Arc<Mutex<VecDeque<MockReply>>>,
    /// Every call received, in order
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    /// Custom response generator (optional)
    custom_response: Option<fn(&str) -> String>,
}

impl MockProvider {
    /// Create a new mock provider with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            request_count: Arc::new(AtomicUsize::new(0)),
            script: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            custom_response: None,
        }
    }

    /// Create a working mock provider
    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    /// Create a mock that replays the given replies in order
    pub fn scripted(replies: impl IntoIterator<Item = MockReply>) -> Self {
        let provider = Self::new(MockBehavior::Scripted);
        provider.script.lock().extend(replies);
        provider
    }

    /// Create a failing mock provider that always errors
    pub fn failing(message: impl Into<String>) -> Self {
        Self::new(MockBehavior::Failing(message.into()))
    }

    /// Create a mock that returns empty responses
    pub fn empty() -> Self {
        Self::new(MockBehavior::Empty)
    }

    /// Set a custom response generator, used by the working behavior
    pub fn with_custom_response(mut self, generator: fn(&str) -> String) -> Self {
        self.custom_response = Some(generator);
        self
    }

    /// Number of generation calls received so far
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Every call received so far
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Answer every `id,name` row found in the prompt with `id,tr:name`
    pub fn transliterate_rows(prompt: &str) -> String {
        prompt.lines()
            .filter_map(|line| {
                let (id, name) = line.split_once(',')?;
                let id: u64 = id.trim().parse().ok()?;
                Some(format!("{},tr:{}", id, name))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Clone for MockProvider {
    fn clone(&self) -> Self {
        Self {
            behavior: self.behavior.clone(),
            request_count: Arc::clone(&self.request_count),
            script: Arc::clone(&self.script),
            calls: Arc::clone(&self.calls),
            custom_response: self.custom_response,
        }
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn generate(&self, prompt: &str, api_key: &str) -> Result<Option<String>, ProviderError> {
        self.request_count.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().push(RecordedCall {
            prompt: prompt.to_string(),
            api_key: api_key.to_string(),
        });

        match &self.behavior {
            MockBehavior::Working => {
                let text = match self.custom_response {
                    Some(generator) => generator(prompt),
                    None => Self::transliterate_rows(prompt),
                };
                Ok(Some(text))
            }
            MockBehavior::Scripted => {
                let reply = self.script.lock().pop_front().unwrap_or(MockReply::Empty);
                match reply {
                    MockReply::Text(text) => Ok(Some(text)),
                    MockReply::Empty => Ok(None),
                    MockReply::Error(message) => Err(ProviderError::RequestFailed(message)),
                }
            }
            MockBehavior::Failing(message) => Err(ProviderError::ApiError {
                status_code: 500,
                message: message.clone(),
            }),
            MockBehavior::Empty => Ok(None),
        }
    }

    fn model(&self) -> &str {
        "mock"
    }
}
