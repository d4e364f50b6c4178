/*!
 * Provider implementations for text-generation services.
 *
 * This module contains client implementations for the generative backends:
 * - Gemini: Google Generative Language API integration
 * - Mock: Scriptable in-process backend for tests
 */

use async_trait::async_trait;
use std::fmt::Debug;

use crate::errors::ProviderError;

/// Common trait for all text-generation providers
///
/// A provider performs exactly one generation request per call. Retries,
/// backoff and response validation live in
/// [`GenerativeTextClient`](crate::transliteration::client::GenerativeTextClient).
#[async_trait]
pub trait Provider: Send + Sync + Debug {
    /// Generate text for a prompt using the given credential
    ///
    /// # Arguments
    /// * `prompt` - The full prompt to send
    /// * `api_key` - The credential to authenticate this request with
    ///
    /// # Returns
    /// * `Ok(Some(text))` - The generated text
    /// * `Ok(None)` - The backend answered without any text
    /// * `Err(ProviderError)` - The request failed
    async fn generate(&self, prompt: &str, api_key: &str) -> Result<Option<String>, ProviderError>;

    /// Model identifier used in log lines
    fn model(&self) -> &str;
}

pub mod gemini;
pub mod mock;
