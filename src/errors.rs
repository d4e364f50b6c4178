/*!
 * Error types for the maktaba application.
 *
 * This module contains custom error types for different parts of the application,
 * using the thiserror crate for ergonomic error definitions.
 */

use thiserror::Error;

/// Errors that can occur when working with provider APIs
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// The request did not complete within the configured timeout
    #[error("Request timed out: {0}")]
    Timeout(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout(error.to_string())
        } else if error.is_connect() {
            Self::ConnectionError(error.to_string())
        } else if error.is_decode() {
            Self::ParseError(error.to_string())
        } else {
            Self::RequestFailed(error.to_string())
        }
    }
}

/// Errors that abort a transliteration or verification run
#[derive(Error, Debug)]
pub enum TransliterationError {
    /// Invalid setup detected before any work starts (empty key pool, zero chunk size)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Chunking produced a different number of items than it was given
    #[error("Sanity check failed: chunks total {actual} but expected {expected}")]
    Consistency {
        /// Items found across all chunks
        actual: usize,
        /// Items that were chunked
        expected: usize,
    },

    /// The transliteration store could not be read or written
    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<std::io::Error> for TransliterationError {
    fn from(error: std::io::Error) -> Self {
        Self::Storage(error.to_string())
    }
}

impl From<serde_json::Error> for TransliterationError {
    fn from(error: serde_json::Error) -> Self {
        Self::Storage(error.to_string())
    }
}
