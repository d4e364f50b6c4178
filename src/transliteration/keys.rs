/*!
 * API key rotation and redaction.
 *
 * Generation requests are spread across several credentials by handing out
 * keys round-robin. Keys are never logged verbatim; use [`redact_key`].
 */

use log::info;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::errors::TransliterationError;

/// Mask a secret for logging: `first4...last4`, or `***` when too short to reveal anything
pub fn redact_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "***".to_string();
    }

    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

/// Round-robin pool of API keys
#[derive(Debug)]
pub struct ApiKeyPool {
    /// Keys in issue order, never empty
    keys: Vec<String>,
    /// Index of the next key to hand out
    cursor: AtomicUsize,
}

impl ApiKeyPool {
    /// Create a pool from a list of keys; blank entries are discarded
    pub fn new<I, S>(keys: I) -> Result<Self, TransliterationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keys: Vec<String> = keys.into_iter()
            .map(|k| k.as_ref().trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();

        if keys.is_empty() {
            return Err(TransliterationError::Configuration("No API keys provided".to_string()));
        }

        info!("Loaded {} API key(s)", keys.len());

        Ok(Self {
            keys,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Create a pool from a comma-separated list such as the `GOOGLE_API_KEY` variable
    pub fn from_csv(keys: &str) -> Result<Self, TransliterationError> {
        Self::new(keys.split(','))
    }

    /// Hand out the key under the cursor and advance it
    pub fn next(&self) -> String {
        let len = self.keys.len();
        let index = self.cursor
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |c| Some((c + 1) % len))
            .unwrap_or(0);
        self.keys[index].clone()
    }

    /// Number of keys in the pool
    pub fn size(&self) -> usize {
        self.keys.len()
    }
}
