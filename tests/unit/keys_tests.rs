/*!
 * Tests for API key rotation and redaction
 */

use std::collections::HashMap;
use std::sync::Arc;

use maktaba::errors::TransliterationError;
use maktaba::transliteration::keys::{redact_key, ApiKeyPool};

/// Test that keys are handed out in a cycle
#[test]
fn test_next_withThreeKeys_shouldCycleInOrder() {
    let pool = ApiKeyPool::new(["k1", "k2", "k3"]).unwrap();

    let issued: Vec<String> = (0..7).map(|_| pool.next()).collect();
    assert_eq!(issued, ["k1", "k2", "k3", "k1", "k2", "k3", "k1"]);
    assert_eq!(pool.size(), 3);
}

/// Test that a single key is always returned
#[test]
fn test_next_withSingleKey_shouldAlwaysReturnIt() {
    let pool = ApiKeyPool::from_csv("only").unwrap();
    assert!((0..5).all(|_| pool.next() == "only"));
}

/// Test the comma-separated environment format
#[test]
fn test_from_csv_withBlanksAndSpaces_shouldKeepRealKeys() {
    let pool = ApiKeyPool::from_csv(" a ,, b,").unwrap();
    assert_eq!(pool.size(), 2);
    assert_eq!(pool.next(), "a");
    assert_eq!(pool.next(), "b");
}

/// Test that an empty key list is a configuration error
#[test]
fn test_new_withNoKeys_shouldFailWithConfigurationError() {
    let result = ApiKeyPool::from_csv(" , ");
    assert!(matches!(result, Err(TransliterationError::Configuration(_))));

    let result = ApiKeyPool::new(Vec::<String>::new());
    assert!(matches!(result, Err(TransliterationError::Configuration(_))));
}

/// Test redaction of long and short secrets
#[test]
fn test_redact_key_shouldHideMiddleOrEverything() {
    assert_eq!(redact_key("AIzaSyABCDEFGH1234"), "AIza...1234");
    assert_eq!(redact_key("123456789"), "1234...6789");
    assert_eq!(redact_key("12345678"), "***");
    assert_eq!(redact_key(""), "***");
}

/// Test that concurrent callers share the load evenly
#[test]
fn test_next_fromManyThreads_shouldDistributeEvenly() {
    let pool = Arc::new(ApiKeyPool::new(["a", "b", "c", "d"]).unwrap());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let pool = Arc::clone(&pool);
            std::thread::spawn(move || (0..100).map(|_| pool.next()).collect::<Vec<_>>())
        })
        .collect();

    let mut counts: HashMap<String, usize> = HashMap::new();
    for handle in handles {
        for key in handle.join().unwrap() {
            *counts.entry(key).or_default() += 1;
        }
    }

    assert_eq!(counts.len(), 4);
    assert!(counts.values().all(|&n| n == 200));
}
