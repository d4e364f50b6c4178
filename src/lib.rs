/*!
 * # Maktaba
 *
 * A Rust library for AI-assisted transliteration of a digital library catalog.
 *
 * ## Features
 *
 * - Transliterate Arabic author, book and category names with Gemini
 * - Resume interrupted runs: only items without a transliteration are sent
 * - Commit every validated chunk so progress survives crashes
 * - Rotate between several API keys
 * - Back off on rate limits and retry rejected replies
 * - Verify existing transliterations and merge corrections
 * - Export a `master.en.json` bundle and look items up through a TTL cache
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `app_controller`: Main application controller
 * - `catalog`: Master data, translations bundle and cache
 * - `transliteration`: Key pool, retrying client, line codec, stores and pipelines
 * - `providers`: Generation backends:
 *   - `providers::gemini`: Gemini REST client
 *   - `providers::mock`: Scriptable backend for tests
 * - `file_utils`: File system operations
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod catalog;
pub mod errors;
pub mod file_utils;
pub mod providers;
pub mod transliteration;

// Re-export main types for easier usage
pub use app_config::Config;
pub use app_controller::Controller;
pub use catalog::{ItemClass, MasterData, NamedItem, TranslationsData};
pub use errors::{ProviderError, TransliterationError};
pub use transliteration::{ApiKeyPool, GenerativeTextClient, TransliterationPipeline, VerificationPipeline};
