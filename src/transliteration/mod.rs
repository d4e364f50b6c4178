/*!
 * Transliteration of catalog names.
 *
 * - `keys`: rotating API key pool and key redaction
 * - `client`: retrying generation client with rate-limit backoff
 * - `codec`: `id,name` line format and chunking helpers
 * - `store`: persisted per-class transliteration maps
 * - `pipeline`: resumable transliteration runs
 * - `verify`: correction pass over stored transliterations
 */

pub mod client;
pub mod codec;
pub mod keys;
pub mod pipeline;
pub mod store;
pub mod verify;

pub use client::{GenerationOptions, GenerationStats, GenerativeTextClient, RetryPolicy};
pub use codec::{chunk_items, parse_response, serialize_items, validate_chunks};
pub use keys::{ApiKeyPool, redact_key};
pub use pipeline::{
    CancellationFlag, ChunkProcessor, PipelineSettings, PipelineState, RunSummary, TransliterationPipeline,
};
pub use store::{JsonFileStore, MemoryStore, TransliterationMap, TransliterationStore};
pub use verify::{VerificationEntry, VerificationPipeline, VerificationSummary};
