/*!
 * Second pass over existing transliterations.
 *
 * Every item is sent together with its current transliteration. The model
 * either answers `OK` for a chunk or returns `id,corrected` rows for the
 * entries it wants to change, which are merged into the store.
 */

use log::{info, warn};

use crate::catalog::{ItemClass, NamedItem};
use crate::errors::TransliterationError;
use crate::providers::Provider;
use super::codec::{chunk_items, parse_response, serialize_rows, validate_chunks};
use super::pipeline::ChunkProcessor;
use super::store::{TransliterationMap, TransliterationStore};

/// Reply meaning the chunk needs no corrections
pub const NO_ERRORS_REPLY: &str = "OK";

/// An item paired with whatever transliteration is currently stored for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationEntry {
    pub id: u64,
    pub name: String,
    pub transliteration: Option<String>,
}

impl VerificationEntry {
    fn fields(&self) -> [String; 3] {
        [
            self.id.to_string(),
            self.name.clone(),
            self.transliteration.clone().unwrap_or_default(),
        ]
    }
}

/// A verification reply is usable when it is the no-errors marker or carries at least one row
pub fn is_acceptable_verification(text: &str) -> bool {
    text == NO_ERRORS_REPLY || !parse_response(text).is_empty()
}

/// Outcome of one verification run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationSummary {
    pub class: ItemClass,
    pub items: usize,
    pub chunks: usize,
    /// Chunks the model reported as correct
    pub chunks_clean: usize,
    /// Chunks whose corrections were merged into the store
    pub chunks_corrected: usize,
    pub chunks_failed: usize,
    pub corrections: usize,
    pub cancelled: bool,
}

impl VerificationSummary {
    fn new(class: ItemClass, items: usize) -> Self {
        Self {
            class,
            items,
            chunks: 0,
            chunks_clean: 0,
            chunks_corrected: 0,
            chunks_failed: 0,
            corrections: 0,
            cancelled: false,
        }
    }
}

/// Sends stored transliterations back to the model for review
pub struct VerificationPipeline<'a, P: Provider> {
    processor: ChunkProcessor<'a, P>,
}

impl<'a, P: Provider> VerificationPipeline<'a, P> {
    pub fn new(processor: ChunkProcessor<'a, P>) -> Self {
        Self { processor }
    }

    /// Pair every item with its stored transliteration
    pub fn entries(items: &[NamedItem], map: &TransliterationMap) -> Vec<VerificationEntry> {
        items.iter()
            .map(|item| VerificationEntry {
                id: item.id,
                name: item.name.clone(),
                transliteration: map.get(&item.id).cloned(),
            })
            .collect()
    }

    pub async fn run(
        &self,
        class: ItemClass,
        items: &[NamedItem],
        store: &dyn TransliterationStore,
        template: &str,
    ) -> Result<VerificationSummary, TransliterationError> {
        let chunk_size = self.processor.settings().chunk_size;
        let mut summary = VerificationSummary::new(class, items.len());

        info!("{} to verify: {}, chunkSize={}", class, items.len(), chunk_size);
        self.processor.check_template(template)?;

        let map = store.load()?;
        let entries = Self::entries(items, &map);

        let chunks = chunk_items(&entries, chunk_size)?;
        validate_chunks(&chunks, entries.len())?;
        summary.chunks = chunks.len();

        for (index, chunk) in chunks.iter().enumerate() {
            if self.processor.is_cancelled() {
                warn!("[{}] Verification cancelled before chunk {}/{}", class, index + 1, chunks.len());
                summary.cancelled = true;
                break;
            }

            let data = serialize_rows(chunk.iter().map(VerificationEntry::fields));
            let response = self.processor.generate(template, &data, is_acceptable_verification).await;

            match response {
                Some(text) if text == NO_ERRORS_REPLY => {
                    info!("No errors in chunk {}/{}", index + 1, chunks.len());
                    summary.chunks_clean += 1;
                }
                Some(text) => {
                    let corrections: TransliterationMap = parse_response(&text)
                        .into_iter()
                        .map(|item| (item.id, item.name))
                        .collect();

                    info!("Committing {} corrections to {}", corrections.len(), store.location());
                    store.commit(&corrections)?;
                    summary.chunks_corrected += 1;
                    summary.corrections += corrections.len();
                }
                None => {
                    warn!("[{}] Chunk {}/{} could not be verified", class, index + 1, chunks.len());
                    summary.chunks_failed += 1;
                }
            }

            self.processor.report_progress(index + 1, chunks.len());
        }

        info!(
            "[{}] Verified {} chunks: {} clean, {} corrected ({} entries), {} failed",
            class, summary.chunks, summary.chunks_clean, summary.chunks_corrected,
            summary.corrections, summary.chunks_failed
        );

        Ok(summary)
    }
}
