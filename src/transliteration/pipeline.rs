/*!
 * Resumable transliteration pipeline.
 *
 * A run loads the persisted map, prunes entries for items that left the
 * catalog, and sends only the items still missing a transliteration to the
 * model, one chunk at a time. Every accepted chunk is committed before the
 * next one starts, so an interrupted run loses at most the chunk in flight
 * and a rerun picks up where the last one stopped.
 */

use log::{debug, info, warn};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::catalog::{ItemClass, NamedItem};
use crate::errors::TransliterationError;
use crate::providers::Provider;
use super::client::{GenerationOptions, GenerativeTextClient};
use super::codec::{chunk_items, parse_response, serialize_items, validate_chunks};
use super::keys::ApiKeyPool;
use super::store::{TransliterationMap, TransliterationStore, prune_orphans, unprocessed};

/// Token replaced by the serialized chunk in prompt templates
pub const DEFAULT_PLACEHOLDER: &str = "{{TRANSLITERATION_DATA}}";

/// Items per generation request
pub const DEFAULT_CHUNK_SIZE: usize = 300;

/// Knobs shared by the transliteration and verification pipelines
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Maximum items per chunk
    pub chunk_size: usize,
    /// Token in the template that receives the serialized chunk
    pub placeholder: String,
    /// Retry budget and timeout of each generation call
    pub generation: GenerationOptions,
    /// Write the pruned map back as soon as orphans are removed
    pub persist_pruned_orphans: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
            generation: GenerationOptions::default(),
            persist_pruned_orphans: true,
        }
    }
}

/// Shared flag that stops a run before its next chunk
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask running pipelines to stop after their current chunk
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Progress callback receiving `(completed_chunks, total_chunks)`
pub type ProgressCallback<'a> = Box<dyn Fn(usize, usize) + Send + Sync + 'a>;

/// Where a run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Loading,
    Pruning,
    Chunking,
    Generating { chunk: usize },
    Validating { chunk: usize },
    Committing { chunk: usize },
    Done,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Loading => write!(f, "loading"),
            Self::Pruning => write!(f, "pruning"),
            Self::Chunking => write!(f, "chunking"),
            Self::Generating { chunk } => write!(f, "generating chunk {}", chunk + 1),
            Self::Validating { chunk } => write!(f, "validating chunk {}", chunk + 1),
            Self::Committing { chunk } => write!(f, "committing chunk {}", chunk + 1),
            Self::Done => write!(f, "done"),
        }
    }
}

/// Outcome of one transliteration run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub class: ItemClass,
    /// Items in the catalog
    pub total: usize,
    /// Items that already had a transliteration
    pub already_done: usize,
    /// Persisted entries dropped because their item left the catalog
    pub orphans_removed: usize,
    /// Chunks the pending items were split into
    pub chunks: usize,
    pub chunks_committed: usize,
    /// Chunks that produced no acceptable reply; their items stay pending
    pub chunks_failed: usize,
    pub items_committed: usize,
    /// The run stopped early because it was cancelled
    pub cancelled: bool,
}

impl RunSummary {
    fn new(class: ItemClass, total: usize) -> Self {
        Self {
            class,
            total,
            already_done: 0,
            orphans_removed: 0,
            chunks: 0,
            chunks_committed: 0,
            chunks_failed: 0,
            items_committed: 0,
            cancelled: false,
        }
    }
}

/// Key rotation, prompt rendering, generation and progress for one chunk at a time
pub struct ChunkProcessor<'a, P: Provider> {
    client: &'a GenerativeTextClient<P>,
    keys: &'a ApiKeyPool,
    settings: PipelineSettings,
    cancellation: CancellationFlag,
    progress: Option<ProgressCallback<'a>>,
}

impl<'a, P: Provider> ChunkProcessor<'a, P> {
    pub fn new(client: &'a GenerativeTextClient<P>, keys: &'a ApiKeyPool, settings: PipelineSettings) -> Self {
        Self {
            client,
            keys,
            settings,
            cancellation: CancellationFlag::new(),
            progress: None,
        }
    }

    /// Stop between chunks once `flag` is raised
    pub fn with_cancellation(mut self, flag: CancellationFlag) -> Self {
        self.cancellation = flag;
        self
    }

    /// Report progress after each chunk
    pub fn with_progress(mut self, callback: impl Fn(usize, usize) + Send + Sync + 'a) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Reject templates that have nowhere to put the chunk
    pub fn check_template(&self, template: &str) -> Result<(), TransliterationError> {
        if self.settings.placeholder.is_empty() || !template.contains(&self.settings.placeholder) {
            return Err(TransliterationError::Configuration(format!(
                "Prompt template does not contain the placeholder {}",
                self.settings.placeholder
            )));
        }
        Ok(())
    }

    /// Substitute the serialized chunk for the placeholder
    pub fn render_prompt(&self, template: &str, data: &str) -> String {
        template.replacen(&self.settings.placeholder, data, 1)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Send one serialized chunk with the next key in the pool
    pub async fn generate<V>(&self, template: &str, data: &str, validate: V) -> Option<String>
    where
        V: Fn(&str) -> bool,
    {
        let api_key = self.keys.next();
        let prompt = self.render_prompt(template, data);
        self.client.generate(&prompt, &api_key, validate, &self.settings.generation).await
    }

    pub fn report_progress(&self, completed: usize, total: usize) {
        if let Some(callback) = &self.progress {
            callback(completed, total);
        }
    }
}

/// Builds transliterations for items that do not have one yet
pub struct TransliterationPipeline<'a, P: Provider> {
    processor: ChunkProcessor<'a, P>,
}

impl<'a, P: Provider> TransliterationPipeline<'a, P> {
    pub fn new(processor: ChunkProcessor<'a, P>) -> Self {
        Self { processor }
    }

    fn transition(&self, class: ItemClass, state: PipelineState) {
        debug!("[{}] {}", class, state);
    }

    /// Transliterate every item of `class` missing from `store`
    ///
    /// Chunks whose replies never pass validation are skipped and stay
    /// pending for the next run. Only configuration, consistency and
    /// storage errors abort the run.
    pub async fn run(
        &self,
        class: ItemClass,
        items: &[NamedItem],
        store: &dyn TransliterationStore,
        template: &str,
    ) -> Result<RunSummary, TransliterationError> {
        let chunk_size = self.processor.settings().chunk_size;
        let mut summary = RunSummary::new(class, items.len());
        self.transition(class, PipelineState::Idle);

        info!("{} to process: {}, chunkSize={}", class, items.len(), chunk_size);
        self.processor.check_template(template)?;

        self.transition(class, PipelineState::Loading);
        let (saved, dropped) = store.load_counting_dropped()?;

        self.transition(class, PipelineState::Pruning);
        let saved_count = saved.len();
        let pruned = prune_orphans(items, saved);
        summary.orphans_removed = dropped + saved_count - pruned.len();

        if summary.orphans_removed > 0 && self.processor.settings().persist_pruned_orphans {
            store.save(&pruned)?;
            info!("Removed {} orphaned entries from {}", summary.orphans_removed, store.location());
        }

        let pending = unprocessed(items, &pruned);
        summary.already_done = items.len() - pending.len();

        if pending.is_empty() {
            info!("All {} already transliterated ({} items)", class, items.len());
            self.transition(class, PipelineState::Done);
            return Ok(summary);
        }

        info!("Found {} unprocessed items ({} already done)", pending.len(), summary.already_done);

        self.transition(class, PipelineState::Chunking);
        let chunks = chunk_items(&pending, chunk_size)?;
        info!("Split into {} chunks, each up to {} items", chunks.len(), chunk_size);
        validate_chunks(&chunks, pending.len())?;
        summary.chunks = chunks.len();

        for (index, chunk) in chunks.iter().enumerate() {
            if self.processor.is_cancelled() {
                warn!("[{}] Cancelled before chunk {}/{}", class, index + 1, chunks.len());
                summary.cancelled = true;
                break;
            }

            self.transition(class, PipelineState::Generating { chunk: index });
            let expected = chunk.len();
            let response = self.processor
                .generate(template, &serialize_items(chunk), |text| parse_response(text).len() == expected)
                .await;

            match response {
                Some(text) => {
                    self.transition(class, PipelineState::Validating { chunk: index });
                    let delta: TransliterationMap = parse_response(&text)
                        .into_iter()
                        .map(|item| (item.id, item.name))
                        .collect();

                    self.transition(class, PipelineState::Committing { chunk: index });
                    info!("Committing {} to {}", delta.len(), store.location());
                    store.commit(&delta)?;

                    summary.chunks_committed += 1;
                    summary.items_committed += delta.len();
                }
                None => {
                    warn!(
                        "[{}] Chunk {}/{} produced no valid response, {} items left for a later run",
                        class, index + 1, chunks.len(), expected
                    );
                    summary.chunks_failed += 1;
                }
            }

            self.processor.report_progress(index + 1, chunks.len());
        }

        self.transition(class, PipelineState::Done);
        info!(
            "[{}] {} of {} chunks committed ({} items), {} failed",
            class, summary.chunks_committed, summary.chunks, summary.items_committed, summary.chunks_failed
        );

        Ok(summary)
    }
}
