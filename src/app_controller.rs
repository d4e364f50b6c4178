use anyhow::{anyhow, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::future::Future;
use std::path::Path;
use std::time::{Duration, Instant};

use crate::app_config::Config;
use crate::catalog::{ItemClass, MasterData, MasterDataCache, NamedItem, TranslationsData};
use crate::file_utils::FileManager;
use crate::providers::Provider;
use crate::providers::gemini::Gemini;
use crate::transliteration::{
    ApiKeyPool, CancellationFlag, ChunkProcessor, GenerativeTextClient, JsonFileStore, RunSummary,
    TransliterationPipeline, TransliterationStore, VerificationPipeline, VerificationSummary,
};

/// Result of looking up one catalog entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupResult {
    pub item: NamedItem,
    pub transliteration: Option<String>,
}

/// How interrupt handling ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptAction {
    /// A second interrupt arrived while the run was stopping
    ForceExit,
    /// The signal source failed or closed
    Unavailable,
}

/// Cancel on the first interrupt and ask for a forced exit on the second
///
/// `next_signal` resolves once per interrupt, for example `tokio::signal::ctrl_c`.
pub async fn watch_interrupts<F, Fut>(mut next_signal: F, cancellation: CancellationFlag) -> InterruptAction
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    let mut interrupted = false;

    loop {
        if let Err(e) = next_signal().await {
            warn!("Interrupt handling unavailable: {}", e);
            return InterruptAction::Unavailable;
        }

        if interrupted {
            warn!("Interrupted again, exiting now");
            return InterruptAction::ForceExit;
        }

        warn!("Interrupted, stopping after the current chunk (press Ctrl-C again to exit now)");
        cancellation.cancel();
        interrupted = true;
    }
}

/// Main application controller
pub struct Controller {
    config: Config,
    cancellation: CancellationFlag,
    cache: MasterDataCache,
}

impl Controller {
    /// Create a new controller with the given configuration
    pub fn with_config(config: Config) -> Result<Self> {
        config.validate()?;
        let cache = MasterDataCache::with_defaults(&config.transliteration.data_dir);

        Ok(Self {
            config,
            cancellation: CancellationFlag::new(),
            cache,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Flag that stops running pipelines between chunks
    pub fn cancellation(&self) -> CancellationFlag {
        self.cancellation.clone()
    }

    /// Key pool from the CLI/environment value or the config file
    pub fn key_pool(&self, cli_keys: Option<&str>) -> Result<ApiKeyPool> {
        let keys = self.config.resolve_api_keys(cli_keys);
        ApiKeyPool::new(keys).context("Set GOOGLE_API_KEY or gemini.api_keys in the config file")
    }

    /// Gemini-backed generation client configured from the config file
    pub fn gemini_client(&self) -> GenerativeTextClient<Gemini> {
        let gemini = &self.config.gemini;
        let provider = Gemini::new(
            gemini.endpoint.clone(),
            gemini.model.clone(),
            gemini.temperature,
            Duration::from_secs(gemini.timeout_secs),
        );
        GenerativeTextClient::with_policy(provider, self.config.retry_policy())
    }

    fn load_master(&self) -> Result<MasterData> {
        let path = &self.config.transliteration.master_path;
        MasterData::load(path).with_context(|| format!("Failed to load catalog from {:?}", path))
    }

    fn load_template(&self, path: &Path) -> Result<String> {
        FileManager::read_to_string(path).with_context(|| format!("Failed to load prompt template {:?}", path))
    }

    fn store(&self, class: ItemClass) -> JsonFileStore {
        JsonFileStore::new(self.config.transliteration.store_path(class))
    }

    fn progress_bar(class: ItemClass) -> ProgressBar {
        let progress_bar = ProgressBar::new(0);
        let template_result = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg} {eta}")
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        progress_bar.set_style(template_result.progress_chars("█▓▒░"));
        progress_bar.set_message(class.to_string());
        progress_bar
    }

    fn processor<'a, P: Provider>(
        &self,
        client: &'a GenerativeTextClient<P>,
        keys: &'a ApiKeyPool,
        progress_bar: &ProgressBar,
    ) -> ChunkProcessor<'a, P> {
        let pb = progress_bar.clone();
        ChunkProcessor::new(client, keys, self.config.pipeline_settings())
            .with_cancellation(self.cancellation.clone())
            .with_progress(move |completed, total| {
                pb.set_length(total as u64);
                pb.set_position(completed as u64);
            })
    }

    /// Transliterate every selected class with Gemini
    pub async fn run_transliteration(&self, cli_keys: Option<&str>) -> Result<Vec<RunSummary>> {
        let keys = self.key_pool(cli_keys)?;
        let client = self.gemini_client();
        info!("🚀 Transliterating with {}", client.provider().model());
        self.transliterate_with(&client, &keys).await
    }

    /// Transliterate every selected class with the given client
    pub async fn transliterate_with<P: Provider>(
        &self,
        client: &GenerativeTextClient<P>,
        keys: &ApiKeyPool,
    ) -> Result<Vec<RunSummary>> {
        let start_time = Instant::now();
        let master = self.load_master()?;
        let template = self.load_template(&self.config.transliteration.prompt_path)?;

        let mut summaries = Vec::new();
        for class in self.config.transliteration.selected_classes() {
            if self.cancellation.is_cancelled() {
                warn!("Skipping {} after cancellation", class);
                break;
            }

            let progress_bar = Self::progress_bar(class);
            let pipeline = TransliterationPipeline::new(self.processor(client, keys, &progress_bar));
            let result = pipeline.run(class, master.items(class), &self.store(class), &template).await;
            progress_bar.finish_and_clear();

            summaries.push(result.with_context(|| format!("Transliteration of {} failed", class))?);
        }

        info!("Finished in {:.1}s, {}", start_time.elapsed().as_secs_f64(), client.stats().summary());
        Ok(summaries)
    }

    /// Verify every selected class with Gemini
    pub async fn run_verification(&self, cli_keys: Option<&str>) -> Result<Vec<VerificationSummary>> {
        let keys = self.key_pool(cli_keys)?;
        let client = self.gemini_client();
        info!("🔍 Verifying with {}", client.provider().model());
        self.verify_with(&client, &keys).await
    }

    /// Verify every selected class with the given client
    pub async fn verify_with<P: Provider>(
        &self,
        client: &GenerativeTextClient<P>,
        keys: &ApiKeyPool,
    ) -> Result<Vec<VerificationSummary>> {
        let start_time = Instant::now();
        let master = self.load_master()?;
        let template = self.load_template(&self.config.transliteration.verify_prompt_path)?;

        let mut summaries = Vec::new();
        for class in self.config.transliteration.selected_classes() {
            if self.cancellation.is_cancelled() {
                warn!("Skipping {} after cancellation", class);
                break;
            }

            let progress_bar = Self::progress_bar(class);
            let pipeline = VerificationPipeline::new(self.processor(client, keys, &progress_bar));
            let result = pipeline.run(class, master.items(class), &self.store(class), &template).await;
            progress_bar.finish_and_clear();

            summaries.push(result.with_context(|| format!("Verification of {} failed", class))?);
        }

        info!("Finished in {:.1}s, {}", start_time.elapsed().as_secs_f64(), client.stats().summary());
        Ok(summaries)
    }

    /// Bundle the stored transliterations into a `master.en.json` file
    ///
    /// Entries whose item is no longer in the catalog are left out.
    pub fn export(&self, destination: &Path) -> Result<TranslationsData> {
        let master = self.load_master()?;
        let mut bundle = TranslationsData {
            version: master.version,
            ..Default::default()
        };

        for class in ItemClass::ALL {
            let store = self.store(class);
            let stored = store.load()?;
            let stored_count = stored.len();

            let exported: std::collections::BTreeMap<u64, String> = stored
                .into_iter()
                .filter(|(id, name)| !name.is_empty() && master.find(class, *id).is_some())
                .collect();

            if exported.len() < stored_count {
                warn!("Skipped {} {} entries not in the catalog", stored_count - exported.len(), class);
            }
            info!("Exporting {} of {} {}", exported.len(), master.items(class).len(), class);
            bundle.set(class, exported);
        }

        bundle.save(destination)?;
        info!("Wrote {}", destination.display());
        Ok(bundle)
    }

    /// Find one item of a library together with its transliteration
    pub fn lookup(&self, library: &str, class: ItemClass, id: u64) -> Result<Option<LookupResult>> {
        let cached = self.cache
            .get(library)?
            .ok_or_else(|| anyhow!("Library '{}' not found under {:?}", library, self.config.transliteration.data_dir))?;

        Ok(cached.master.find(class, id).map(|item| LookupResult {
            item: item.clone(),
            transliteration: cached
                .translations
                .as_ref()
                .and_then(|t| t.transliteration(class, id))
                .map(str::to_string),
        }))
    }
}
