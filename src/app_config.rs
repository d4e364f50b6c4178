use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::catalog::ItemClass;
use crate::file_utils::FileManager;
use crate::providers::gemini::DEFAULT_ENDPOINT;
use crate::transliteration::client::{GenerationOptions, RetryPolicy};
use crate::transliteration::pipeline::{PipelineSettings, DEFAULT_CHUNK_SIZE, DEFAULT_PLACEHOLDER};

/// Application configuration module
/// This module handles loading, validating and saving the `conf.json` settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// Gemini backend settings
    #[serde(default)]
    pub gemini: GeminiConfig,

    /// Pipeline settings
    #[serde(default)]
    pub transliteration: TransliterationConfig,

    /// Delays between generation attempts
    #[serde(default)]
    pub retry: RetryConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Gemini service configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GeminiConfig {
    /// Model name
    #[serde(default = "default_gemini_model")]
    pub model: String,

    /// API base URL
    #[serde(default = "default_gemini_endpoint")]
    pub endpoint: String,

    /// API keys used in rotation; `GOOGLE_API_KEY` takes precedence when set
    #[serde(default)]
    pub api_keys: Vec<String>,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            model: default_gemini_model(),
            endpoint: default_gemini_endpoint(),
            api_keys: Vec::new(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Transliteration run configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TransliterationConfig {
    /// Items per request
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Requests per chunk before it is left for a later run
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Token replaced by the chunk data in prompt templates
    #[serde(default = "default_placeholder")]
    pub placeholder: String,

    /// Prompt used to create transliterations
    #[serde(default = "default_prompt_path")]
    pub prompt_path: PathBuf,

    /// Prompt used to review existing transliterations
    #[serde(default = "default_verify_prompt_path")]
    pub verify_prompt_path: PathBuf,

    /// Catalog file
    #[serde(default = "default_master_path")]
    pub master_path: PathBuf,

    /// Directory holding the `<class>_tr.json` stores
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Root of the `libraries/<name>/master.json` tree used by lookups
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Save the store right after removing orphaned entries
    #[serde(default = "default_true")]
    pub persist_pruned_orphans: bool,

    /// Item classes to process, all when empty
    #[serde(default)]
    pub classes: Vec<ItemClass>,
}

impl Default for TransliterationConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            max_retries: default_max_retries(),
            placeholder: default_placeholder(),
            prompt_path: default_prompt_path(),
            verify_prompt_path: default_verify_prompt_path(),
            master_path: default_master_path(),
            output_dir: default_output_dir(),
            data_dir: default_data_dir(),
            persist_pruned_orphans: default_true(),
            classes: Vec::new(),
        }
    }
}

impl TransliterationConfig {
    /// Classes selected for a run
    pub fn selected_classes(&self) -> Vec<ItemClass> {
        if self.classes.is_empty() {
            ItemClass::ALL.to_vec()
        } else {
            self.classes.clone()
        }
    }

    /// Store file of a class inside the output directory
    pub fn store_path(&self, class: ItemClass) -> PathBuf {
        self.output_dir.join(class.store_file_name())
    }
}

/// Retry delay configuration, in milliseconds
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RetryConfig {
    #[serde(default = "default_rate_limit_base_ms")]
    pub rate_limit_base_ms: u64,

    #[serde(default = "default_rate_limit_max_ms")]
    pub rate_limit_max_ms: u64,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            rate_limit_base_ms: default_rate_limit_base_ms(),
            rate_limit_max_ms: default_rate_limit_max_ms(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_gemini_model() -> String {
    "gemini-2.5-flash-lite".to_string()
}

fn default_gemini_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_timeout_secs() -> u64 {
    600
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_max_retries() -> u32 {
    3
}

fn default_placeholder() -> String {
    DEFAULT_PLACEHOLDER.to_string()
}

fn default_prompt_path() -> PathBuf {
    PathBuf::from("prompts/transliteration.txt")
}

fn default_verify_prompt_path() -> PathBuf {
    PathBuf::from("prompts/verifyTransliterations.txt")
}

fn default_master_path() -> PathBuf {
    PathBuf::from("master.json")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_true() -> bool {
    true
}

fn default_rate_limit_base_ms() -> u64 {
    1000
}

fn default_rate_limit_max_ms() -> u64 {
    30_000
}

fn default_retry_delay_ms() -> u64 {
    2000
}

impl Config {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = FileManager::read_to_string(path)?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Write configuration as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .context("Failed to serialize config")?;
        FileManager::write_to_file(path, &json)
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        if self.gemini.model.trim().is_empty() {
            return Err(anyhow!("Gemini model name must not be empty"));
        }

        if !(0.0..=2.0).contains(&self.gemini.temperature) {
            return Err(anyhow!("Temperature must be between 0.0 and 2.0, got {}", self.gemini.temperature));
        }

        if self.gemini.timeout_secs == 0 {
            return Err(anyhow!("Request timeout must be greater than zero"));
        }

        if self.transliteration.chunk_size == 0 {
            return Err(anyhow!("Chunk size must be greater than zero"));
        }

        if self.transliteration.max_retries == 0 {
            return Err(anyhow!("Max retries must be at least 1"));
        }

        if self.transliteration.placeholder.is_empty() {
            return Err(anyhow!("Prompt placeholder must not be empty"));
        }

        if self.retry.rate_limit_base_ms > self.retry.rate_limit_max_ms {
            return Err(anyhow!(
                "Rate limit base delay ({} ms) exceeds the maximum ({} ms)",
                self.retry.rate_limit_base_ms,
                self.retry.rate_limit_max_ms
            ));
        }

        Ok(())
    }

    /// Keys from `cli_keys` (comma-separated) when given, otherwise from the file
    pub fn resolve_api_keys(&self, cli_keys: Option<&str>) -> Vec<String> {
        match cli_keys {
            Some(csv) if !csv.trim().is_empty() => csv.split(',').map(|k| k.trim().to_string()).collect(),
            _ => self.gemini.api_keys.clone(),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            rate_limit_base: Duration::from_millis(self.retry.rate_limit_base_ms),
            rate_limit_cap: Duration::from_millis(self.retry.rate_limit_max_ms),
            retry_delay: Duration::from_millis(self.retry.retry_delay_ms),
        }
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            chunk_size: self.transliteration.chunk_size,
            placeholder: self.transliteration.placeholder.clone(),
            generation: GenerationOptions {
                max_retries: self.transliteration.max_retries,
                timeout: Duration::from_secs(self.gemini.timeout_secs),
            },
            persist_pruned_orphans: self.transliteration.persist_pruned_orphans,
        }
    }
}
