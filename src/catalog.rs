/*!
 * Catalog master data.
 *
 * The catalog provider publishes a master dataset of authors, books and
 * categories keyed by numeric id. This module holds the types the
 * transliteration pipelines consume, the `master.en.json` bundle they
 * feed, and a TTL cache over both files for repeated lookups.
 */

use anyhow::{Context, Result};
use log::debug;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::file_utils::FileManager;

/// One catalog entity eligible for transliteration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedItem {
    /// Numeric id, unique within its item class
    pub id: u64,
    /// Original (Arabic) name
    pub name: String,
}

impl NamedItem {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self { id, name: name.into() }
    }
}

/// The three catalog entity kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemClass {
    Authors,
    Books,
    Categories,
}

impl ItemClass {
    /// Every class, in processing order
    pub const ALL: [ItemClass; 3] = [ItemClass::Authors, ItemClass::Books, ItemClass::Categories];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Authors => "authors",
            Self::Books => "books",
            Self::Categories => "categories",
        }
    }

    /// File name of the persisted transliteration map for this class
    pub fn store_file_name(&self) -> String {
        format!("{}_tr.json", self.as_str())
    }
}

impl std::fmt::Display for ItemClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ItemClass {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "authors" => Ok(Self::Authors),
            "books" => Ok(Self::Books),
            "categories" => Ok(Self::Categories),
            _ => Err(anyhow::anyhow!("Invalid item class: {}", s)),
        }
    }
}

/// Master dataset published by the catalog provider
///
/// Entries carry more fields upstream (deletion flags, biographies, author
/// references); only `id` and `name` are kept.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MasterData {
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub authors: Vec<NamedItem>,
    #[serde(default)]
    pub books: Vec<NamedItem>,
    #[serde(default)]
    pub categories: Vec<NamedItem>,
}

impl MasterData {
    /// Load the dataset from a `master.json` file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = FileManager::read_to_string(&path)?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse master data: {:?}", path.as_ref()))
    }

    /// Items of one class
    pub fn items(&self, class: ItemClass) -> &[NamedItem] {
        match class {
            ItemClass::Authors => &self.authors,
            ItemClass::Books => &self.books,
            ItemClass::Categories => &self.categories,
        }
    }

    /// Find one item by id
    pub fn find(&self, class: ItemClass, id: u64) -> Option<&NamedItem> {
        self.items(class).iter().find(|item| item.id == id)
    }
}

/// Transliterations of one class inside the `master.en.json` bundle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassTranslations {
    #[serde(default)]
    pub transliterations: BTreeMap<u64, String>,
}

/// The `master.en.json` bundle that ships transliterations next to the master data
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranslationsData {
    #[serde(default)]
    pub version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authors: Option<ClassTranslations>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub books: Option<ClassTranslations>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<ClassTranslations>,
}

impl TranslationsData {
    /// Load a bundle from disk
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = FileManager::read_to_string(&path)?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse translations: {:?}", path.as_ref()))
    }

    /// Write the bundle as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize translations")?;
        FileManager::write_atomic(path, &json)
    }

    /// Replace the transliterations of one class
    pub fn set(&mut self, class: ItemClass, transliterations: BTreeMap<u64, String>) {
        let entry = Some(ClassTranslations { transliterations });
        match class {
            ItemClass::Authors => self.authors = entry,
            ItemClass::Books => self.books = entry,
            ItemClass::Categories => self.categories = entry,
        }
    }

    /// Transliteration of one item, if known
    pub fn transliteration(&self, class: ItemClass, id: u64) -> Option<&str> {
        let section = match class {
            ItemClass::Authors => self.authors.as_ref(),
            ItemClass::Books => self.books.as_ref(),
            ItemClass::Categories => self.categories.as_ref(),
        };
        section.and_then(|s| s.transliterations.get(&id)).map(String::as_str)
    }
}

/// Time source for cache expiry
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A library's master data together with its optional translations bundle
#[derive(Debug, Clone)]
pub struct CachedLibrary {
    pub master: Arc<MasterData>,
    pub translations: Option<Arc<TranslationsData>>,
    pub loaded_at: Instant,
}

/// Per-library cache of `master.json` / `master.en.json`
///
/// Layout on disk: `<data_dir>/libraries/<library>/master.json` and an
/// optional `master.en.json` beside it.
pub struct MasterDataCache {
    data_dir: PathBuf,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: RwLock<HashMap<String, CachedLibrary>>,
}

impl MasterDataCache {
    /// Default time-to-live of a cached library
    pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

    pub fn new(data_dir: impl Into<PathBuf>, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ttl,
            clock,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Cache backed by the wall clock and the default TTL
    pub fn with_defaults(data_dir: impl Into<PathBuf>) -> Self {
        Self::new(data_dir, Self::DEFAULT_TTL, Arc::new(SystemClock))
    }

    fn library_dir(&self, library: &str) -> PathBuf {
        self.data_dir.join("libraries").join(library)
    }

    /// Get a library, reloading it when absent or older than the TTL
    ///
    /// Returns `Ok(None)` when the library has no `master.json`.
    pub fn get(&self, library: &str) -> Result<Option<CachedLibrary>> {
        let now = self.clock.now();

        if let Some(cached) = self.entries.read().get(library) {
            if now.duration_since(cached.loaded_at) < self.ttl {
                return Ok(Some(cached.clone()));
            }
        }

        let dir = self.library_dir(library);
        let master_path = dir.join("master.json");
        if !FileManager::file_exists(&master_path) {
            return Ok(None);
        }

        debug!("Loading master data for library '{}'", library);
        let master = MasterData::load(&master_path)?;

        let translations_path = dir.join("master.en.json");
        let translations = if FileManager::file_exists(&translations_path) {
            Some(Arc::new(TranslationsData::load(&translations_path)?))
        } else {
            None
        };

        let library_entry = CachedLibrary {
            master: Arc::new(master),
            translations,
            loaded_at: now,
        };
        self.entries.write().insert(library.to_string(), library_entry.clone());

        Ok(Some(library_entry))
    }

    /// Drop one library, or everything when `library` is `None`
    pub fn clear(&self, library: Option<&str>) {
        let mut entries = self.entries.write();
        match library {
            Some(name) => {
                entries.remove(name);
            }
            None => entries.clear(),
        }
    }
}
