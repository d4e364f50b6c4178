/*!
 * Persisted transliteration maps.
 *
 * Each item class owns one `id -> transliteration` map. Commits are
 * merge-writes: the full map is read, the delta overlaid, and the full
 * result written back, so the persisted map is always complete and valid.
 */

use log::{debug, warn};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use crate::catalog::NamedItem;
use crate::errors::TransliterationError;
use crate::file_utils::FileManager;

/// Transliterations of one item class, keyed by item id
pub type TransliterationMap = BTreeMap<u64, String>;

/// Storage backend for one class's transliteration map
pub trait TransliterationStore: Send + Sync {
    /// Read the persisted map; empty when nothing was persisted yet
    fn load(&self) -> Result<TransliterationMap, TransliterationError>;

    /// Replace the persisted map with `map`
    fn save(&self, map: &TransliterationMap) -> Result<(), TransliterationError>;

    /// Human-readable location used in log lines
    fn location(&self) -> String;

    /// Read the persisted map and the number of unusable entries dropped while reading
    fn load_counting_dropped(&self) -> Result<(TransliterationMap, usize), TransliterationError> {
        Ok((self.load()?, 0))
    }

    /// Merge `delta` into the persisted map, delta entries winning, and write it back whole
    fn commit(&self, delta: &TransliterationMap) -> Result<TransliterationMap, TransliterationError> {
        let mut merged = self.load()?;
        merged.extend(delta.iter().map(|(id, name)| (*id, name.clone())));
        self.save(&merged)?;
        Ok(merged)
    }
}

/// Store keeping the map in a pretty-printed JSON file
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse the file, dropping entries whose key is not a numeric id
    fn read_entries(&self) -> Result<(TransliterationMap, usize), TransliterationError> {
        if !FileManager::file_exists(&self.path) {
            return Ok((TransliterationMap::new(), 0));
        }

        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok((TransliterationMap::new(), 0));
        }

        let raw: BTreeMap<String, String> = serde_json::from_str(&content).map_err(|e| {
            TransliterationError::Storage(format!("Failed to parse {:?}: {}", self.path, e))
        })?;

        let mut dropped = 0;
        let map = raw.into_iter()
            .filter_map(|(key, name)| match key.trim().parse::<u64>() {
                Ok(id) => Some((id, name)),
                Err(_) => {
                    warn!("Removing orphaned {}", key);
                    dropped += 1;
                    None
                }
            })
            .collect();

        Ok((map, dropped))
    }
}

impl TransliterationStore for JsonFileStore {
    fn load(&self) -> Result<TransliterationMap, TransliterationError> {
        self.read_entries().map(|(map, _)| map)
    }

    fn load_counting_dropped(&self) -> Result<(TransliterationMap, usize), TransliterationError> {
        self.read_entries()
    }

    fn save(&self, map: &TransliterationMap) -> Result<(), TransliterationError> {
        let json = serde_json::to_string_pretty(map)?;
        FileManager::write_atomic(&self.path, &json)
            .map_err(|e| TransliterationError::Storage(format!("{:#}", e)))?;
        debug!("Wrote {} transliterations to {:?}", map.len(), self.path);
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// Store keeping the map in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    map: Mutex<TransliterationMap>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing map
    pub fn with_entries(map: TransliterationMap) -> Self {
        Self { map: Mutex::new(map) }
    }

    /// Copy of the current map
    pub fn snapshot(&self) -> TransliterationMap {
        self.map.lock().clone()
    }
}

impl TransliterationStore for MemoryStore {
    fn load(&self) -> Result<TransliterationMap, TransliterationError> {
        Ok(self.map.lock().clone())
    }

    fn save(&self, map: &TransliterationMap) -> Result<(), TransliterationError> {
        *self.map.lock() = map.clone();
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

/// Drop entries whose id is no longer present in the catalog
pub fn prune_orphans(items: &[NamedItem], map: TransliterationMap) -> TransliterationMap {
    let ids: HashSet<u64> = items.iter().map(|item| item.id).collect();

    map.into_iter()
        .filter(|(id, _)| {
            let keep = ids.contains(id);
            if !keep {
                warn!("Removing orphaned {}", id);
            }
            keep
        })
        .collect()
}

/// Items that have no transliteration yet
///
/// An empty transliteration counts as missing.
pub fn unprocessed(items: &[NamedItem], map: &TransliterationMap) -> Vec<NamedItem> {
    items.iter()
        .filter(|item| map.get(&item.id).is_none_or(|name| name.is_empty()))
        .cloned()
        .collect()
}
