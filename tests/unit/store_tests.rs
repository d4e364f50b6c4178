/*!
 * Tests for transliteration stores
 */

use anyhow::Result;

use maktaba::catalog::{ItemClass, NamedItem};
use maktaba::transliteration::store::{
    prune_orphans, unprocessed, JsonFileStore, TransliterationMap, TransliterationStore,
};
use crate::common;

fn map(entries: &[(u64, &str)]) -> TransliterationMap {
    entries.iter().map(|(id, name)| (*id, name.to_string())).collect()
}

/// Test that the file format is a pretty JSON object keyed by stringified ids
#[test]
fn test_save_shouldWritePrettyJsonObject() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let store = JsonFileStore::new(temp_dir.path().join(ItemClass::Authors.store_file_name()));

    store.save(&map(&[(2, "Muslim"), (1, "al-Bukhari")]))?;

    let content = std::fs::read_to_string(store.path())?;
    assert_eq!(content, "{\n  \"1\": \"al-Bukhari\",\n  \"2\": \"Muslim\"\n}");
    Ok(())
}

/// Test reading a file written by another tool
#[test]
fn test_load_withExistingFile_shouldParseStringKeys() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_file(temp_dir.path(), "books_tr.json", r#"{"10": "Sahih al-Bukhari", "11": ""}"#)?;

    let loaded = JsonFileStore::new(path).load()?;
    assert_eq!(loaded, map(&[(10, "Sahih al-Bukhari"), (11, "")]));
    Ok(())
}

/// Test that an empty file counts as an empty map
#[test]
fn test_load_withEmptyFile_shouldReturnEmptyMap() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_file(temp_dir.path(), "categories_tr.json", "")?;

    assert!(JsonFileStore::new(path).load()?.is_empty());
    Ok(())
}

/// Test that commits never lose earlier entries
#[test]
fn test_commit_repeatedly_shouldAccumulate() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let store = JsonFileStore::new(temp_dir.path().join("authors_tr.json"));

    store.commit(&map(&[(1, "a")]))?;
    store.commit(&map(&[(2, "b")]))?;
    store.commit(&map(&[(1, "A")]))?;

    assert_eq!(store.load()?, map(&[(1, "A"), (2, "b")]));
    Ok(())
}

/// Test pruning and the unprocessed filter together
#[test]
fn test_prune_then_unprocessed_shouldOnlyReturnMissingCatalogItems() {
    let items = vec![NamedItem::new(1, "a"), NamedItem::new(2, "b"), NamedItem::new(3, "c")];
    let saved = map(&[(1, "A"), (3, ""), (42, "orphan")]);

    let pruned = prune_orphans(&items, saved);
    assert_eq!(pruned, map(&[(1, "A"), (3, "")]));

    let pending = unprocessed(&items, &pruned);
    assert_eq!(pending.iter().map(|i| i.id).collect::<Vec<_>>(), vec![2, 3]);
}

/// Test that a key which is not a numeric id is dropped instead of failing the load
#[test]
fn test_load_withNonNumericKey_shouldDropAsOrphan() -> Result<()> {
    common::init_logging();
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_file(temp_dir.path(), "authors_tr.json", r#"{"1": "al-Bukhari", "NaN": "stray"}"#)?;
    let store = JsonFileStore::new(path);

    assert_eq!(store.load()?, map(&[(1, "al-Bukhari")]));

    let (loaded, dropped) = store.load_counting_dropped()?;
    assert_eq!(loaded, map(&[(1, "al-Bukhari")]));
    assert_eq!(dropped, 1);
    Ok(())
}

/// Test that a save followed by a load returns the same map
#[test]
fn test_save_thenLoad_shouldReturnSameMap() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let store = JsonFileStore::new(temp_dir.path().join("nested").join("books_tr.json"));
    let written = map(&[(10, "Sahih al-Bukhari"), (11, "Sahih Muslim")]);

    store.save(&written)?;
    store.save(&written)?;

    assert_eq!(store.load()?, written);
    let leftovers = std::fs::read_dir(temp_dir.path().join("nested"))?.count();
    assert_eq!(leftovers, 1);
    Ok(())
}
