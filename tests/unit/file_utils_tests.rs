/*!
 * Tests for file utility functions
 */

use anyhow::Result;
use std::path::PathBuf;

use maktaba::file_utils::FileManager;
use crate::common;

/// Test that only regular files count as existing files
#[test]
fn test_file_exists_withDirectory_shouldBeFalse() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let file = common::create_test_file(temp_dir.path(), "a.json", "{}")?;

    assert!(FileManager::file_exists(&file));
    assert!(!FileManager::file_exists(temp_dir.path()));
    assert!(!FileManager::file_exists(temp_dir.path().join("missing.json")));
    Ok(())
}

/// Test parent directory resolution
#[test]
fn test_parent_dir_withBareFileName_shouldBeCurrentDirectory() {
    assert_eq!(FileManager::parent_dir("authors_tr.json"), PathBuf::from("."));
    assert_eq!(FileManager::parent_dir("out/authors_tr.json"), PathBuf::from("out"));
}

/// Test that writing creates missing parent directories
#[test]
fn test_write_to_file_withMissingParent_shouldCreateIt() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("a").join("b").join("c.txt");

    FileManager::write_to_file(&path, "hello")?;
    assert_eq!(FileManager::read_to_string(&path)?, "hello");
    Ok(())
}

/// Test atomic replacement of an existing file
#[test]
fn test_write_atomic_shouldReplaceContentWithoutLeftovers() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_file(temp_dir.path(), "books_tr.json", "old")?;

    FileManager::write_atomic(&path, "new")?;

    assert_eq!(FileManager::read_to_string(&path)?, "new");
    let entries = std::fs::read_dir(temp_dir.path())?.count();
    assert_eq!(entries, 1, "temporary file should have been renamed into place");
    Ok(())
}

/// Test atomic writes into a directory that does not exist yet
#[test]
fn test_write_atomic_withMissingParent_shouldCreateItAndPersist() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("out").join("authors_tr.json");

    FileManager::write_atomic(&path, "{}")?;
    FileManager::write_atomic(&path, "{\n  \"1\": \"al-Bukhari\"\n}")?;

    assert_eq!(FileManager::read_to_string(&path)?, "{\n  \"1\": \"al-Bukhari\"\n}");
    assert_eq!(std::fs::read_dir(temp_dir.path().join("out"))?.count(), 1);
    Ok(())
}

/// Test the error for a missing file
#[test]
fn test_read_to_string_withMissingFile_shouldFail() {
    assert!(FileManager::read_to_string("/nonexistent/maktaba/file.txt").is_err());
}
