/*!
 * Integration tests for application lifecycle
 */

use anyhow::Result;
use std::collections::BTreeMap;

use maktaba::app_config::Config;
use maktaba::app_controller::{watch_interrupts, Controller, InterruptAction};
use maktaba::catalog::{ItemClass, TranslationsData};
use maktaba::providers::mock::MockProvider;
use maktaba::transliteration::{
    CancellationFlag, GenerativeTextClient, JsonFileStore, TransliterationMap, TransliterationStore,
};
use crate::common;

/// Signal source that delivers `count` interrupts and then reports itself closed
fn scripted_signals(count: usize) -> impl FnMut() -> std::future::Ready<std::io::Result<()>> {
    let mut remaining = count;
    move || {
        let signal = if remaining > 0 {
            remaining -= 1;
            Ok(())
        } else {
            Err(std::io::Error::other("signal stream closed"))
        };
        std::future::ready(signal)
    }
}

/// Test the controller initialization with default config
#[test]
fn test_controller_initialization_withDefaultConfig_shouldSucceed() -> Result<()> {
    let controller = Controller::with_config(Config::default())?;
    assert_eq!(controller.config().transliteration.chunk_size, 300);
    Ok(())
}

/// Test that an invalid configuration is rejected up front
#[test]
fn test_controller_initialization_withInvalidConfig_shouldFail() {
    let mut config = Config::default();
    config.transliteration.chunk_size = 0;
    assert!(Controller::with_config(config).is_err());
}

/// Test key resolution from the CLI value and the config file
#[test]
fn test_key_pool_withoutAnyKeys_shouldFail() -> Result<()> {
    let controller = Controller::with_config(Config::default())?;
    assert!(controller.key_pool(None).is_err());
    assert_eq!(controller.key_pool(Some("a,b,c"))?.size(), 3);
    Ok(())
}

/// Test a full run over every class followed by an export
#[tokio::test]
async fn test_transliterate_then_export_shouldProduceBundle() -> Result<()> {
    common::init_logging();
    let temp_dir = common::create_temp_dir()?;
    let config = common::create_test_config(temp_dir.path())?;
    let controller = Controller::with_config(config)?;

    let client = GenerativeTextClient::new(MockProvider::working());
    let keys = controller.key_pool(Some("k1,k2"))?;
    let summaries = controller.transliterate_with(&client, &keys).await?;

    assert_eq!(summaries.len(), 3);
    assert_eq!(summaries.iter().map(|s| s.items_committed).sum::<usize>(), 5);
    assert_eq!(client.provider().request_count(), 3);

    let authors = JsonFileStore::new(temp_dir.path().join("out").join("authors_tr.json")).load()?;
    assert_eq!(authors.get(&1).map(String::as_str), Some("tr:البخاري"));

    let destination = temp_dir.path().join("master.en.json");
    let bundle = controller.export(&destination)?;
    assert_eq!(bundle.version, 7);

    let reloaded = TranslationsData::load(&destination)?;
    assert_eq!(reloaded, bundle);
    assert_eq!(reloaded.transliteration(ItemClass::Categories, 100), Some("tr:كتب السنة"));
    Ok(())
}

/// Test that only the configured classes are processed
#[tokio::test]
async fn test_transliterate_withClassFilter_shouldSkipOtherClasses() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let mut config = common::create_test_config(temp_dir.path())?;
    config.transliteration.classes = vec![ItemClass::Books];
    let controller = Controller::with_config(config)?;

    let client = GenerativeTextClient::new(MockProvider::working());
    let keys = controller.key_pool(Some("k"))?;
    let summaries = controller.transliterate_with(&client, &keys).await?;

    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].class, ItemClass::Books);
    assert!(!temp_dir.path().join("out").join("authors_tr.json").exists());
    Ok(())
}

/// Test that a cancelled controller does not start any class
#[tokio::test]
async fn test_transliterate_afterCancellation_shouldDoNothing() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let controller = Controller::with_config(common::create_test_config(temp_dir.path())?)?;
    controller.cancellation().cancel();

    let client = GenerativeTextClient::new(MockProvider::working());
    let keys = controller.key_pool(Some("k"))?;
    let summaries = controller.transliterate_with(&client, &keys).await?;

    assert!(summaries.is_empty());
    assert_eq!(client.provider().request_count(), 0);
    Ok(())
}

/// Test that a verification pass sends every stored entry
#[tokio::test]
async fn test_verify_withStoredEntries_shouldSendThem() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let mut config = common::create_test_config(temp_dir.path())?;
    config.transliteration.classes = vec![ItemClass::Authors];
    let controller = Controller::with_config(config)?;

    JsonFileStore::new(temp_dir.path().join("out").join("authors_tr.json"))
        .save(&TransliterationMap::from([(1, "al-Bukhari".to_string())]))?;

    let client = GenerativeTextClient::new(MockProvider::working().with_custom_response(|_| "OK".to_string()));
    let keys = controller.key_pool(Some("k"))?;
    let summaries = controller.verify_with(&client, &keys).await?;

    assert_eq!(summaries[0].chunks_clean, 1);
    assert_eq!(client.provider().calls()[0].prompt, "Verify:\n1,البخاري,al-Bukhari\n2,مسلم,");
    Ok(())
}

/// Test that export leaves out entries for items that left the catalog
#[test]
fn test_export_withOrphanedEntries_shouldSkipThem() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let controller = Controller::with_config(common::create_test_config(temp_dir.path())?)?;

    JsonFileStore::new(temp_dir.path().join("out").join("books_tr.json")).save(&TransliterationMap::from([
        (10, "Sahih al-Bukhari".to_string()),
        (999, "Removed Book".to_string()),
    ]))?;

    let bundle = controller.export(&temp_dir.path().join("master.en.json"))?;

    let books = bundle.books.expect("books section should be present");
    assert_eq!(books.transliterations, BTreeMap::from([(10, "Sahih al-Bukhari".to_string())]));
    assert!(bundle.authors.expect("authors section should be present").transliterations.is_empty());
    Ok(())
}

/// Test lookup through the library cache
#[test]
fn test_lookup_withExportedBundle_shouldReturnTransliteration() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let config = common::create_test_config(temp_dir.path())?;
    let library_dir = config.transliteration.data_dir.join("libraries").join("shamela");
    common::create_test_file(&library_dir, "master.json", common::SAMPLE_MASTER)?;

    let mut bundle = TranslationsData { version: 7, ..Default::default() };
    bundle.set(ItemClass::Authors, BTreeMap::from([(2, "Muslim".to_string())]));
    bundle.save(library_dir.join("master.en.json"))?;

    let controller = Controller::with_config(config)?;

    let found = controller.lookup("shamela", ItemClass::Authors, 2)?.expect("author 2 exists");
    assert_eq!(found.item.name, "مسلم");
    assert_eq!(found.transliteration.as_deref(), Some("Muslim"));

    let untranslated = controller.lookup("shamela", ItemClass::Authors, 1)?.expect("author 1 exists");
    assert_eq!(untranslated.transliteration, None);

    assert!(controller.lookup("shamela", ItemClass::Books, 12345)?.is_none());
    assert!(controller.lookup("unknown", ItemClass::Books, 10).is_err());
    Ok(())
}

/// Test that a second interrupt asks for a forced exit after the first one cancelled
#[tokio::test]
async fn test_watch_interrupts_withTwoSignals_shouldCancelThenForceExit() {
    let cancellation = CancellationFlag::new();

    let action = watch_interrupts(scripted_signals(2), cancellation.clone()).await;

    assert_eq!(action, InterruptAction::ForceExit);
    assert!(cancellation.is_cancelled());
}

/// Test that a single interrupt only cancels and keeps waiting
#[tokio::test]
async fn test_watch_interrupts_withOneSignal_shouldOnlyCancel() {
    let cancellation = CancellationFlag::new();

    let action = watch_interrupts(scripted_signals(1), cancellation.clone()).await;

    assert_eq!(action, InterruptAction::Unavailable);
    assert!(cancellation.is_cancelled());
}

/// Test that a failing signal source leaves the run alone
#[tokio::test]
async fn test_watch_interrupts_withClosedSource_shouldNotCancel() {
    let cancellation = CancellationFlag::new();

    let action = watch_interrupts(scripted_signals(0), cancellation.clone()).await;

    assert_eq!(action, InterruptAction::Unavailable);
    assert!(!cancellation.is_cancelled());
}

/// Test that verification summaries name their class
#[tokio::test]
async fn test_verify_withSeveralClasses_shouldReportEachClass() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let mut config = common::create_test_config(temp_dir.path())?;
    config.transliteration.classes = vec![ItemClass::Books, ItemClass::Authors];
    let controller = Controller::with_config(config)?;

    let client = GenerativeTextClient::new(MockProvider::working().with_custom_response(|_| "OK".to_string()));
    let keys = controller.key_pool(Some("k"))?;
    let summaries = controller.verify_with(&client, &keys).await?;

    let classes: Vec<ItemClass> = summaries.iter().map(|s| s.class).collect();
    assert_eq!(classes, controller.config().transliteration.selected_classes());
    Ok(())
}
