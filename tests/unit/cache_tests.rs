/*!
 * Tests for the persistent translation cache
 */

use titlewai::translation::{StoreOutcome, TranslationCache, normalize_title};

use crate::common;

#[tokio::test]
async fn test_open_withMissingNestedDirectory_shouldCreateFile() {
    let dir = common::create_temp_dir().unwrap();
    let path = dir.path().join("nested").join("deeper").join("cache.db");

    let cache = TranslationCache::open(&path, "en");

    assert!(cache.is_persistent());
    assert!(path.exists());
}

#[tokio::test]
async fn test_store_shouldSurviveReopen() {
    let dir = common::create_temp_dir().unwrap();
    let path = dir.path().join("cache.db");

    {
        let cache = TranslationCache::open(&path, "en");
        let outcome = cache.store("བཀའ་འགྱུར།", "Kangyur").await.unwrap();
        assert_eq!(outcome, StoreOutcome::Inserted);
    }

    let reopened = TranslationCache::open(&path, "en");
    assert_eq!(reopened.lookup("བཀའ་འགྱུར།").await, Some("Kangyur".to_string()));
}

#[tokio::test]
async fn test_sameFile_withOtherTargetLanguage_shouldNotShareEntries() {
    let dir = common::create_temp_dir().unwrap();
    let path = dir.path().join("cache.db");

    TranslationCache::open(&path, "en").store("title", "Title").await.unwrap();
    let french = TranslationCache::open(&path, "fr");

    assert_eq!(french.lookup("title").await, None);
    assert_eq!(french.stats().await.unwrap().total_entries, 0);
}

#[tokio::test]
async fn test_conflicts_shouldListNewestFirstWithLimit() {
    let cache = TranslationCache::in_memory("en");
    cache.store("t", "first").await.unwrap();
    cache.store("t", "second").await.unwrap();
    cache.store("t", "third").await.unwrap();

    let conflicts = cache.conflicts(1).await.unwrap();

    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].previous_translation, "second");
    assert_eq!(conflicts[0].new_translation, "third");
    assert_eq!(cache.stats().await.unwrap().total_conflicts, 2);
    assert_eq!(cache.lookup("t").await, Some("third".to_string()));
}

#[tokio::test]
async fn test_stats_shouldCountHits() {
    let cache = TranslationCache::in_memory("en");
    cache.store("a", "A").await.unwrap();
    cache.store("b", "B").await.unwrap();

    cache.lookup("a").await;
    cache.lookup("a").await;
    cache.lookup("missing").await;

    let stats = cache.stats().await.unwrap();
    assert_eq!(stats.total_entries, 2);
    assert_eq!(stats.total_hits, 2);
}

#[tokio::test]
async fn test_normalizedKeys_shouldMatchWhitespaceVariants() {
    let cache = TranslationCache::in_memory("en");
    cache.store(&normalize_title("  ཐར་པ་ \u{3000} རིན་པོ་ཆེ "), "Precious Liberation").await.unwrap();

    let hit = cache.lookup(&normalize_title("ཐར་པ་\tརིན་པོ་ཆེ")).await;

    assert_eq!(hit, Some("Precious Liberation".to_string()));
}

#[tokio::test]
async fn test_reopen_withThreeLetterTag_shouldReuseTwoLetterEntries() {
    let dir = common::create_temp_dir().unwrap();
    let path = dir.path().join("cache.db");

    TranslationCache::open(&path, "en").store("བཀའ་འགྱུར།", "Kangyur").await.unwrap();
    let reopened = TranslationCache::open(&path, "eng");

    assert_eq!(reopened.lookup("བཀའ་འགྱུར།").await, Some("Kangyur".to_string()));
    assert_eq!(reopened.stats().await.unwrap().total_entries, 1);
}
