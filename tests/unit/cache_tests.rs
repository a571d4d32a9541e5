/*!
 * Tests for translation cache functionality
 */

use std::sync::Arc;
use std::time::Duration;

use doctrans::translation::TranslationCache;
use doctrans::translation::TranslationUnit;

#[test]
fn test_cache_set_withEnabledCache_shouldStoreTranslation() {
    let cache = TranslationCache::default();
    cache.set("hello", "bonjour", "fr", "m");

    assert_eq!(cache.get("hello", "fr", "m"), Some("bonjour".to_string()));
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_cache_get_withMissingKey_shouldReturnNone() {
    let cache = TranslationCache::default();
    assert!(cache.get("nonexistent", "fr", "m").is_none());
    assert_eq!(cache.stats().misses, 1);
}

#[test]
fn test_cache_get_withDifferentTargetOrModel_shouldReturnNone() {
    let cache = TranslationCache::default();
    cache.set("hello", "bonjour", "fr", "m");

    assert!(cache.get("hello", "es", "m").is_none());
    assert!(cache.get("hello", "fr", "other-model").is_none());
}

#[test]
fn test_cache_get_withDifferentCaseAndWhitespace_shouldHit() {
    let cache = TranslationCache::default();
    cache.set("Hello World", "Bonjour le monde", "fr", "m");

    assert_eq!(cache.get("  hello world\n", "fr", "m"), Some("Bonjour le monde".to_string()));
}

#[test]
fn test_cache_disabled_shouldNeverStore() {
    let cache = TranslationCache::disabled();
    cache.set("hello", "bonjour", "fr", "m");

    assert!(cache.get("hello", "fr", "m").is_none());
    assert!(cache.is_empty());
    assert!(!cache.is_enabled());
}

#[test]
fn test_cache_set_overCapacity_shouldEvictLeastRecentlyUsed() {
    let cache = TranslationCache::new(2, Duration::from_secs(3600));
    cache.set("a", "A", "fr", "m");
    cache.set("b", "B", "fr", "m");

    // Touch "a" so "b" becomes the eviction candidate
    assert!(cache.get("a", "fr", "m").is_some());
    cache.set("c", "C", "fr", "m");

    assert_eq!(cache.len(), 2);
    assert!(cache.get("b", "fr", "m").is_none());
    assert_eq!(cache.get("a", "fr", "m"), Some("A".to_string()));
    assert_eq!(cache.get("c", "fr", "m"), Some("C".to_string()));
    assert_eq!(cache.stats().evictions, 1);
}

#[tokio::test(start_paused = true)]
async fn test_cache_get_afterTtl_shouldExpire() {
    let cache = TranslationCache::new(10, Duration::from_secs(60));
    cache.set("hello", "bonjour", "fr", "m");

    tokio::time::advance(Duration::from_secs(59)).await;
    assert!(cache.get("hello", "fr", "m").is_some());

    tokio::time::advance(Duration::from_secs(1)).await;
    assert!(cache.get("hello", "fr", "m").is_none());
    assert!(cache.is_empty());
    assert_eq!(cache.stats().expirations, 1);
}

#[tokio::test(start_paused = true)]
async fn test_cache_cleanup_shouldDropOnlyExpiredEntries() {
    let cache = TranslationCache::new(10, Duration::from_secs(60));
    cache.set("old", "vieux", "fr", "m");
    tokio::time::advance(Duration::from_secs(45)).await;
    cache.set("new", "nouveau", "fr", "m");
    tokio::time::advance(Duration::from_secs(30)).await;

    assert_eq!(cache.cleanup(), 1);
    assert_eq!(cache.len(), 1);
    assert!(cache.get("new", "fr", "m").is_some());
}

#[test]
fn test_cache_getBatch_shouldPartitionHitsAndMisses() {
    let cache = TranslationCache::default();
    cache.set("one", "un", "fr", "m");
    cache.set("three", "trois", "fr", "big");

    let units = vec![
        TranslationUnit::new("1", "one", "fr"),
        TranslationUnit::new("2", "two", "fr"),
        TranslationUnit::new("3", "three", "fr").with_model("big"),
    ];
    let (hits, misses) = cache.get_batch(&units, "m");

    assert_eq!(hits, vec![(0, "un".to_string()), (2, "trois".to_string())]);
    assert_eq!(misses, vec![1]);
}

#[test]
fn test_cache_setBatch_shouldStoreEveryPair() {
    let cache = TranslationCache::default();
    let pairs = vec![
        ("one".to_string(), "un".to_string()),
        ("two".to_string(), "deux".to_string()),
    ];
    cache.set_batch(&pairs, "fr", "m");

    assert_eq!(cache.len(), 2);
    assert_eq!(cache.get("two", "fr", "m"), Some("deux".to_string()));
}

#[test]
fn test_cache_stats_shouldReportHitRate() {
    let cache = TranslationCache::default();
    cache.set("hello", "bonjour", "fr", "m");
    cache.get("hello", "fr", "m");
    cache.get("hello", "fr", "m");
    cache.get("missing", "fr", "m");
    cache.get("missing", "fr", "m");

    let stats = cache.stats();
    assert_eq!(stats.hits, 2);
    assert_eq!(stats.misses, 2);
    assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_cache_sharedAcrossTasks_shouldSeeEachOthersWrites() {
    let cache = Arc::new(TranslationCache::default());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.set(&format!("text {}", i), &format!("texte {}", i), "fr", "m") })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(cache.len(), 8);
    assert_eq!(cache.get("text 5", "fr", "m"), Some("texte 5".to_string()));
}

#[test]
fn test_cache_clear_shouldRemoveEverything() {
    let cache = TranslationCache::default();
    cache.set("hello", "bonjour", "fr", "m");
    cache.clear();
    assert!(cache.is_empty());
}
