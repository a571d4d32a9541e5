/*!
 * Translation caching functionality.
 *
 * This module provides an in-memory translation cache shared by every job
 * of the process, to avoid paying the provider twice for the same text.
 *
 * Entries are keyed on the normalized source text (trimmed, case-folded),
 * the target language and the model. Capacity is bounded with LRU eviction
 * and every entry expires after a TTL; whichever comes first removes it.
 */

use std::num::NonZeroUsize;
use std::sync::{Arc, Weak};
use std::time::Duration;

use log::debug;
use lru::LruCache;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::unit::TranslationUnit;

/// Default maximum number of entries
pub const DEFAULT_CAPACITY: usize = 1000;

/// Default time-to-live of an entry
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

/// Digest of normalized text, target language and model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    /// Create a new cache key
    pub fn new(source_text: &str, target_language: &str, model: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(normalize_text(source_text).as_bytes());
        hasher.update([0x1f]);
        hasher.update(target_language.trim().to_lowercase().as_bytes());
        hasher.update([0x1f]);
        hasher.update(model.trim().as_bytes());
        Self(hasher.finalize().into())
    }
}

/// Trim and case-fold source text for key comparison
pub fn normalize_text(text: &str) -> String {
    text.trim().to_lowercase()
}

struct CacheEntry {
    translated_text: String,
    inserted_at: Instant,
}

/// Cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub entries: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total > 0 {
            self.hits as f64 / total as f64
        } else {
            0.0
        }
    }
}

struct CacheState {
    entries: LruCache<CacheKey, CacheEntry>,
    stats: CacheStats,
}

/// Translation cache for storing and retrieving translations
pub struct TranslationCache {
    state: Mutex<CacheState>,
    ttl: Duration,
    enabled: bool,
}

impl TranslationCache {
    /// Create a cache holding at most `capacity` entries for `ttl` each
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            state: Mutex::new(CacheState {
                entries: LruCache::new(capacity),
                stats: CacheStats::default(),
            }),
            ttl,
            enabled: true,
        }
    }

    /// Create a cache that never stores anything
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::new(1, DEFAULT_TTL)
        }
    }

    /// Get a translation from the cache
    pub fn get(&self, source_text: &str, target_language: &str, model: &str) -> Option<String> {
        if !self.enabled {
            return None;
        }

        let key = CacheKey::new(source_text, target_language, model);
        let mut state = self.state.lock();
        let translation = Self::lookup(&mut state, &key, self.ttl);

        match &translation {
            Some(_) => debug!("Cache hit for '{}' (-> {}, {})", truncate_text(source_text, 30), target_language, model),
            None => debug!("Cache miss for '{}' (-> {}, {})", truncate_text(source_text, 30), target_language, model),
        }

        translation
    }

    /// Store a translation in the cache
    pub fn set(&self, source_text: &str, translated_text: &str, target_language: &str, model: &str) {
        if !self.enabled {
            return;
        }

        let key = CacheKey::new(source_text, target_language, model);
        let mut state = self.state.lock();
        Self::insert(&mut state, key, translated_text);
    }

    /// Split units into cache hits and misses
    ///
    /// Returns `(index, translation)` for every hit and the indices of the
    /// misses, both relative to `units`.
    pub fn get_batch(&self, units: &[TranslationUnit], default_model: &str) -> (Vec<(usize, String)>, Vec<usize>) {
        let mut cached = Vec::new();
        let mut uncached = Vec::new();

        if !self.enabled {
            return (cached, (0..units.len()).collect());
        }

        let mut state = self.state.lock();
        for (index, unit) in units.iter().enumerate() {
            let key = CacheKey::new(&unit.source_text, &unit.target_language, unit.effective_model(default_model));
            match Self::lookup(&mut state, &key, self.ttl) {
                Some(translation) => cached.push((index, translation)),
                None => uncached.push(index),
            }
        }

        debug!("Cache lookup: {} hit(s), {} miss(es)", cached.len(), uncached.len());
        (cached, uncached)
    }

    /// Store `(source, translation)` pairs sharing a target language and model
    pub fn set_batch(&self, pairs: &[(String, String)], target_language: &str, model: &str) {
        if !self.enabled || pairs.is_empty() {
            return;
        }

        let mut state = self.state.lock();
        for (source_text, translated_text) in pairs {
            let key = CacheKey::new(source_text, target_language, model);
            Self::insert(&mut state, key, translated_text);
        }
        debug!("Cached {} translation(s) (-> {}, {})", pairs.len(), target_language, model);
    }

    /// Remove every expired entry, returning how many were dropped
    pub fn cleanup(&self) -> usize {
        let mut state = self.state.lock();
        let expired: Vec<CacheKey> = state
            .entries
            .iter()
            .filter(|(_, entry)| entry.inserted_at.elapsed() >= self.ttl)
            .map(|(key, _)| *key)
            .collect();

        for key in &expired {
            state.entries.pop(key);
        }
        state.stats.expirations += expired.len() as u64;

        if !expired.is_empty() {
            debug!("Cache cleanup removed {} expired entr(ies)", expired.len());
        }
        expired.len()
    }

    /// Sweep expired entries every `interval` until the cache is dropped
    pub fn spawn_cleanup_task(cache: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let cache: Weak<Self> = Arc::downgrade(cache);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match cache.upgrade() {
                    Some(cache) => {
                        cache.cleanup();
                    }
                    None => break,
                }
            }
        })
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        CacheStats {
            entries: state.entries.len(),
            ..state.stats
        }
    }

    /// Clear the cache
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.stats = CacheStats::default();
        debug!("Translation cache cleared");
    }

    /// Get the number of entries in the cache, expired ones included
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    /// Check if the cache is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn capacity(&self) -> usize {
        self.state.lock().entries.cap().get()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lookup(state: &mut CacheState, key: &CacheKey, ttl: Duration) -> Option<String> {
        let expired = match state.entries.get(key) {
            Some(entry) if entry.inserted_at.elapsed() < ttl => {
                let translation = entry.translated_text.clone();
                state.stats.hits += 1;
                return Some(translation);
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            state.entries.pop(key);
            state.stats.expirations += 1;
        }
        state.stats.misses += 1;
        None
    }

    fn insert(state: &mut CacheState, key: CacheKey, translated_text: &str) {
        let entry = CacheEntry {
            translated_text: translated_text.to_string(),
            inserted_at: Instant::now(),
        };

        if let Some((evicted_key, _)) = state.entries.push(key, entry) {
            if evicted_key != key {
                state.stats.evictions += 1;
            }
        }
    }
}

impl std::fmt::Debug for TranslationCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslationCache")
            .field("enabled", &self.enabled)
            .field("capacity", &self.capacity())
            .field("ttl", &self.ttl)
            .field("entries", &self.len())
            .finish()
    }
}

impl Default for TranslationCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL)
    }
}

/// Truncate text to a maximum length with ellipsis
fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        format!("{}...", text.chars().take(max_chars).collect::<String>())
    }
}
